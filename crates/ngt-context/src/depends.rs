//! Tracked interface references
//!
//! A [`DepRef`] is the consuming side of the registry: it watches a context
//! for registrations of one interface and always resolves to whatever
//! [`ComponentContext::query`] would currently return. Create it before or
//! after the provider registers; it catches up either way.

use crate::ambient;
use crate::context::{ComponentContext, ContextListener, ListenerGuard};
use crate::error::{ContextError, Result};
use crate::holder::InterfaceBox;
use parking_lot::RwLock;
use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};

/// A live reference to the current registrant of interface `T`.
pub struct DepRef<T: ?Sized + Send + Sync + 'static> {
    context: Arc<ComponentContext>,
    cached: Arc<RwLock<Option<Arc<T>>>>,
    _listen: ListenerGuard,
}

struct DepListener<T: ?Sized + Send + Sync + 'static> {
    context: Weak<ComponentContext>,
    cached: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T: ?Sized + Send + Sync + 'static> ContextListener for DepListener<T> {
    fn on_interface_registered(&self, entry: &Arc<InterfaceBox>) {
        if entry.get::<T>().is_none() {
            return;
        }
        // Resolve through the context rather than taking the new entry, so
        // the reference agrees with query order when several registrants
        // provide the interface.
        if let Some(ctx) = self.context.upgrade() {
            let fresh = ctx.query::<T>();
            *self.cached.write() = fresh;
        }
    }

    fn on_interface_deregistered(&self, entry: &Arc<InterfaceBox>) {
        let Some(dying) = entry.get::<T>() else { return };
        let mut cached = self.cached.write();
        if cached
            .as_ref()
            .is_some_and(|held| Arc::ptr_eq(held, &dying))
        {
            // Fired before removal, so re-resolving now would still find the
            // dying registrant. The next get() resolves survivors.
            *cached = None;
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> DepRef<T> {
    /// Bind to `context`. Resolves immediately if a registrant exists.
    pub fn new(context: &Arc<ComponentContext>) -> Self {
        let cached = Arc::new(RwLock::new(None));
        let listener = Arc::new(DepListener::<T> {
            context: Arc::downgrade(context),
            cached: cached.clone(),
        });
        let listen = context.register_listener(listener);
        Self {
            context: context.clone(),
            cached,
            _listen: listen,
        }
    }

    /// Bind to the thread's ambient context.
    ///
    /// Fails with [`ContextError::NoAmbientContext`] outside an ambient
    /// scope, which for plugin code means outside the lifecycle entry
    /// points.
    pub fn ambient() -> Result<Self> {
        let context = ambient::current().ok_or(ContextError::NoAmbientContext)?;
        Ok(Self::new(&context))
    }

    /// The current registrant, `None` while nothing provides `T`.
    pub fn get(&self) -> Option<Arc<T>> {
        if let Some(held) = self.cached.read().as_ref() {
            return Some(held.clone());
        }
        let found = self.context.query::<T>();
        if let Some(v) = &found {
            *self.cached.write() = Some(v.clone());
        }
        found
    }

    /// The current registrant, or an error naming the missing interface.
    pub fn require(&self) -> Result<Arc<T>> {
        self.get()
            .ok_or_else(|| ContextError::unavailable(type_name::<T>()))
    }

    /// Whether a registrant is currently available.
    pub fn is_bound(&self) -> bool {
        self.get().is_some()
    }

    /// The context this reference resolves through.
    pub fn context(&self) -> &Arc<ComponentContext> {
        &self.context
    }
}

impl<T: ?Sized + Send + Sync + 'static> fmt::Debug for DepRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepRef")
            .field("interface", &type_name::<T>())
            .field("bound", &self.cached.read().is_some())
            .finish()
    }
}
