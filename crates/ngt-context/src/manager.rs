//! Context tree ownership
//!
//! The [`ContextManager`] owns the root context plus one child context per
//! loaded module. It wires every child up as a listener of the root so
//! globally stored registrations reach listeners attached to module
//! contexts, and it orchestrates [`ContextCreator`]s: when a creator is
//! registered it is instantiated for the root and for every live context,
//! and every context created later gets its own instance.

use crate::context::{ComponentContext, ContextListener, ListenerGuard, RegScope};
use crate::creator::ContextCreator;
use crate::error::{ContextError, Result};
use crate::holder::InterfaceBox;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tracing::{info, warn};

/// Owns the context tree and reacts to creator registrations.
pub struct ContextManager {
    global: Arc<ComponentContext>,
    contexts: DashMap<String, ContextEntry>,
    creators: RwLock<Vec<CreatorSlot>>,
    executable_path: RwLock<Option<PathBuf>>,
    _listen: ListenerGuard,
}

struct ContextEntry {
    context: Arc<ComponentContext>,
    path: PathBuf,
    _wire: ListenerGuard,
}

struct CreatorSlot {
    creator: Arc<dyn ContextCreator>,
    products: Vec<Weak<InterfaceBox>>,
}

// Listener adapter holding the manager weakly; a guard owning the manager
// directly would keep it alive forever.
struct ManagerListener(Weak<ContextManager>);

impl ContextListener for ManagerListener {
    fn on_creator_registered(&self, creator: &Arc<dyn ContextCreator>) {
        if let Some(manager) = self.0.upgrade() {
            manager.creator_registered(creator);
        }
    }

    fn on_creator_deregistered(&self, creator: &Arc<dyn ContextCreator>) {
        if let Some(manager) = self.0.upgrade() {
            manager.creator_deregistered(creator);
        }
    }
}

impl ContextManager {
    /// Create a manager with a fresh root context.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ContextManager>| {
            let global = ComponentContext::new_root("root");
            let listen = global.register_listener(Arc::new(ManagerListener(weak.clone())));
            Self {
                global,
                contexts: DashMap::new(),
                creators: RwLock::new(Vec::new()),
                executable_path: RwLock::new(None),
                _listen: listen,
            }
        })
    }

    /// The root context. Always available.
    pub fn global(&self) -> Arc<ComponentContext> {
        self.global.clone()
    }

    /// Create a child context for a module.
    ///
    /// The context is attached as a listener of the root, and every known
    /// creator is instantiated for it with local scope.
    pub fn create_context(
        &self,
        id: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Arc<ComponentContext> {
        let id = id.into();
        let path = path.into();
        if self.contexts.contains_key(&id) {
            warn!(context = %id, "Replacing existing context with the same id");
        }

        let context = ComponentContext::new_child(id.clone(), &self.global);
        let wire = self.global.register_listener(context.clone());
        info!(context = %id, path = %path.display(), "Context created");

        self.contexts.insert(
            id.clone(),
            ContextEntry {
                context: context.clone(),
                path,
                _wire: wire,
            },
        );

        let known: Vec<Arc<dyn ContextCreator>> = {
            let slots = self.creators.read();
            slots.iter().map(|s| s.creator.clone()).collect()
        };
        for creator in known {
            let product = Arc::new(creator.create(&id));
            context
                .register_entry(product.clone(), RegScope::Local)
                .persist();
            let mut slots = self.creators.write();
            if let Some(slot) = slots.iter_mut().find(|s| Arc::ptr_eq(&s.creator, &creator)) {
                slot.products.push(Arc::downgrade(&product));
            }
        }

        context
    }

    /// Look up a context by module id.
    pub fn context(&self, id: &str) -> Option<Arc<ComponentContext>> {
        self.contexts.get(id).map(|e| e.context.clone())
    }

    /// Path recorded for a context at creation.
    pub fn context_path(&self, id: &str) -> Option<PathBuf> {
        self.contexts.get(id).map(|e| e.path.clone())
    }

    /// Tear down a context: every interface it registered is deregistered,
    /// firing listener callbacks per surviving entry, then the context is
    /// released.
    pub fn destroy_context(&self, id: &str) -> Result<()> {
        let (_, entry) = self
            .contexts
            .remove(id)
            .ok_or_else(|| ContextError::not_found(id))?;
        entry.context.teardown();
        info!(context = %id, "Context destroyed");
        Ok(())
    }

    /// Ids of all live module contexts, unordered.
    pub fn context_ids(&self) -> Vec<String> {
        self.contexts.iter().map(|e| e.key().clone()).collect()
    }

    /// Record the path of the hosting executable.
    pub fn set_executable_path(&self, path: impl Into<PathBuf>) {
        *self.executable_path.write() = Some(path.into());
    }

    /// Path of the hosting executable, if recorded.
    pub fn executable_path(&self) -> Option<PathBuf> {
        self.executable_path.read().clone()
    }

    fn creator_registered(&self, creator: &Arc<dyn ContextCreator>) {
        let id = creator.interface_id();
        {
            let slots = self.creators.read();
            if slots.iter().any(|s| s.creator.interface_id() == id) {
                debug_assert!(false, "duplicate context creator for {}", id.name());
                warn!(interface = id.name(), "Duplicate context creator ignored");
                return;
            }
        }
        self.creators.write().push(CreatorSlot {
            creator: creator.clone(),
            products: Vec::new(),
        });

        // Backfill every live context, then the root itself.
        let existing: Vec<(String, Arc<ComponentContext>)> = self
            .contexts
            .iter()
            .map(|e| (e.key().clone(), e.value().context.clone()))
            .collect();
        let mut products = Vec::new();
        for (ctx_id, context) in existing {
            let product = Arc::new(creator.create(&ctx_id));
            context
                .register_entry(product.clone(), RegScope::Local)
                .persist();
            products.push(Arc::downgrade(&product));
        }
        let root_product = Arc::new(creator.create(self.global.name()));
        self.global
            .register_entry(root_product.clone(), RegScope::Local)
            .persist();
        products.push(Arc::downgrade(&root_product));

        {
            let mut slots = self.creators.write();
            if let Some(slot) = slots.iter_mut().find(|s| Arc::ptr_eq(&s.creator, creator)) {
                slot.products.extend(products);
            }
        }
        info!(interface = id.name(), "Context creator registered");
    }

    fn creator_deregistered(&self, creator: &Arc<dyn ContextCreator>) {
        let slot = {
            let mut slots = self.creators.write();
            match slots.iter().position(|s| Arc::ptr_eq(&s.creator, creator)) {
                Some(pos) => slots.remove(pos),
                None => return,
            }
        };

        let contexts: Vec<Arc<ComponentContext>> = self
            .contexts
            .iter()
            .map(|e| e.value().context.clone())
            .collect();
        for weak in slot.products {
            let Some(product) = weak.upgrade() else { continue };
            let mut removed = false;
            for context in &contexts {
                if context.deregister(&product) {
                    removed = true;
                    break;
                }
            }
            if !removed {
                self.global.deregister(&product);
            }
        }
        info!(
            interface = creator.interface_id().name(),
            "Context creator deregistered"
        );
    }
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("contexts", &self.contexts.len())
            .field("creators", &self.creators.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::Registration;
    use ngt_core::InterfaceId;
    use parking_lot::Mutex;

    trait Stamp: Send + Sync {
        fn context_id(&self) -> &str;
    }

    struct StampImpl(String);

    impl Stamp for StampImpl {
        fn context_id(&self) -> &str {
            &self.0
        }
    }

    struct StampCreator;

    impl ContextCreator for StampCreator {
        fn interface_id(&self) -> InterfaceId {
            InterfaceId::of::<dyn Stamp>()
        }

        fn create(&self, context_id: &str) -> InterfaceBox {
            Registration::new(StampImpl(context_id.to_owned()))
                .implements::<dyn Stamp>(|v| v)
                .seal()
        }
    }

    trait Marker: Send + Sync {}
    struct MarkerImpl;
    impl Marker for MarkerImpl {}

    #[derive(Default)]
    struct DeregCounter {
        deregistered: Mutex<usize>,
    }

    impl ContextListener for DeregCounter {
        fn on_interface_deregistered(&self, entry: &Arc<InterfaceBox>) {
            if entry.get::<dyn Marker>().is_some() {
                *self.deregistered.lock() += 1;
            }
        }
    }

    #[test]
    fn test_global_always_available() {
        let manager = ContextManager::new();
        assert_eq!(manager.global().name(), "root");
        assert!(manager.global().query::<dyn Stamp>().is_none());
    }

    #[test]
    fn test_create_and_lookup_context() {
        let manager = ContextManager::new();
        let ctx = manager.create_context("plg_test", "plugins/plg_test");
        assert_eq!(ctx.name(), "plg_test");
        assert!(manager.context("plg_test").is_some());
        assert!(manager.context("unknown").is_none());
        assert_eq!(
            manager.context_path("plg_test").unwrap(),
            PathBuf::from("plugins/plg_test")
        );
    }

    #[test]
    fn test_destroy_unknown_context() {
        let manager = ContextManager::new();
        assert!(matches!(
            manager.destroy_context("missing"),
            Err(ContextError::ContextNotFound(_))
        ));
    }

    #[test]
    fn test_destroy_fires_dereg_per_registration() {
        let manager = ContextManager::new();
        let ctx = manager.create_context("plg_test", "plugins/plg_test");

        let counter = Arc::new(DeregCounter::default());
        let _guard = manager.global().register_listener(counter.clone());

        ctx.register(Registration::new(MarkerImpl).implements::<dyn Marker>(|v| v))
            .persist();
        ctx.register(Registration::new(MarkerImpl).implements::<dyn Marker>(|v| v))
            .persist();

        manager.destroy_context("plg_test").unwrap();
        assert_eq!(*counter.deregistered.lock(), 2);
        assert!(manager.global().query::<dyn Marker>().is_none());
    }

    #[test]
    fn test_creator_instantiated_per_context() {
        let manager = ContextManager::new();
        let early = manager.create_context("plg_early", "plugins/plg_early");

        let handle = manager.global().register(
            Registration::new(StampCreator).implements::<dyn ContextCreator>(|v| v),
        );

        // Backfilled for the pre-existing context and the root.
        assert_eq!(early.query::<dyn Stamp>().unwrap().context_id(), "plg_early");
        assert_eq!(
            manager.global().query::<dyn Stamp>().unwrap().context_id(),
            "root"
        );

        // Created on demand for contexts made afterwards.
        let late = manager.create_context("plg_late", "plugins/plg_late");
        assert_eq!(late.query::<dyn Stamp>().unwrap().context_id(), "plg_late");

        handle.persist();
    }

    #[test]
    fn test_creator_products_are_context_scoped() {
        let manager = ContextManager::new();
        manager
            .global()
            .register(Registration::new(StampCreator).implements::<dyn ContextCreator>(|v| v))
            .persist();

        let a = manager.create_context("plg_a", "plugins/plg_a");
        let b = manager.create_context("plg_b", "plugins/plg_b");
        assert_eq!(a.query::<dyn Stamp>().unwrap().context_id(), "plg_a");
        assert_eq!(b.query::<dyn Stamp>().unwrap().context_id(), "plg_b");
    }

    #[test]
    fn test_creator_dereg_removes_products() {
        let manager = ContextManager::new();
        let ctx = manager.create_context("plg_test", "plugins/plg_test");

        let handle = manager.global().register(
            Registration::new(StampCreator).implements::<dyn ContextCreator>(|v| v),
        );
        assert!(ctx.query::<dyn Stamp>().is_some());
        assert!(manager.global().query::<dyn Stamp>().is_some());

        assert!(handle.deregister());
        assert!(ctx.query::<dyn Stamp>().is_none());
        assert!(manager.global().query::<dyn Stamp>().is_none());
    }

    #[test]
    fn test_executable_path_accessors() {
        let manager = ContextManager::new();
        assert!(manager.executable_path().is_none());
        manager.set_executable_path("/opt/ngt/bin/ngt");
        assert_eq!(
            manager.executable_path().unwrap(),
            PathBuf::from("/opt/ngt/bin/ngt")
        );
    }
}
