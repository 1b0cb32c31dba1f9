//! Per-module interface registries
//!
//! A [`ComponentContext`] stores type-erased interface entries and notifies
//! attached listeners on registration and deregistration. Contexts form a
//! tree: one root ("global") context plus one child per loaded module.
//! Global-scoped registrations made through a child are stored in the root,
//! which is what makes an interface visible to every other module.

use crate::creator::ContextCreator;
use crate::holder::{InterfaceBox, Registration};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Where a registration is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegScope {
    /// Visible only through the registering context (and its children).
    Local,
    /// Stored in the root context, visible to every module. The default.
    Global,
}

/// Receiver for context registration events.
///
/// All methods default to no-ops so implementors pick the events they care
/// about. Interface events carry the affected entry; probe it with
/// [`InterfaceBox::get`] for the interfaces of interest.
pub trait ContextListener: Send + Sync {
    /// An interface entry was stored (fired after insertion).
    fn on_interface_registered(&self, entry: &Arc<InterfaceBox>) {
        let _ = entry;
    }

    /// An interface entry is being removed (fired before removal).
    fn on_interface_deregistered(&self, entry: &Arc<InterfaceBox>) {
        let _ = entry;
    }

    /// A registered entry provides [`ContextCreator`].
    fn on_creator_registered(&self, creator: &Arc<dyn ContextCreator>) {
        let _ = creator;
    }

    /// A [`ContextCreator`]-providing entry is being removed.
    fn on_creator_deregistered(&self, creator: &Arc<dyn ContextCreator>) {
        let _ = creator;
    }
}

struct ListenerSlot {
    id: u64,
    listener: Weak<dyn ContextListener>,
}

struct Owned {
    entry: Arc<InterfaceBox>,
    stored_in: Weak<ComponentContext>,
}

#[derive(Default)]
struct Inner {
    /// Entries stored in this context, insertion order.
    entries: Vec<Arc<InterfaceBox>>,
    /// Everything registered through this context, wherever it was stored.
    /// Drives teardown.
    owned: Vec<Owned>,
    listeners: Vec<ListenerSlot>,
}

/// A scoped registry of interfaces.
pub struct ComponentContext {
    name: String,
    parent: Option<Arc<ComponentContext>>,
    self_weak: Weak<ComponentContext>,
    inner: RwLock<Inner>,
}

impl ComponentContext {
    /// Create a root context with no parent.
    pub fn new_root(name: impl Into<String>) -> Arc<Self> {
        Self::build(name.into(), None)
    }

    /// Create a child of `parent`.
    ///
    /// Note the tree alone does not forward events downward; the context
    /// manager attaches each child as a listener of the root when it creates
    /// one. Children built directly see parent entries in queries but their
    /// listeners only hear local events.
    pub fn new_child(name: impl Into<String>, parent: &Arc<ComponentContext>) -> Arc<Self> {
        Self::build(name.into(), Some(parent.clone()))
    }

    fn build(name: String, parent: Option<Arc<ComponentContext>>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            name,
            parent,
            self_weak: weak.clone(),
            inner: RwLock::new(Inner::default()),
        })
    }

    /// Context name (the module id for plugin contexts, "root" for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent context, `None` for the root.
    pub fn parent(&self) -> Option<&Arc<ComponentContext>> {
        self.parent.as_ref()
    }

    /// Register with global visibility. Shorthand for
    /// [`register_scoped`](Self::register_scoped) with [`RegScope::Global`].
    pub fn register<C: Send + Sync + 'static>(&self, reg: Registration<C>) -> InterfaceHandle {
        self.register_scoped(reg, RegScope::Global)
    }

    /// Register an interface entry with the given scope.
    ///
    /// Global scope stores the entry in the root context; the registering
    /// context remembers it either way and tears it down when destroyed. The
    /// returned handle deregisters on drop.
    pub fn register_scoped<C: Send + Sync + 'static>(
        &self,
        reg: Registration<C>,
        scope: RegScope,
    ) -> InterfaceHandle {
        self.register_entry(Arc::new(reg.seal()), scope)
    }

    pub(crate) fn register_entry(
        &self,
        entry: Arc<InterfaceBox>,
        scope: RegScope,
    ) -> InterfaceHandle {
        match (scope, &self.parent) {
            (RegScope::Global, Some(parent)) => {
                let mut target = parent.clone();
                while let Some(next) = target.parent.clone() {
                    target = next;
                }
                self.inner.write().owned.push(Owned {
                    entry: entry.clone(),
                    stored_in: Arc::downgrade(&target),
                });
                target.store_entry(&entry);
            }
            _ => {
                self.inner.write().owned.push(Owned {
                    entry: entry.clone(),
                    stored_in: self.self_weak.clone(),
                });
                self.store_entry(&entry);
            }
        }
        InterfaceHandle {
            owner: self.self_weak.clone(),
            entry: Some(entry),
        }
    }

    fn store_entry(&self, entry: &Arc<InterfaceBox>) {
        self.inner.write().entries.push(entry.clone());
        debug!(
            context = %self.name,
            concrete = entry.concrete_name(),
            "Interface registered"
        );
        if let Some(creator) = entry.get::<dyn ContextCreator>() {
            self.notify_creator_registered(&creator);
        }
        self.notify_registered(entry);
    }

    /// Remove a registered entry, firing deregistration events first.
    ///
    /// Falls back to the parent chain when the entry is not stored here, so
    /// deregistering a global-scoped entry through the context that
    /// registered it works. Returns whether anything was removed.
    pub fn deregister(&self, entry: &Arc<InterfaceBox>) -> bool {
        let found = {
            let inner = self.inner.read();
            inner.entries.iter().any(|e| Arc::ptr_eq(e, entry))
        };
        if found {
            if let Some(creator) = entry.get::<dyn ContextCreator>() {
                self.notify_creator_deregistered(&creator);
            }
            self.notify_deregistered(entry);
            {
                let mut inner = self.inner.write();
                if let Some(pos) = inner.entries.iter().position(|e| Arc::ptr_eq(e, entry)) {
                    inner.entries.remove(pos);
                }
                inner.owned.retain(|o| !Arc::ptr_eq(&o.entry, entry));
            }
            debug!(
                context = %self.name,
                concrete = entry.concrete_name(),
                "Interface deregistered"
            );
            return true;
        }
        if let Some(parent) = &self.parent {
            let removed = parent.deregister(entry);
            if removed {
                self.inner
                    .write()
                    .owned
                    .retain(|o| !Arc::ptr_eq(&o.entry, entry));
            }
            return removed;
        }
        false
    }

    /// Look up the first entry providing `T`, own entries before the parent
    /// chain. `None` when nothing provides it.
    pub fn query<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        {
            let inner = self.inner.read();
            for entry in &inner.entries {
                if let Some(found) = entry.get::<T>() {
                    return Some(found);
                }
            }
        }
        self.parent.as_ref().and_then(|parent| parent.query::<T>())
    }

    /// Gather every registrant of `T`, own entries first, then the parent
    /// chain, insertion order within each context.
    pub fn query_all<T: ?Sized + 'static>(&self) -> Vec<Arc<T>> {
        let mut found = Vec::new();
        self.collect_all(&mut found);
        found
    }

    fn collect_all<T: ?Sized + 'static>(&self, found: &mut Vec<Arc<T>>) {
        {
            let inner = self.inner.read();
            for entry in &inner.entries {
                if let Some(f) = entry.get::<T>() {
                    found.push(f);
                }
            }
        }
        if let Some(parent) = &self.parent {
            parent.collect_all(found);
        }
    }

    /// Attach a listener and replay the current registration state to it
    /// (own entries, then the parent chain), so a listener attached after
    /// registrations happened does not miss them.
    ///
    /// The context holds the listener weakly; the returned guard owns it and
    /// detaches on drop.
    pub fn register_listener(&self, listener: Arc<dyn ContextListener>) -> ListenerGuard {
        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        {
            let mut inner = self.inner.write();
            inner.listeners.retain(|l| l.listener.strong_count() > 0);
            inner.listeners.push(ListenerSlot {
                id,
                listener: Arc::downgrade(&listener),
            });
        }
        self.replay_to(&listener);
        ListenerGuard {
            context: self.self_weak.clone(),
            id,
            listener: Some(listener),
        }
    }

    fn deregister_listener(&self, id: u64) {
        let mut inner = self.inner.write();
        let before = inner.listeners.len();
        inner.listeners.retain(|l| l.id != id);
        debug_assert!(
            inner.listeners.len() < before,
            "listener {id} was not registered"
        );
    }

    fn replay_to(&self, listener: &Arc<dyn ContextListener>) {
        let entries: Vec<Arc<InterfaceBox>> = self.inner.read().entries.clone();
        for entry in entries {
            listener.on_interface_registered(&entry);
        }
        if let Some(parent) = &self.parent {
            parent.replay_to(listener);
        }
    }

    // Registration events re-scan the listener list until it stabilizes:
    // a listener attached by a callback still hears the event, and each
    // listener hears it once.
    fn notify_registered(&self, entry: &Arc<InterfaceBox>) {
        let mut called: HashSet<u64> = HashSet::new();
        loop {
            let pending: Vec<(u64, Arc<dyn ContextListener>)> = {
                let inner = self.inner.read();
                inner
                    .listeners
                    .iter()
                    .filter(|slot| !called.contains(&slot.id))
                    .filter_map(|slot| slot.listener.upgrade().map(|l| (slot.id, l)))
                    .collect()
            };
            if pending.is_empty() {
                break;
            }
            for (id, listener) in pending {
                called.insert(id);
                listener.on_interface_registered(entry);
            }
        }
    }

    fn notify_deregistered(&self, entry: &Arc<InterfaceBox>) {
        for listener in self.listener_snapshot() {
            listener.on_interface_deregistered(entry);
        }
    }

    fn notify_creator_registered(&self, creator: &Arc<dyn ContextCreator>) {
        for listener in self.listener_snapshot() {
            listener.on_creator_registered(creator);
        }
    }

    fn notify_creator_deregistered(&self, creator: &Arc<dyn ContextCreator>) {
        for listener in self.listener_snapshot() {
            listener.on_creator_deregistered(creator);
        }
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn ContextListener>> {
        let inner = self.inner.read();
        inner
            .listeners
            .iter()
            .filter_map(|slot| slot.listener.upgrade())
            .collect()
    }

    /// Deregister everything this context registered, firing deregistration
    /// events per surviving entry, including entries stored in the root.
    pub(crate) fn teardown(&self) {
        loop {
            let next = {
                let inner = self.inner.read();
                inner.owned.first().map(|o| o.entry.clone())
            };
            let Some(entry) = next else { break };
            if !self.deregister(&entry) {
                // Already gone elsewhere; drop the stale record.
                self.inner
                    .write()
                    .owned
                    .retain(|o| !Arc::ptr_eq(&o.entry, &entry));
            }
        }
    }
}

// A context attached as a listener of the root forwards interface events to
// its own listeners. Creator events are handled by the context manager only.
impl ContextListener for ComponentContext {
    fn on_interface_registered(&self, entry: &Arc<InterfaceBox>) {
        self.notify_registered(entry);
    }

    fn on_interface_deregistered(&self, entry: &Arc<InterfaceBox>) {
        self.notify_deregistered(entry);
    }
}

impl Drop for ComponentContext {
    fn drop(&mut self) {
        let (owned, listeners) = {
            let mut inner = self.inner.write();
            inner.entries.clear();
            (std::mem::take(&mut inner.owned), inner.listeners.len())
        };
        if listeners > 0 {
            warn!(
                context = %self.name,
                listeners,
                "Context dropped with listeners still attached"
            );
        }
        // Entries stored in an ancestor outlive this context unless removed
        // here. Locally stored entries died with the clear above.
        for o in owned {
            if let Some(stored) = o.stored_in.upgrade() {
                stored.deregister(&o.entry);
            }
        }
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ComponentContext")
            .field("name", &self.name)
            .field("entries", &inner.entries.len())
            .field("listeners", &inner.listeners.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Registration token returned by [`ComponentContext::register_scoped`].
///
/// Dropping the handle deregisters the entry; [`persist`](Self::persist)
/// leaves it registered for the lifetime of its context.
#[must_use = "dropping the handle deregisters the interface"]
pub struct InterfaceHandle {
    owner: Weak<ComponentContext>,
    entry: Option<Arc<InterfaceBox>>,
}

impl InterfaceHandle {
    /// Deregister now. Returns whether the entry was still registered.
    pub fn deregister(mut self) -> bool {
        self.deregister_inner()
    }

    /// Leave the entry registered; context teardown removes it later.
    pub fn persist(mut self) {
        self.entry.take();
    }

    /// The registered entry, until deregistered or persisted.
    pub fn entry(&self) -> Option<&Arc<InterfaceBox>> {
        self.entry.as_ref()
    }

    fn deregister_inner(&mut self) -> bool {
        match (self.owner.upgrade(), self.entry.take()) {
            (Some(ctx), Some(entry)) => ctx.deregister(&entry),
            _ => false,
        }
    }
}

impl Drop for InterfaceHandle {
    fn drop(&mut self) {
        self.deregister_inner();
    }
}

impl fmt::Debug for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceHandle")
            .field("registered", &self.entry.is_some())
            .finish()
    }
}

/// Detaches its listener from the context on drop.
#[must_use = "dropping the guard detaches the listener"]
pub struct ListenerGuard {
    context: Weak<ComponentContext>,
    id: u64,
    listener: Option<Arc<dyn ContextListener>>,
}

impl ListenerGuard {
    /// Detach the listener now.
    pub fn disconnect(mut self) {
        self.disconnect_inner();
    }

    fn disconnect_inner(&mut self) {
        if self.listener.take().is_some() {
            if let Some(ctx) = self.context.upgrade() {
                ctx.deregister_listener(self.id);
            }
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.disconnect_inner();
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("id", &self.id)
            .field("attached", &self.listener.is_some())
            .finish()
    }
}
