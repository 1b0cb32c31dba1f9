//! Per-module allocator wiring
//!
//! The loader registers a [`MemoryContextCreator`] globally, so every
//! module context (and the root) resolves `dyn ModuleAllocator` to an
//! instance backed by that module's own [`MemoryContext`]. Buffers a
//! module allocates through the interface are attributed to it and show up
//! in its leak report at unload.

use ngt_context::{ContextCreator, InterfaceBox, Registration};
use ngt_core::InterfaceId;
use ngt_memory::MemoryContext;
use ngt_plugin::ModuleAllocator;
use std::fmt;
use std::sync::Arc;

/// [`ModuleAllocator`] over one module's [`MemoryContext`].
pub struct ContextAllocator {
    memory: Arc<MemoryContext>,
}

impl ContextAllocator {
    fn new(memory: Arc<MemoryContext>) -> Self {
        Self { memory }
    }

    /// The memory context allocations through this interface land in.
    pub fn memory(&self) -> &Arc<MemoryContext> {
        &self.memory
    }
}

impl ModuleAllocator for ContextAllocator {
    fn allocate(&self, size: usize) -> *mut u8 {
        self.memory.allocate(size)
    }

    unsafe fn deallocate(&self, ptr: *mut u8) {
        // SAFETY: forwarded contract, see ModuleAllocator::deallocate.
        unsafe { self.memory.deallocate(ptr) }
    }
}

impl fmt::Debug for ContextAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextAllocator")
            .field("context", &self.memory.name())
            .finish()
    }
}

/// Context creator producing one [`ContextAllocator`] per module context.
pub struct MemoryContextCreator {
    parent: Arc<MemoryContext>,
}

impl MemoryContextCreator {
    /// Creator whose products attribute to children of `parent`.
    pub fn new(parent: Arc<MemoryContext>) -> Self {
        Self { parent }
    }
}

impl ContextCreator for MemoryContextCreator {
    fn interface_id(&self) -> InterfaceId {
        InterfaceId::of::<dyn ModuleAllocator>()
    }

    fn create(&self, context_id: &str) -> InterfaceBox {
        let memory = self.parent.new_child(context_id);
        Registration::new(ContextAllocator::new(memory))
            .implements::<dyn ModuleAllocator>(|v| v)
            .seal()
    }
}

impl fmt::Debug for MemoryContextCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContextCreator")
            .field("parent", &self.parent.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngt_context::ContextManager;

    #[test]
    fn test_each_context_gets_own_allocator() {
        let manager = ContextManager::new();
        let parent = ngt_memory::root().new_child("creator_test");
        manager
            .global()
            .register(
                Registration::new(MemoryContextCreator::new(parent.clone()))
                    .implements::<dyn ContextCreator>(|v| v),
            )
            .persist();

        let a = manager.create_context("plg_a", "plugins/plg_a");
        let b = manager.create_context("plg_b", "plugins/plg_b");

        let alloc_a = a.query::<ContextAllocator>().unwrap();
        let alloc_b = b.query::<ContextAllocator>().unwrap();
        assert_eq!(alloc_a.memory().name(), "plg_a");
        assert_eq!(alloc_b.memory().name(), "plg_b");

        // Interface traffic is attributed to the owning module.
        let iface = a.query::<dyn ModuleAllocator>().unwrap();
        let ptr = iface.allocate(96);
        assert!(!ptr.is_null());
        assert_eq!(alloc_a.memory().live_bytes(), 96);
        assert_eq!(alloc_b.memory().live_bytes(), 0);
        // SAFETY: ptr came from the same interface's allocate.
        unsafe { iface.deallocate(ptr) };
        assert_eq!(alloc_a.memory().live_bytes(), 0);
    }

    #[test]
    fn test_buffers_survive_cross_module_release() {
        let parent = ngt_memory::root().new_child("handover_test");
        let creator = MemoryContextCreator::new(parent);

        let product_a = Arc::new(creator.create("plg_a"));
        let product_b = Arc::new(creator.create("plg_b"));
        let alloc_a = product_a.get::<dyn ModuleAllocator>().unwrap();
        let alloc_b = product_b.get::<dyn ModuleAllocator>().unwrap();

        // Ownership handed from a to b; the record is found in its owner.
        let ptr = alloc_a.allocate(32);
        // SAFETY: the two interfaces share one attribution tree.
        unsafe { alloc_b.deallocate(ptr) };
        assert_eq!(product_a.get::<ContextAllocator>().unwrap().memory().live_count(), 0);
    }
}
