//! Memory context tree
//!
//! A [`MemoryContext`] holds the bookkeeping for every live allocation
//! attributed to it: one record per pointer, with an allocation id and an
//! optional capture stack. Contexts form a tree mirroring the component
//! context tree, one child per loaded module, so leaks can be pinned on
//! the module that caused them.
//!
//! Each context guards its allocation map, its record pool, and its child
//! list with separate locks; creating a child never blocks a concurrent
//! allocation in a sibling.

use crate::{allocator, settings, trace};
use backtrace::Backtrace;
use parking_lot::Mutex;
use std::alloc::{GlobalAlloc as _, Layout, System};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

// Direct allocations carry a header word so the full layout can be
// rebuilt at free time from nothing but the payload pointer.
const HEADER: usize = 16;

/// Bookkeeping for one live allocation.
#[derive(Default)]
pub(crate) struct AllocRecord {
    pub(crate) id: u64,
    pub(crate) size: usize,
    pub(crate) trace: Option<Backtrace>,
}

/// One node of the attribution tree.
pub struct MemoryContext {
    name: String,
    parent: Weak<MemoryContext>,
    self_weak: Weak<MemoryContext>,
    next_alloc_id: AtomicU64,
    allocations: Mutex<HashMap<usize, AllocRecord>>,
    pool: Mutex<Vec<AllocRecord>>,
    children: Mutex<Vec<Weak<MemoryContext>>>,
}

impl MemoryContext {
    /// Create a context with no parent.
    pub fn new_root(name: impl Into<String>) -> Arc<Self> {
        Self::build(name.into(), Weak::new())
    }

    /// Create a child attributed separately from `self`.
    pub fn new_child(self: &Arc<Self>, name: impl Into<String>) -> Arc<Self> {
        let child = Self::build(name.into(), Arc::downgrade(self));
        let mut children = self.children.lock();
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        child
    }

    fn build(name: String, parent: Weak<MemoryContext>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            name,
            parent,
            self_weak: weak.clone(),
            next_alloc_id: AtomicU64::new(1),
            allocations: Mutex::new(HashMap::new()),
            pool: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
        })
    }

    /// Context name (the module id for plugin contexts).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live allocations attributed here.
    pub fn live_count(&self) -> usize {
        self.allocations.lock().len()
    }

    /// Bytes held by live allocations attributed here.
    pub fn live_bytes(&self) -> usize {
        self.allocations.lock().values().map(|r| r.size).sum()
    }

    /// Allocate `size` bytes attributed to this context. Null on failure.
    ///
    /// The buffer must be released with [`deallocate`](Self::deallocate);
    /// any context of the same tree may do it.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        let Some(total) = size.checked_add(HEADER) else {
            return std::ptr::null_mut();
        };
        let Ok(layout) = Layout::from_size_align(total, HEADER) else {
            return std::ptr::null_mut();
        };
        // Straight to the system allocator; going through the installed
        // hook would record the backing buffer a second time.
        // SAFETY: layout has non-zero size (HEADER > 0).
        let raw = unsafe { System.alloc(layout) };
        if raw.is_null() {
            return raw;
        }
        // SAFETY: raw is valid for `total` bytes and HEADER-aligned, so the
        // leading word is in bounds and aligned for usize.
        let payload = unsafe {
            (raw as *mut usize).write(total);
            raw.add(HEADER)
        };
        allocator::with_bookkeeping(|| self.record_alloc(payload as usize, size));
        payload
    }

    /// Release a buffer obtained from [`allocate`](Self::allocate).
    ///
    /// The owning record is searched for in this context and its children
    /// first, then in the rest of the tree. Not finding one is loud but
    /// not fatal; the memory is freed either way.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer returned by [`allocate`](Self::allocate)
    /// on any context, not yet released.
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let found = allocator::with_bookkeeping(|| self.release_starting_here(ptr as usize))
            .unwrap_or(false);
        if !found {
            warn!(
                context = %self.name,
                ptr = format_args!("{:#x}", ptr as usize),
                "Releasing a buffer no context has a record of"
            );
        }
        // SAFETY: per the caller contract ptr came from allocate(), so the
        // header word directly before it holds the total allocation size.
        unsafe {
            let raw = ptr.sub(HEADER);
            let total = (raw as *const usize).read();
            let layout = Layout::from_size_align_unchecked(total, HEADER);
            System.dealloc(raw, layout);
        }
    }

    /// Build a leak report for live allocations, `None` when clean.
    ///
    /// Reporting drains the records: each surviving allocation is listed
    /// once, here or from the context's drop, never twice.
    pub fn leak_report(&self) -> Option<String> {
        let records: Vec<(usize, AllocRecord)> = {
            let mut map = self.allocations.lock();
            if map.is_empty() {
                return None;
            }
            map.drain().collect()
        };
        Some(trace::format_leaks(&self.name, records))
    }

    /// Resolve every captured trace in this context and its live children.
    ///
    /// Frames captured inside a dynamic library resolve to names only while
    /// that library is mapped; the loader calls this before closing a module
    /// so a report produced later still reads symbolically.
    pub fn resolve_symbols(&self) {
        for record in self.allocations.lock().values_mut() {
            if let Some(trace) = record.trace.as_mut() {
                trace.resolve();
            }
        }
        let children: Vec<Arc<MemoryContext>> = self
            .children
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for child in children {
            child.resolve_symbols();
        }
    }

    pub(crate) fn record_alloc(&self, ptr: usize, size: usize) {
        let mut record = self.pool.lock().pop().unwrap_or_default();
        record.id = self.next_alloc_id.fetch_add(1, Ordering::Relaxed);
        record.size = size;
        record.trace = settings::stack_traces().then(trace::capture);
        if settings::debug_output() {
            debug!(
                context = %self.name,
                ptr = format_args!("{ptr:#x}"),
                size,
                id = record.id,
                "alloc"
            );
        }
        self.allocations.lock().insert(ptr, record);
    }

    fn release_local(&self, ptr: usize) -> bool {
        let record = self.allocations.lock().remove(&ptr);
        let Some(mut record) = record else {
            return false;
        };
        if settings::debug_output() {
            debug!(
                context = %self.name,
                ptr = format_args!("{ptr:#x}"),
                size = record.size,
                id = record.id,
                "free"
            );
        }
        record.trace = None;
        self.pool.lock().push(record);
        true
    }

    // Phase one: this context and everything below it. Phase two: the rest
    // of the tree, skipping the subtree phase one already covered. A buffer
    // may be freed while a different module is current; the record must be
    // removed from its true owner wherever that is.
    pub(crate) fn release_starting_here(&self, ptr: usize) -> bool {
        if self.release_in_subtree(ptr, std::ptr::null()) {
            return true;
        }
        let Some(root) = self.tree_root() else {
            return false;
        };
        if std::ptr::eq(Arc::as_ptr(&root), self) {
            return false;
        }
        root.release_in_subtree(ptr, self)
    }

    fn release_in_subtree(&self, ptr: usize, skip: *const MemoryContext) -> bool {
        if std::ptr::eq(self, skip) {
            return false;
        }
        if self.release_local(ptr) {
            return true;
        }
        for child in self.children_snapshot() {
            if child.release_in_subtree(ptr, skip) {
                return true;
            }
        }
        false
    }

    fn children_snapshot(&self) -> Vec<Arc<MemoryContext>> {
        let mut children = self.children.lock();
        children.retain(|c| c.strong_count() > 0);
        children.iter().filter_map(Weak::upgrade).collect()
    }

    fn tree_root(&self) -> Option<Arc<MemoryContext>> {
        let mut node = self.parent.upgrade()?;
        while let Some(up) = node.parent.upgrade() {
            node = up;
        }
        Some(node)
    }
}

impl Drop for MemoryContext {
    fn drop(&mut self) {
        let map = std::mem::take(self.allocations.get_mut());
        if map.is_empty() {
            return;
        }
        let count = map.len();
        let report = trace::format_leaks(&self.name, map.into_iter().collect());
        warn!(context = %self.name, leaked = count, "Leaked allocations\n{report}");
        if settings::leak_detection() {
            debug_assert!(false, "context {} leaked {count} allocation(s)", self.name);
        }
    }
}

impl fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContext")
            .field("name", &self.name)
            .field("live", &self.allocations.lock().len())
            .field("has_parent", &(self.parent.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_allocate_round_trip() {
        let ctx = MemoryContext::new_root("direct");
        assert_eq!(ctx.live_count(), 0);

        let ptr = ctx.allocate(64);
        assert!(!ptr.is_null());
        // SAFETY: ptr points at a fresh 64 byte buffer.
        unsafe {
            ptr.write_bytes(0xAB, 64);
            assert_eq!(*ptr, 0xAB);
        }
        assert_eq!(ctx.live_count(), 1);
        assert_eq!(ctx.live_bytes(), 64);

        // SAFETY: ptr came from allocate above.
        unsafe { ctx.deallocate(ptr) };
        assert_eq!(ctx.live_count(), 0);
        assert_eq!(ctx.live_bytes(), 0);
    }

    #[test]
    fn test_cross_context_direct_release() {
        let root = MemoryContext::new_root("cross_root");
        let owner = root.new_child("plg_owner");
        let other = root.new_child("plg_other");

        let ptr = owner.allocate(32);
        assert_eq!(owner.live_count(), 1);

        // Freed through a sibling; the record is found in its true owner.
        // SAFETY: ptr came from allocate above.
        unsafe { other.deallocate(ptr) };
        assert_eq!(owner.live_count(), 0);
        assert_eq!(other.live_count(), 0);
    }

    #[test]
    fn test_release_searches_rest_of_tree() {
        let root = MemoryContext::new_root("search_root");
        let a = root.new_child("a");
        let b = root.new_child("b");
        let b_inner = b.new_child("b_inner");

        a.record_alloc(0x1000, 16);
        root.record_alloc(0x2000, 8);

        // Phase one from b's subtree misses, phase two finds the records.
        assert!(b_inner.release_starting_here(0x1000));
        assert_eq!(a.live_count(), 0);
        assert!(b.release_starting_here(0x2000));
        assert_eq!(root.live_count(), 0);

        assert!(!b.release_starting_here(0x3000));
    }

    #[test]
    fn test_deallocate_null_is_noop() {
        let ctx = MemoryContext::new_root("null");
        // SAFETY: null is explicitly allowed.
        unsafe { ctx.deallocate(std::ptr::null_mut()) };
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn test_leak_report_lists_survivors() {
        let ctx = MemoryContext::new_root("leaky");
        assert!(ctx.leak_report().is_none());

        let a = ctx.allocate(48);
        let b = ctx.allocate(16);
        let report = ctx.leak_report().unwrap();
        assert!(report.contains("leaky"));
        assert!(report.contains("2 allocation(s) still live, 64 byte(s)"));

        // The report drained the bookkeeping; the buffers still need a free.
        assert_eq!(ctx.live_count(), 0);
        // SAFETY: both came from allocate above.
        unsafe {
            ctx.deallocate(a);
            ctx.deallocate(b);
        }
    }

    #[test]
    fn test_record_pool_reuses_records() {
        let ctx = MemoryContext::new_root("pooled");
        ctx.record_alloc(0x100, 4);
        assert!(ctx.release_starting_here(0x100));
        assert_eq!(ctx.pool.lock().len(), 1);

        ctx.record_alloc(0x200, 4);
        assert!(ctx.pool.lock().is_empty());
        assert!(ctx.release_starting_here(0x200));
    }

    #[test]
    fn test_resolve_symbols_keeps_records_intact() {
        let root = MemoryContext::new_root("resolve_root");
        let child = root.new_child("resolve_child");
        root.allocations.lock().insert(
            0x500,
            AllocRecord {
                id: 1,
                size: 24,
                trace: Some(trace::capture()),
            },
        );
        child.record_alloc(0x600, 8);

        root.resolve_symbols();

        let map = root.allocations.lock();
        let trace = map[&0x500].trace.as_ref().unwrap();
        assert!(!trace.frames().is_empty());
        drop(map);
        assert_eq!(child.live_count(), 1);

        assert!(root.release_starting_here(0x500));
        assert!(child.release_starting_here(0x600));
    }
}
