//! Tracking global allocator
//!
//! [`TrackedAlloc`] wraps the system allocator and mirrors every
//! allocation into the current memory context's bookkeeping. Install it in
//! the executable:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: ngt_memory::TrackedAlloc = ngt_memory::TrackedAlloc;
//! ```
//!
//! The bookkeeping itself allocates (map growth, stack capture), so the
//! hook keeps a thread-local reentrancy flag: allocations made while
//! recording one are passed straight through untracked.

use crate::context::MemoryContext;
use crate::scope;
use crate::settings;
use once_cell::sync::Lazy;
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::Arc;
use tracing::debug;

static ROOT: Lazy<Arc<MemoryContext>> = Lazy::new(|| MemoryContext::new_root("root"));

/// The root of the process-wide attribution tree.
///
/// Allocations on threads with no scope entered land here, and module
/// contexts are created as its children.
pub fn root() -> Arc<MemoryContext> {
    ROOT.clone()
}

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

struct HookGuard;

impl Drop for HookGuard {
    fn drop(&mut self) {
        let _ = IN_HOOK.try_with(|flag| flag.set(false));
    }
}

fn enter_hook() -> Option<HookGuard> {
    IN_HOOK
        .try_with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(HookGuard)
            }
        })
        .ok()
        .flatten()
}

/// Run `f` with the reentrancy flag held; `None` when already inside the
/// hook, in which case `f` is skipped entirely.
pub(crate) fn with_bookkeeping<R>(f: impl FnOnce() -> R) -> Option<R> {
    let _guard = enter_hook()?;
    Some(f())
}

fn attribution_context() -> Arc<MemoryContext> {
    scope::current().unwrap_or_else(root)
}

/// Global allocator attributing every allocation to a memory context.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackedAlloc;

// SAFETY: defers the actual allocation to System and only adds external
// bookkeeping; pointers are returned unchanged and every dealloc reaches
// System.dealloc with its original layout.
unsafe impl GlobalAlloc for TrackedAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            if let Some(_guard) = enter_hook() {
                attribution_context().record_alloc(ptr as usize, layout.size());
            }
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(_guard) = enter_hook() {
            let found = attribution_context().release_starting_here(ptr as usize);
            if !found && settings::debug_output() {
                debug!(
                    ptr = format_args!("{:#x}", ptr as usize),
                    "Untracked deallocation"
                );
            }
        }
        unsafe { System.dealloc(ptr, layout) }
    }
}
