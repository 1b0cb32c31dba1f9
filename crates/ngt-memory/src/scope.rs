//! Thread-local attribution stack
//!
//! Allocations are attributed to the top of the calling thread's scope
//! stack. The loader brackets every call into a module with that module's
//! scope, so worker threads can each be "inside" a different module at the
//! same time without interfering.

use crate::context::MemoryContext;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static STACK: RefCell<Vec<Arc<MemoryContext>>> = const { RefCell::new(Vec::new()) };
}

/// Attribute this thread's allocations to `context` until the returned
/// guard drops. Scopes nest; the innermost wins.
pub fn enter(context: &Arc<MemoryContext>) -> MemoryScope {
    STACK.with(|stack| stack.borrow_mut().push(context.clone()));
    MemoryScope {
        _not_send: PhantomData,
    }
}

/// The context allocations on this thread currently attribute to, if any.
///
/// Runs on the allocation hot path, so it degrades to `None` instead of
/// panicking when the stack is mid-update or the thread is shutting down.
pub fn current() -> Option<Arc<MemoryContext>> {
    STACK
        .try_with(|stack| stack.try_borrow().ok().and_then(|v| v.last().cloned()))
        .ok()
        .flatten()
}

/// Pops its scope from the thread's attribution stack on drop.
#[derive(Debug)]
#[must_use = "dropping the guard ends the attribution scope"]
pub struct MemoryScope {
    // Attribution is per thread; the guard must drop where it was created.
    _not_send: PhantomData<*const ()>,
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        let _ = STACK.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
