//! Thread-local current context
//!
//! While a module's lifecycle entry points run, the loader enters that
//! module's context on the calling thread. Code executing inside can then
//! bind dependencies without threading a context handle through every call,
//! via [`current`] or [`DepRef::ambient`](crate::DepRef::ambient).

use crate::context::ComponentContext;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static STACK: RefCell<Vec<Arc<ComponentContext>>> = const { RefCell::new(Vec::new()) };
}

/// Make `context` the current context on this thread until the returned
/// guard drops. Scopes nest; the innermost wins.
pub fn enter(context: &Arc<ComponentContext>) -> AmbientGuard {
    STACK.with(|stack| stack.borrow_mut().push(context.clone()));
    AmbientGuard {
        _not_send: PhantomData,
    }
}

/// The innermost context entered on this thread, if any.
pub fn current() -> Option<Arc<ComponentContext>> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

/// Pops its scope from the thread's context stack on drop.
#[derive(Debug)]
#[must_use = "dropping the guard ends the ambient scope"]
pub struct AmbientGuard {
    // Scopes are per thread; the guard must drop where it was created.
    _not_send: PhantomData<*const ()>,
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some(), "ambient scope already ended");
        });
    }
}
