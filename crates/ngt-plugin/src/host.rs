//! Context handshake between loader and module
//!
//! Before invoking a module's entry point, the loader publishes that
//! module's [`ComponentContext`] through the environment. The entry side
//! claims it with [`current_context`], yielding an owned handle into the
//! host's context tree.

use crate::env_ptr;
use crate::error::Result;
use ngt_context::ComponentContext;
use std::sync::Arc;

/// Variable the loader publishes the current module's context under.
pub const CONTEXT_ENV: &str = "NGT_PLUGIN_CONTEXT";

/// Publish `context` for the module whose entry point is about to run.
///
/// The publisher must keep the context alive until [`clear_context`], or
/// every claim made in between dangles.
pub fn publish_context(context: &Arc<ComponentContext>) {
    env_ptr::publish(CONTEXT_ENV, Arc::as_ptr(context));
}

/// End the handshake started by [`publish_context`].
pub fn clear_context() {
    env_ptr::clear(CONTEXT_ENV);
}

/// Claim the context published by the loader.
///
/// # Safety
///
/// The pointer under [`CONTEXT_ENV`] must have been published from a live
/// `Arc<ComponentContext>` that the publisher keeps alive for the duration
/// of this call. The loader guarantees that around every entry-point
/// invocation; calling this from anywhere else is on the caller.
pub unsafe fn current_context() -> Result<Arc<ComponentContext>> {
    let ptr = env_ptr::retrieve::<ComponentContext>(CONTEXT_ENV)?;
    // SAFETY: per the function contract the pointee is a live Arc target
    // with strong count >= 1, so bumping the count and materializing an
    // owned Arc hands out an independent handle.
    unsafe {
        Arc::increment_strong_count(ptr);
        Ok(Arc::from_raw(ptr))
    }
}
