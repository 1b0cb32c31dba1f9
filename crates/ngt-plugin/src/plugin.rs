//! The trait a module implements

use ngt_context::ComponentContext;
use std::sync::Arc;

/// Lifecycle hooks of one loaded module.
///
/// The loader drives the whole batch through each step before starting the
/// next, so `initialise` can rely on every module's interfaces being
/// registered, and `finalise` runs before any module starts deregistering.
/// All hooks receive the module's own context; registrations made through
/// it with global scope land in the root context.
///
/// All methods default to no-ops (`post_load` to success) so a plugin
/// implements only the steps it cares about.
pub trait Plugin: Send {
    /// Construct and register this module's interfaces. Returning `false`
    /// fails the load; the module is unloaded again without running any
    /// later step.
    fn post_load(&mut self, context: &Arc<ComponentContext>) -> bool {
        let _ = context;
        true
    }

    /// Wire up dependencies on other modules' interfaces.
    fn initialise(&mut self, context: &Arc<ComponentContext>) {
        let _ = context;
    }

    /// Release references into other modules.
    fn finalise(&mut self, context: &Arc<ComponentContext>) {
        let _ = context;
    }

    /// Last call before the library is removed from the process.
    fn unload(&mut self, context: &Arc<ComponentContext>) {
        let _ = context;
    }
}
