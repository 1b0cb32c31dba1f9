//! Module lifecycle states
//!
//! Each loaded module advances through a fixed sequence; the loader checks
//! every step against this table so driving the steps out of order (a
//! finalise before an initialise, a second load) is caught instead of
//! reaching the module's entry point.

use std::fmt;

/// Lifecycle position of a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Not loaded, or fully torn down again.
    Unloaded,
    /// Library open, entry resolved, interfaces registered.
    Loaded,
    /// Cross-module dependencies wired up.
    Initialised,
    /// Cross-module references released; teardown in progress.
    Finalising,
}

impl ModuleState {
    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_enter(self, next: ModuleState) -> bool {
        matches!(
            (self, next),
            (ModuleState::Unloaded, ModuleState::Loaded)
                | (ModuleState::Loaded, ModuleState::Initialised)
                | (ModuleState::Initialised, ModuleState::Finalising)
                | (ModuleState::Finalising, ModuleState::Unloaded)
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModuleState::Unloaded => "unloaded",
            ModuleState::Loaded => "loaded",
            ModuleState::Initialised => "initialised",
            ModuleState::Finalising => "finalising",
        };
        f.write_str(label)
    }
}
