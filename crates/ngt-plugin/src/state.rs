//! Lifecycle states passed through the entry point

use crate::error::PluginError;
use std::fmt;

/// State value handed to a module's entry point.
///
/// The loader drives each module through these in order on the way up
/// (`Create`, `PostLoad`, `Initialise`) and back down (`Finalise`,
/// `Unload`, `Destroy`). The value crosses the C boundary as a `u32`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Construct the plugin object.
    Create = 0,
    /// Register this module's interfaces.
    PostLoad = 1,
    /// Wire up cross-module dependencies.
    Initialise = 2,
    /// Release cross-module references.
    Finalise = 3,
    /// Deregister interfaces; the library is about to be unloaded.
    Unload = 4,
    /// Drop the plugin object.
    Destroy = 5,
}

impl LoadState {
    /// The wire value passed through the entry point.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for LoadState {
    type Error = PluginError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Create),
            1 => Ok(Self::PostLoad),
            2 => Ok(Self::Initialise),
            3 => Ok(Self::Finalise),
            4 => Ok(Self::Unload),
            5 => Ok(Self::Destroy),
            other => Err(PluginError::UnknownState(other)),
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::PostLoad => "post-load",
            Self::Initialise => "initialise",
            Self::Finalise => "finalise",
            Self::Unload => "unload",
            Self::Destroy => "destroy",
        };
        f.write_str(name)
    }
}
