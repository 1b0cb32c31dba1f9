//! # NGT Loader
//!
//! Dynamic module loading for the NGT plugin framework.
//!
//! A [`PluginManager`] takes list-style module paths (`plugins/plg_x`),
//! resolves them to platform library files, and drives each batch through
//! the five lifecycle steps: load, initialise, finalise, unload, destroy.
//! Within a batch every module finishes a step before any module starts
//! the next one, so cross-module dependencies resolve no matter the load
//! order. Every module gets its own component context and its own memory
//! context; calls into the module are bracketed with both.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ngt_context::ContextManager;
//! use ngt_loader::{discovery, PluginManager};
//!
//! fn main() -> ngt_loader::Result<()> {
//!     let contexts = ContextManager::new();
//!     let manager = PluginManager::new(contexts)?;
//!
//!     let listed = discovery::read_plugin_list(&manager.root().join("plugins.txt"))?;
//!     let loaded = manager.load_plugins(&listed);
//!
//!     // ... hand over to the application ...
//!
//!     manager.unload_plugins(&loaded);
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod discovery;
pub mod error;
pub mod manager;
pub mod memory;
mod module;
pub mod state;

pub use error::{LoaderError, Result};
pub use manager::PluginManager;
pub use memory::{ContextAllocator, MemoryContextCreator};
pub use state::ModuleState;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::{LoaderError, Result};
    pub use crate::manager::PluginManager;
    pub use crate::memory::{ContextAllocator, MemoryContextCreator};
    pub use crate::state::ModuleState;
}
