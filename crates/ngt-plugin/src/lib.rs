//! # NGT Plugin
//!
//! The ABI between the NGT loader and its modules: lifecycle states, the
//! `PLG_CALLBACK` entry point, the context handshake, and the service
//! interfaces host and modules exchange.
//!
//! A module implements [`Plugin`] and exports the entry points with
//! [`ngt_plugin!`]:
//!
//! ```
//! use ngt_context::{interfaces, ComponentContext, InterfaceHandle, Registration};
//! use ngt_plugin::{ngt_plugin, Plugin};
//! use std::sync::Arc;
//!
//! trait Echo: Send + Sync {
//!     fn echo(&self, s: &str) -> String;
//! }
//!
//! struct EchoImpl;
//!
//! impl Echo for EchoImpl {
//!     fn echo(&self, s: &str) -> String {
//!         s.to_owned()
//!     }
//! }
//!
//! #[derive(Default)]
//! struct EchoPlugin {
//!     handle: Option<InterfaceHandle>,
//! }
//!
//! impl Plugin for EchoPlugin {
//!     fn post_load(&mut self, context: &Arc<ComponentContext>) -> bool {
//!         self.handle = Some(context.register(interfaces!(EchoImpl => dyn Echo)));
//!         true
//!     }
//!
//!     fn unload(&mut self, _context: &Arc<ComponentContext>) {
//!         drop(self.handle.take());
//!     }
//! }
//!
//! ngt_plugin!(EchoPlugin);
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod entry;
pub mod env_ptr;
pub mod error;
pub mod host;
pub mod interfaces;
pub mod plugin;
pub mod state;

pub use error::{PluginError, Result};
pub use interfaces::{Application, CommandLine, ModuleAllocator};
pub use plugin::Plugin;
pub use state::LoadState;

/// Version of the entry ABI. Bumped whenever the wire contract changes;
/// the loader refuses modules reporting anything else.
pub const ABI_VERSION: u32 = 1;

/// Symbol every module exports for lifecycle dispatch.
pub const PLUGIN_ENTRY_SYMBOL: &str = "PLG_CALLBACK";

/// Symbol reporting the module's [`ABI_VERSION`], probed before the entry
/// point is trusted.
pub const PLUGIN_ABI_SYMBOL: &str = "ngt_plugin_abi_version";

/// Signature of the exported entry point.
pub type PluginEntryFn = unsafe extern "C" fn(u32) -> bool;

/// Signature of the exported ABI version probe.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;
