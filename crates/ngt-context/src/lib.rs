//! # NGT Context
//!
//! Interface registry and dependency wiring for the NGT plugin framework.
//!
//! Modules publish the services they implement into a [`ComponentContext`]
//! and consume services of other modules through queries or tracked
//! [`DepRef`] references. Contexts form a tree managed by the
//! [`ContextManager`]: one root ("global") context plus one child per
//! loaded module, so a registration can be module-private or visible to
//! everyone.
//!
//! ## Example
//!
//! ```rust
//! use ngt_context::{interfaces, ComponentContext, DepRef, Registration};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_owned()
//!     }
//! }
//!
//! let context = ComponentContext::new_root("root");
//! let dep = DepRef::<dyn Greeter>::new(&context);
//! assert!(dep.get().is_none());
//!
//! context.register(interfaces!(English => dyn Greeter)).persist();
//! assert_eq!(dep.get().unwrap().greet(), "hello");
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod ambient;
pub mod context;
pub mod creator;
pub mod depends;
pub mod error;
pub mod holder;
pub mod manager;

pub use context::{
    ComponentContext, ContextListener, InterfaceHandle, ListenerGuard, RegScope,
};
pub use creator::ContextCreator;
pub use depends::DepRef;
pub use error::{ContextError, Result};
pub use holder::{InterfaceBox, Registration};
pub use manager::ContextManager;

// Re-export the id type registrations are keyed by
pub use ngt_core::InterfaceId;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::context::{ComponentContext, ContextListener, InterfaceHandle, RegScope};
    pub use crate::creator::ContextCreator;
    pub use crate::depends::DepRef;
    pub use crate::error::{ContextError, Result};
    pub use crate::holder::{InterfaceBox, Registration};
    pub use crate::manager::ContextManager;
    pub use ngt_core::InterfaceId;
}
