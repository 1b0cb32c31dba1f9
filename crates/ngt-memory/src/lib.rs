//! # NGT Memory
//!
//! Per-module allocation tracking for the NGT plugin framework.
//!
//! A [`MemoryContext`] is one node of an attribution tree: the process
//! [`root`] plus one child per loaded module. Installing [`TrackedAlloc`]
//! as the global allocator mirrors every heap allocation into whatever
//! context the current thread has entered with [`scope::enter`], so when a
//! module is unloaded its context can report exactly which buffers it
//! leaked. A buffer may be freed from any context of the tree; the record
//! is found where it was made.
//!
//! ## Example
//!
//! ```rust
//! use ngt_memory::root;
//!
//! let module = root().new_child("sample");
//!
//! let buffer = module.allocate(128);
//! assert_eq!(module.live_count(), 1);
//! assert_eq!(module.live_bytes(), 128);
//!
//! // SAFETY: buffer came from allocate above.
//! unsafe { module.deallocate(buffer) };
//! assert_eq!(module.live_count(), 0);
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod allocator;
pub mod context;
pub mod scope;
pub mod settings;
mod trace;

pub use allocator::{root, TrackedAlloc};
pub use context::MemoryContext;
pub use scope::MemoryScope;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::allocator::{root, TrackedAlloc};
    pub use crate::context::MemoryContext;
    pub use crate::scope::MemoryScope;
}

// The unit-test binary runs with tracking live so the hook tests in
// allocator.rs exercise real traffic.
#[cfg(test)]
#[global_allocator]
static TEST_ALLOC: TrackedAlloc = TrackedAlloc;
