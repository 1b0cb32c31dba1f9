//! Service interfaces between host and modules
//!
//! These are the contracts every NGT application is expected to register
//! so plugins can reach host facilities through their context instead of
//! linking against the host.

/// The interface a plugin registers to become the application.
///
/// After every module is initialised, the host queries for this and hands
/// over the main loop. Exactly one module should provide it.
pub trait Application: Send + Sync {
    /// Run the application. The return value becomes the process exit
    /// code.
    fn start_application(&self) -> i32;
}

/// Host command line, registered globally by the executable.
pub trait CommandLine: Send + Sync {
    /// Whether `--name` was passed.
    fn has_flag(&self, name: &str) -> bool;

    /// The value of `--name <value>`, if present.
    fn value_of(&self, name: &str) -> Option<String>;
}

/// Raw allocation service attributed to the querying module.
///
/// Registered through a context creator, so each module context resolves
/// to an instance bound to that module's memory context and the root
/// context resolves to one bound to the root. Buffers must be released
/// through the same interface.
pub trait ModuleAllocator: Send + Sync {
    /// Allocate `size` bytes. Null on failure.
    fn allocate(&self, size: usize) -> *mut u8;

    /// Release a buffer obtained from [`allocate`](Self::allocate).
    ///
    /// Ownership may have been handed across modules; any module allocator
    /// of the same host accepts the pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer some module allocator's `allocate`
    /// returned in this process, not yet released.
    unsafe fn deallocate(&self, ptr: *mut u8);
}
