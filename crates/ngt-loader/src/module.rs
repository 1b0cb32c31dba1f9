//! One loaded module
//!
//! A [`LoadedModule`] owns the open library handle together with the
//! module's component context and memory context. Lifecycle calls go
//! through [`entry`](LoadedModule::entry), which brackets the module's
//! code so the context handshake and memory attribution are in place for
//! every call.

use crate::error::{LoaderError, Result};
use crate::state::ModuleState;
use libloading::{Library, Symbol};
use ngt_context::ComponentContext;
use ngt_memory::{scope, MemoryContext};
use ngt_plugin::{
    host, AbiVersionFn, LoadState, PluginEntryFn, ABI_VERSION, PLUGIN_ABI_SYMBOL,
    PLUGIN_ENTRY_SYMBOL,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

pub(crate) struct LoadedModule {
    pub(crate) name: String,
    pub(crate) resolved: PathBuf,
    pub(crate) context: Arc<ComponentContext>,
    pub(crate) state: ModuleState,
    pub(crate) unload_notified: bool,
    // The memory context must come before the library: its leak report
    // resolves frames pointing into the module's code, so it has to run
    // while the library is still mapped.
    pub(crate) memory: Arc<MemoryContext>,
    pub(crate) library: Library,
}

impl LoadedModule {
    /// Open the library, verify its ABI and resolve the entry point.
    pub(crate) fn open(
        name: String,
        resolved: PathBuf,
        context: Arc<ComponentContext>,
        memory: Arc<MemoryContext>,
    ) -> Result<Self> {
        // SAFETY: opening a module runs its library initialisers; modules
        // are installed host components, same trust as the host itself.
        let library = unsafe { Library::new(&resolved) }
            .map_err(|source| LoaderError::library_load(&resolved, source))?;

        // Probe the ABI before trusting any other export.
        let reported = {
            let version: Symbol<'_, AbiVersionFn> =
                unsafe { library.get(PLUGIN_ABI_SYMBOL.as_bytes()) }
                    .map_err(|source| LoaderError::missing_symbol(&name, PLUGIN_ABI_SYMBOL, source))?;
            // SAFETY: the probe takes no arguments and only returns a u32.
            unsafe { version() }
        };
        if reported != ABI_VERSION {
            return Err(LoaderError::abi_mismatch(name, reported));
        }

        // Resolve the entry point now so a module without one fails its
        // load, not its first lifecycle step.
        unsafe { library.get::<PluginEntryFn>(PLUGIN_ENTRY_SYMBOL.as_bytes()) }
            .map_err(|source| LoaderError::missing_symbol(&name, PLUGIN_ENTRY_SYMBOL, source))?;

        debug!(module = %name, path = %resolved.display(), "Module opened");
        Ok(Self {
            name,
            resolved,
            context,
            state: ModuleState::Loaded,
            unload_notified: false,
            memory,
            library,
        })
    }

    /// Drive one lifecycle state through the module's entry point.
    ///
    /// The module's context is published for the handshake and its memory
    /// context entered for the duration, so allocations made inside the
    /// module are attributed to it.
    pub(crate) fn entry(&self, load_state: LoadState) -> bool {
        let entry: Symbol<'_, PluginEntryFn> =
            match unsafe { self.library.get(PLUGIN_ENTRY_SYMBOL.as_bytes()) } {
                Ok(entry) => entry,
                Err(err) => {
                    error!(module = %self.name, error = %err, "Entry point vanished after load");
                    return false;
                }
            };

        host::publish_context(&self.context);
        let ok = {
            let _mem = scope::enter(&self.memory);
            // SAFETY: the ABI was verified at open, and the context outlives
            // the call, which is all the handshake hands out.
            unsafe { entry(load_state.as_u32()) }
        };
        host::clear_context();

        debug!(module = %self.name, state = %load_state, ok, "Lifecycle step");
        ok
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("resolved", &self.resolved)
            .finish()
    }
}
