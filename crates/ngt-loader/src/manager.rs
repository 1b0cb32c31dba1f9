//! Five-step module lifecycle
//!
//! The [`PluginManager`] loads a batch of modules, drives them through
//! their lifecycle as a cohort and unloads them again. The batch acts as
//! a barrier between steps: every module completes `PostLoad` before any
//! module runs `Initialise`, so initialisation code can resolve
//! interfaces registered by every other module of the batch. Load order
//! is recorded; unloading processes the given modules in reverse.

use crate::discovery;
use crate::error::{LoaderError, Result};
use crate::memory::{ContextAllocator, MemoryContextCreator};
use crate::module::LoadedModule;
use crate::state::ModuleState;
use ngt_context::{ContextCreator, ContextManager, InterfaceHandle, Registration};
use ngt_plugin::{CommandLine, LoadState};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Loads modules and drives their lifecycle.
pub struct PluginManager {
    contexts: Arc<ContextManager>,
    root: PathBuf,
    /// Loaded modules in load order. Guarded for `Sync`; the lifecycle
    /// itself is driven from one thread.
    modules: Mutex<Vec<LoadedModule>>,
    _allocator_creator: InterfaceHandle,
}

impl PluginManager {
    /// Manager resolving listed plugin paths against the host's root
    /// directory (`NGT_HOME` or the executable's directory).
    pub fn new(contexts: Arc<ContextManager>) -> Result<Self> {
        let root = ngt_core::env::home_root()?;
        Ok(Self::with_root(contexts, root))
    }

    /// Manager with an explicit resolution root.
    ///
    /// Registers the allocator creator, so every module context created
    /// for a load resolves `dyn ModuleAllocator` to its own attribution
    /// context, and the global context to root attribution.
    pub fn with_root(contexts: Arc<ContextManager>, root: impl Into<PathBuf>) -> Self {
        let allocator_creator = contexts.global().register(
            Registration::new(MemoryContextCreator::new(ngt_memory::root()))
                .implements::<dyn ContextCreator>(|v| v),
        );
        Self {
            contexts,
            root: root.into(),
            modules: Mutex::new(Vec::new()),
            _allocator_creator: allocator_creator,
        }
    }

    /// The context manager module contexts are created in.
    pub fn context_manager(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    /// Root directory listed plugin paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of loaded modules, in load order.
    pub fn loaded_plugins(&self) -> Vec<String> {
        self.modules.lock().iter().map(|m| m.name.clone()).collect()
    }

    /// Lifecycle state of a module, `None` when not loaded.
    pub fn plugin_state(&self, name: &str) -> Option<ModuleState> {
        self.modules
            .lock()
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.state)
    }

    /// Load and initialise a batch. Returns the names that made it in,
    /// in load order.
    pub fn load_plugins(&self, listed: &[PathBuf]) -> Vec<String> {
        let loaded = self.run_load_step(listed);
        self.run_initialise_step(&loaded);
        loaded
    }

    /// Finalise, unload and destroy a batch, in reverse of the given
    /// order.
    pub fn unload_plugins(&self, names: &[String]) {
        self.run_finalise_step(names);
        self.run_unload_step(names);
        self.run_destroy_step(names);
    }

    /// Step one: open every library, create contexts and notify `Create`
    /// then `PostLoad` across the whole batch.
    ///
    /// A module that cannot be opened, or whose `PostLoad` signals
    /// failure, is rolled back on the spot; the rest of the batch
    /// continues. Returns the surviving names in load order.
    pub fn run_load_step(&self, listed: &[PathBuf]) -> Vec<String> {
        let mut staged: Vec<LoadedModule> = Vec::new();

        for path in listed {
            let name = discovery::module_name(path);
            if name.is_empty() {
                warn!(listed = %path.display(), "Skipping unusable plugin path");
                continue;
            }
            if let Some(state) = self.plugin_state(&name) {
                if !state.can_enter(ModuleState::Loaded) {
                    let err = LoaderError::step_out_of_order(&name, state, "load");
                    error!(error = %err, "Load step skipped");
                    continue;
                }
            }
            if staged.iter().any(|m| m.name == name) {
                warn!(module = %name, "Duplicate entry in load batch, skipping");
                continue;
            }

            let resolved = discovery::platform_library_path(&self.root, path);
            let context = self.contexts.create_context(name.clone(), path.clone());
            let memory = context
                .query::<ContextAllocator>()
                .map(|alloc| alloc.memory().clone())
                .unwrap_or_else(|| ngt_memory::root().new_child(name.clone()));

            match LoadedModule::open(name.clone(), resolved, context, memory) {
                Ok(module) => staged.push(module),
                Err(err) => {
                    error!(module = %name, error = %err, "Module load failed");
                    if let Err(err) = self.contexts.destroy_context(&name) {
                        warn!(module = %name, error = %err, "Rollback of failed load");
                    }
                    self.debug_check_load_failure();
                }
            }
        }

        // The whole batch constructs before any PostLoad runs, and a
        // module's PostLoad may already see interfaces registered by an
        // earlier module's.
        for module in &staged {
            module.entry(LoadState::Create);
        }

        let mut survivors = Vec::new();
        let mut failed = Vec::new();
        for module in staged {
            if module.entry(LoadState::PostLoad) {
                survivors.push(module);
            } else {
                error!(module = %module.name, "PostLoad failed, rolling back");
                failed.push(module);
            }
        }

        // No partially-loaded module survives the pass: failures get the
        // Destroy matching their Create, then full context teardown.
        for module in failed {
            module.entry(LoadState::Destroy);
            if let Err(err) = self.contexts.destroy_context(&module.name) {
                warn!(module = %module.name, error = %err, "Rollback of failed PostLoad");
            }
        }

        let names: Vec<String> = survivors.iter().map(|m| m.name.clone()).collect();
        if !names.is_empty() {
            info!(count = names.len(), "Load step complete");
        }
        self.modules.lock().extend(survivors);
        names
    }

    /// Step two: notify `Initialise` across the batch, forward order.
    pub fn run_initialise_step(&self, names: &[String]) {
        let mut modules = self.modules.lock();
        for name in names {
            let Some(module) = modules.iter_mut().find(|m| m.name == *name) else {
                warn!(module = %name, "Initialise step for a module that is not loaded");
                continue;
            };
            if !module.state.can_enter(ModuleState::Initialised) {
                let err = LoaderError::step_out_of_order(name, module.state, "initialise");
                error!(error = %err, "Initialise step skipped");
                continue;
            }
            module.entry(LoadState::Initialise);
            module.state = ModuleState::Initialised;
        }
    }

    /// Step three: notify `Finalise`, reverse order. Modules release
    /// their cross-module references here.
    pub fn run_finalise_step(&self, names: &[String]) {
        let mut modules = self.modules.lock();
        for name in names.iter().rev() {
            let Some(module) = modules.iter_mut().find(|m| m.name == *name) else {
                warn!(module = %name, "Finalise step for a module that is not loaded");
                continue;
            };
            if !module.state.can_enter(ModuleState::Finalising) {
                let err = LoaderError::step_out_of_order(name, module.state, "finalise");
                error!(error = %err, "Finalise step skipped");
                continue;
            }
            module.entry(LoadState::Finalise);
            module.state = ModuleState::Finalising;
        }
    }

    /// Step four: notify `Unload`, reverse order.
    pub fn run_unload_step(&self, names: &[String]) {
        let mut modules = self.modules.lock();
        for name in names.iter().rev() {
            let Some(module) = modules.iter_mut().find(|m| m.name == *name) else {
                warn!(module = %name, "Unload step for a module that is not loaded");
                continue;
            };
            if !module.state.can_enter(ModuleState::Unloaded) {
                let err = LoaderError::step_out_of_order(name, module.state, "unload");
                error!(error = %err, "Unload step skipped");
                continue;
            }
            module.entry(LoadState::Unload);
            module.unload_notified = true;
        }
    }

    /// Step five: notify `Destroy`, tear down contexts and close the
    /// libraries, reverse order.
    ///
    /// Destroy notifications run across the whole batch first. Context
    /// teardown then deregisters every interface a module left behind,
    /// and finally each library closes after its memory context reported
    /// its leaks.
    pub fn run_destroy_step(&self, names: &[String]) {
        let mut torn_down: Vec<LoadedModule> = Vec::new();
        {
            let mut modules = self.modules.lock();
            for name in names.iter().rev() {
                let Some(pos) = modules.iter().position(|m| m.name == *name) else {
                    warn!(module = %name, "Destroy step for a module that is not loaded");
                    continue;
                };
                if !modules[pos].state.can_enter(ModuleState::Unloaded) {
                    let err = LoaderError::step_out_of_order(name, modules[pos].state, "destroy");
                    error!(error = %err, "Destroy step skipped");
                    continue;
                }
                debug_assert!(
                    modules[pos].unload_notified,
                    "destroy step without a prior unload step"
                );
                let module = modules.remove(pos);
                module.entry(LoadState::Destroy);
                torn_down.push(module);
            }
        }

        for module in &torn_down {
            if let Err(err) = self.contexts.destroy_context(&module.name) {
                warn!(module = %module.name, error = %err, "Context already gone at destroy");
            }
            // The drop below unmaps the library, so resolve now while frames
            // pointing into it still have symbols.
            module.memory.resolve_symbols();
            info!(module = %module.name, "Module unloaded");
        }
        drop(torn_down);
    }

    // A failed load asserts in debug when the host runs unattended, or
    // before any command line is registered at all.
    fn debug_check_load_failure(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let unattended = self
            .contexts
            .global()
            .query::<dyn CommandLine>()
            .map(|cli| cli.has_flag("unattended"))
            .unwrap_or(true);
        debug_assert!(!unattended, "a required module failed to load");
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        let names = self.loaded_plugins();
        if !names.is_empty() {
            info!(count = names.len(), "Unloading remaining modules");
            self.unload_plugins(&names);
        }
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("root", &self.root)
            .field("loaded", &self.loaded_plugins())
            .finish()
    }
}
