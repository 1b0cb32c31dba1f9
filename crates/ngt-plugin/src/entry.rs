//! Entry-point plumbing behind [`ngt_plugin!`](crate::ngt_plugin)
//!
//! The exported `PLG_CALLBACK` symbol is a thin shim over [`dispatch`],
//! which owns everything the shim must not get wrong: decoding the state
//! value, claiming the module's context from the handshake, bracketing the
//! call in an ambient scope, and keeping panics from unwinding across the
//! C boundary.

use crate::host;
use crate::plugin::Plugin;
use crate::state::LoadState;
use ngt_context::ambient;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Storage for the single plugin object of a module.
///
/// Declared `static` by [`ngt_plugin!`](crate::ngt_plugin); empty until
/// `Create`, emptied again on `Destroy`.
pub struct PluginCell<P>(Mutex<Option<P>>);

impl<P> PluginCell<P> {
    /// An empty cell.
    pub const fn new() -> Self {
        Self(Mutex::new(None))
    }
}

impl<P> Default for PluginCell<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for PluginCell<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = self.0.try_lock().map(|slot| slot.is_some());
        f.debug_struct("PluginCell")
            .field("occupied", &occupied)
            .finish()
    }
}

/// Run one lifecycle step against the module's plugin object.
///
/// Returns `false` for unknown state values, a missing handshake, a step
/// that signalled failure, or a panic inside the plugin.
///
/// # Safety
///
/// Same contract as [`host::current_context`]: the loader must have
/// published this module's live context before invoking the entry point
/// for any state other than `Create` and `Destroy`.
pub unsafe fn dispatch<P: Plugin + Default>(cell: &PluginCell<P>, raw_state: u32) -> bool {
    let state = match LoadState::try_from(raw_state) {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err, "Entry point called with unusable state");
            return false;
        }
    };

    match state {
        LoadState::Create => catch(state, || {
            *cell.0.lock() = Some(P::default());
            true
        }),
        LoadState::Destroy => catch(state, || {
            cell.0.lock().take();
            true
        }),
        LoadState::PostLoad | LoadState::Initialise | LoadState::Finalise | LoadState::Unload => {
            let context = match unsafe { host::current_context() } {
                Ok(context) => context,
                Err(err) => {
                    error!(state = %state, error = %err, "No context handshake for entry call");
                    return false;
                }
            };
            catch(state, move || {
                let _scope = ambient::enter(&context);
                let mut slot = cell.0.lock();
                let Some(plugin) = slot.as_mut() else {
                    error!(state = %state, "Entry called before create");
                    return false;
                };
                match state {
                    LoadState::PostLoad => plugin.post_load(&context),
                    LoadState::Initialise => {
                        plugin.initialise(&context);
                        true
                    }
                    LoadState::Finalise => {
                        plugin.finalise(&context);
                        true
                    }
                    LoadState::Unload => {
                        plugin.unload(&context);
                        true
                    }
                    LoadState::Create | LoadState::Destroy => true,
                }
            })
        }
    }
}

// The entry point is extern "C"; unwinding out of it is never an option.
fn catch(state: LoadState, body: impl FnOnce() -> bool) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(ok) => ok,
        Err(_) => {
            error!(state = %state, "Plugin panicked during lifecycle step");
            false
        }
    }
}

/// Export the NGT entry points for a plugin type.
///
/// The type must implement [`Plugin`](crate::Plugin) and [`Default`]. The
/// macro declares the module's plugin cell and exports `PLG_CALLBACK` plus
/// the ABI version probe the loader checks before anything else.
///
/// ```
/// use ngt_plugin::{ngt_plugin, Plugin};
///
/// #[derive(Default)]
/// struct Noop;
///
/// impl Plugin for Noop {}
///
/// ngt_plugin!(Noop);
/// ```
#[macro_export]
macro_rules! ngt_plugin {
    ($plugin:ty) => {
        static __NGT_PLUGIN_CELL: $crate::entry::PluginCell<$plugin> =
            $crate::entry::PluginCell::new();

        #[no_mangle]
        pub extern "C" fn ngt_plugin_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        #[allow(non_snake_case)]
        #[no_mangle]
        pub unsafe extern "C" fn PLG_CALLBACK(state: u32) -> bool {
            unsafe { $crate::entry::dispatch::<$plugin>(&__NGT_PLUGIN_CELL, state) }
        }
    };
}
