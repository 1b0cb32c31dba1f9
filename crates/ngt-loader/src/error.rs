//! Error types for module loading

use crate::state::ModuleState;
use std::path::{Path, PathBuf};

/// Result type alias using [`LoaderError`]
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;

/// Error type for loader operations
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The dynamic library could not be opened
    #[error("Could not load module {path}: {source}")]
    LibraryLoad {
        /// Resolved library path
        path: PathBuf,
        /// Platform loader error
        source: libloading::Error,
    },

    /// A required export is missing from the module
    #[error("Module {name} does not export `{symbol}`: {source}")]
    MissingSymbol {
        /// Module name
        name: String,
        /// The symbol looked up
        symbol: &'static str,
        /// Platform loader error
        source: libloading::Error,
    },

    /// The module was built against a different entry ABI
    #[error("Module {name} reports entry ABI {found}, host expects {expected}")]
    AbiMismatch {
        /// Module name
        name: String,
        /// Version the module exported
        found: u32,
        /// Version this host was built with
        expected: u32,
    },

    /// A lifecycle step was driven out of order
    #[error("Module {name} is {state}, cannot run {step}")]
    StepOutOfOrder {
        /// Module name
        name: String,
        /// Current lifecycle state
        state: ModuleState,
        /// The step that was attempted
        step: &'static str,
    },

    /// A plugin list file could not be read
    #[error("Could not read plugin list {path}: {source}")]
    ListFile {
        /// List file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A plugin folder could not be scanned
    #[error("Could not scan plugin folder {path}: {source}")]
    FolderScan {
        /// Folder path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Home-path resolution failed
    #[error(transparent)]
    Env(#[from] ngt_core::Error),
}

impl LoaderError {
    /// Library open failure for `path`.
    pub fn library_load(path: impl Into<PathBuf>, source: libloading::Error) -> Self {
        Self::LibraryLoad {
            path: path.into(),
            source,
        }
    }

    /// Missing export `symbol` in module `name`.
    pub fn missing_symbol(
        name: impl Into<String>,
        symbol: &'static str,
        source: libloading::Error,
    ) -> Self {
        Self::MissingSymbol {
            name: name.into(),
            symbol,
            source,
        }
    }

    /// ABI version mismatch against [`ngt_plugin::ABI_VERSION`].
    pub fn abi_mismatch(name: impl Into<String>, found: u32) -> Self {
        Self::AbiMismatch {
            name: name.into(),
            found,
            expected: ngt_plugin::ABI_VERSION,
        }
    }

    /// Step attempted from an incompatible state.
    pub fn step_out_of_order(
        name: impl Into<String>,
        state: ModuleState,
        step: &'static str,
    ) -> Self {
        Self::StepOutOfOrder {
            name: name.into(),
            state,
            step,
        }
    }

    /// Plugin list read failure.
    pub fn list_file(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::ListFile {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Plugin folder scan failure.
    pub fn folder_scan(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::FolderScan {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoaderError::step_out_of_order("plg_test", ModuleState::Loaded, "finalise");
        assert_eq!(
            err.to_string(),
            "Module plg_test is loaded, cannot run finalise"
        );

        let err = LoaderError::abi_mismatch("plg_old", 7);
        assert!(err.to_string().contains("entry ABI 7"));
    }
}
