//! Home-path and search-path resolution
//!
//! Plugin paths are resolved against a single root directory. The root is
//! the directory containing the running executable unless `NGT_HOME` is set,
//! in which case the override wins and is also prepended to `PATH` so
//! transitive library dependencies of loaded plugins resolve from the same
//! place.

use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the executable directory as the root for
/// plugin resolution.
pub const HOME_ENV: &str = "NGT_HOME";

/// Resolve the root directory plugins are loaded relative to.
///
/// `NGT_HOME` takes precedence when set and non-empty; otherwise the
/// directory of the current executable is used.
pub fn home_root() -> Result<PathBuf> {
    if let Some(home) = env::var_os(HOME_ENV) {
        if !home.is_empty() {
            debug!(home = %Path::new(&home).display(), "Using NGT_HOME as plugin root");
            return Ok(PathBuf::from(home));
        }
    }

    let exe = env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::env("executable path has no parent directory"))
}

/// Prepend a directory to the process `PATH`.
///
/// Loaded plugins may themselves depend on shared libraries shipped next to
/// them; putting the root first keeps those lookups inside the install tree.
pub fn prepend_search_path(dir: &Path) -> Result<()> {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(current) = env::var_os("PATH") {
        paths.extend(env::split_paths(&current));
    }
    let joined = env::join_paths(paths).map_err(Error::env)?;
    env::set_var("PATH", joined);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test body so the two cases cannot race on NGT_HOME.
    #[test]
    fn test_home_root_resolution() {
        env::remove_var(HOME_ENV);
        let fallback = home_root().unwrap();
        assert!(fallback.is_absolute());

        let dir = tempfile::tempdir().unwrap();
        env::set_var(HOME_ENV, dir.path());
        let overridden = home_root().unwrap();
        env::remove_var(HOME_ENV);
        assert_eq!(overridden, dir.path());
    }

    #[test]
    fn test_prepend_search_path() {
        let dir = tempfile::tempdir().unwrap();
        prepend_search_path(dir.path()).unwrap();
        let path = env::var_os("PATH").unwrap();
        let first = env::split_paths(&path).next().unwrap();
        assert_eq!(first, dir.path());
    }
}
