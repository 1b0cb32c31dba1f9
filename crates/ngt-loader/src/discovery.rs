//! Plugin list parsing and library path resolution
//!
//! Modules to load are named by list-style relative paths such as
//! `plugins/plg_editor`: no `lib` prefix, no extension. A list file holds
//! one such path per line; alternatively a folder can be scanned for
//! everything loadable. Either way the paths resolve against the host's
//! root directory (executable directory or `NGT_HOME`).

use crate::error::{LoaderError, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn platform_affixes() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("", ".dll")
    } else if cfg!(target_os = "macos") {
        ("lib", ".dylib")
    } else {
        ("lib", ".so")
    }
}

/// Read a plugin list file.
///
/// One relative path per line; `#`-prefixed lines are comments and blank
/// lines are ignored. Order is preserved, it becomes the load order.
pub fn read_plugin_list(path: &Path) -> Result<Vec<PathBuf>> {
    let text = fs::read_to_string(path).map_err(|source| LoaderError::list_file(path, source))?;
    let listed = parse_plugin_list(&text);
    debug!(list = %path.display(), count = listed.len(), "Plugin list read");
    Ok(listed)
}

/// Parse plugin list text. See [`read_plugin_list`].
pub fn parse_plugin_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}

/// Scan a folder for loadable modules, returned as list-style paths.
///
/// A file named `libplg_a.so` (platform equivalents likewise) is returned
/// as `<dir>/plg_a`. Sorted by name so the resulting load order is stable
/// across runs.
pub fn scan_plugin_folder(dir: &Path) -> Result<Vec<PathBuf>> {
    let (prefix, suffix) = platform_affixes();
    let entries = fs::read_dir(dir).map_err(|source| LoaderError::folder_scan(dir, source))?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoaderError::folder_scan(dir, source))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
        else {
            continue;
        };
        if stem.is_empty() {
            continue;
        }
        found.push(dir.join(stem));
    }

    found.sort();
    debug!(folder = %dir.display(), count = found.len(), "Plugin folder scanned");
    Ok(found)
}

/// The module name a listed path identifies: its final component.
///
/// Used as the module's context id and in log output.
pub fn module_name(listed: &Path) -> String {
    listed
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_owned()
}

/// Resolve a listed path to the concrete library file for this platform.
///
/// `plugins/plg_editor` becomes `<root>/plugins/libplg_editor.so` on
/// Linux, `libplg_editor.dylib` on macOS and `plg_editor.dll` on Windows.
/// Absolute listed paths ignore `root`.
pub fn platform_library_path(root: &Path, listed: &Path) -> PathBuf {
    let (prefix, suffix) = platform_affixes();
    let file = format!("{prefix}{}{suffix}", module_name(listed));
    let dir = listed.parent().unwrap_or_else(|| Path::new(""));
    if listed.is_absolute() {
        dir.join(file)
    } else {
        root.join(dir).join(file)
    }
}
