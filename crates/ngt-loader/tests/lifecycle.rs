//! Lifecycle runs against the real fixture modules under `plugins/`.
//!
//! `cargo test` at the workspace root builds the fixture cdylibs along
//! with everything else. Each test copies them into a temporary host
//! root laid out like a shipped install, then drives the batch through
//! the five lifecycle steps.

use ngt_context::{ContextManager, Registration};
use ngt_loader::{discovery, ModuleState, PluginManager};
use ngt_plugin::CommandLine;
use parking_lot::Mutex;
use plg_api::{EchoService, FaultyMarker, WiringProbe};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// Entry calls publish the context handshake through the process
// environment; only one batch may be in flight per process.
static HANDSHAKE: Mutex<()> = Mutex::new(());

/// Locate a fixture cdylib in the workspace target directory.
fn find_cdylib(crate_name: &str) -> PathBuf {
    // Workspace root = CARGO_MANIFEST_DIR/../..
    let mut root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.pop();
    root.pop();
    let debug = root.join("target").join("debug");

    let (prefix, suffix) = if cfg!(target_os = "windows") {
        (crate_name.to_string(), ".dll")
    } else if cfg!(target_os = "macos") {
        (format!("lib{crate_name}"), ".dylib")
    } else {
        (format!("lib{crate_name}"), ".so")
    };

    let exact = debug.join(format!("{prefix}{suffix}"));
    if exact.is_file() {
        return exact;
    }
    if let Ok(entries) = fs::read_dir(debug.join("deps")) {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with(&prefix) && name.ends_with(suffix) {
                    return path;
                }
            }
        }
    }
    panic!(
        "fixture module `{crate_name}` not found under {}; \
         run the tests from the workspace root so the fixtures are built",
        debug.display()
    );
}

/// Host root with every fixture module installed under `plugins/`.
fn fixture_root() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for listed in ["plugins/plg_provider", "plugins/plg_consumer", "plugins/plg_faulty"] {
        let listed = Path::new(listed);
        let built = find_cdylib(&discovery::module_name(listed));
        let dest = discovery::platform_library_path(dir.path(), listed);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).expect("plugin directory");
        }
        fs::copy(&built, &dest).expect("install fixture module");
    }
    dir
}

struct Args;

impl CommandLine for Args {
    fn has_flag(&self, _name: &str) -> bool {
        false
    }

    fn value_of(&self, _name: &str) -> Option<String> {
        None
    }
}

fn manager_at(root: &Path) -> PluginManager {
    let contexts = ContextManager::new();
    contexts
        .global()
        .register(Registration::new(Args).implements::<dyn CommandLine>(|v| v))
        .persist();
    PluginManager::with_root(contexts, root)
}

#[test]
fn test_batch_lifecycle_with_cross_module_wiring() {
    let _serial = HANDSHAKE.lock();
    let dir = fixture_root();
    let manager = manager_at(dir.path());

    // The consumer is listed before the module it depends on; its
    // initialise step still resolves the service because the whole
    // batch finishes post-load first.
    let listed = [
        PathBuf::from("plugins/plg_consumer"),
        PathBuf::from("plugins/plg_provider"),
    ];
    let loaded = manager.load_plugins(&listed);
    assert_eq!(loaded, ["plg_consumer", "plg_provider"]);
    assert_eq!(
        manager.plugin_state("plg_consumer"),
        Some(ModuleState::Initialised)
    );

    let global = manager.context_manager().global();
    {
        let echo = global.query::<dyn EchoService>().expect("provider service");
        assert_eq!(echo.echo("host"), "provider:host");

        let probe = global.query::<dyn WiringProbe>().expect("consumer probe");
        assert_eq!(probe.provider_reply().as_deref(), Some("provider:ping"));
        assert!(!probe.finalised());
    }

    manager.run_finalise_step(&loaded);
    {
        // Interfaces stay registered through finalise; only the unload
        // step takes them down.
        let probe = global.query::<dyn WiringProbe>().expect("probe after finalise");
        assert!(probe.finalised());
    }
    assert_eq!(
        manager.plugin_state("plg_provider"),
        Some(ModuleState::Finalising)
    );

    manager.run_unload_step(&loaded);
    assert!(global.query::<dyn EchoService>().is_none());
    assert!(global.query::<dyn WiringProbe>().is_none());

    manager.run_destroy_step(&loaded);
    assert!(manager.loaded_plugins().is_empty());
    assert!(manager.context_manager().context("plg_provider").is_none());
    assert!(manager.context_manager().context("plg_consumer").is_none());
}

#[test]
fn test_failed_module_is_rolled_back() {
    let _serial = HANDSHAKE.lock();
    let dir = fixture_root();
    let manager = manager_at(dir.path());

    let listed = [
        PathBuf::from("plugins/plg_provider"),
        PathBuf::from("plugins/plg_faulty"),
    ];
    let loaded = manager.load_plugins(&listed);
    assert_eq!(loaded, ["plg_provider"]);
    assert!(manager.plugin_state("plg_faulty").is_none());

    let global = manager.context_manager().global();
    // The marker the module registered before failing went down with it.
    assert!(global.query::<dyn FaultyMarker>().is_none());
    assert!(global.query::<dyn EchoService>().is_some());
    assert!(manager.context_manager().context("plg_faulty").is_none());

    manager.unload_plugins(&loaded);
    assert!(manager.loaded_plugins().is_empty());
}

#[test]
fn test_plugin_list_drives_the_batch() {
    let _serial = HANDSHAKE.lock();
    let dir = fixture_root();
    let list = dir.path().join("plugins.txt");
    fs::write(
        &list,
        "# fixture batch\nplugins/plg_provider\n\nplugins/plg_consumer\n",
    )
    .expect("write plugin list");

    let manager = manager_at(dir.path());
    let listed = discovery::read_plugin_list(&list).expect("plugin list");
    let loaded = manager.load_plugins(&listed);
    assert_eq!(loaded, ["plg_provider", "plg_consumer"]);
    {
        let probe = manager
            .context_manager()
            .global()
            .query::<dyn WiringProbe>()
            .expect("consumer probe");
        assert_eq!(probe.provider_reply().as_deref(), Some("provider:ping"));
    }

    manager.unload_plugins(&loaded);
    assert!(manager.loaded_plugins().is_empty());
}

#[test]
fn test_drop_unloads_remaining_modules() {
    let _serial = HANDSHAKE.lock();
    let dir = fixture_root();
    let manager = manager_at(dir.path());
    let contexts = manager.context_manager().clone();

    let loaded = manager.load_plugins(&[PathBuf::from("plugins/plg_provider")]);
    assert_eq!(loaded, ["plg_provider"]);

    drop(manager);
    assert!(contexts.global().query::<dyn EchoService>().is_none());
    assert!(contexts.context("plg_provider").is_none());
}

#[test]
fn test_module_reloads_after_full_unload() {
    let _serial = HANDSHAKE.lock();
    let dir = fixture_root();
    let manager = manager_at(dir.path());
    let listed = [PathBuf::from("plugins/plg_provider")];

    let first = manager.load_plugins(&listed);
    assert_eq!(first, ["plg_provider"]);
    manager.unload_plugins(&first);
    assert!(manager.plugin_state("plg_provider").is_none());

    let second = manager.load_plugins(&listed);
    assert_eq!(second, ["plg_provider"]);
    {
        let echo = manager
            .context_manager()
            .global()
            .query::<dyn EchoService>()
            .expect("service after reload");
        assert_eq!(echo.echo("again"), "provider:again");
    }
    manager.unload_plugins(&second);
}
