//! NGT host binary
//!
//! Boots the framework, loads the configured module batch and hands the
//! main loop to whichever module registered the `Application` interface.

use anyhow::{Context as _, Result};
use clap::Parser;
use ngt_context::{interfaces, ContextManager};
use ngt_loader::{discovery, PluginManager};
use ngt_memory::{settings, TrackedAlloc};
use ngt_plugin::{Application, CommandLine};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static ALLOC: TrackedAlloc = TrackedAlloc;

#[derive(Parser)]
#[command(name = "ngt")]
#[command(about = "NGT plugin host", long_about = None)]
#[command(version)]
struct Cli {
    /// Plugin list file, resolved against the host root when relative
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep going past failed module loads without asserting
    #[arg(long)]
    unattended: bool,

    /// Log every tracked allocation and release
    #[arg(long)]
    allocator_debug_output: bool,

    /// Capture a stack trace with every tracked allocation
    #[arg(long)]
    allocator_stack_traces: bool,

    /// Escalate leaks found at teardown to assertion failures
    #[arg(long)]
    allocator_leak_detection: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Raw process arguments behind the `CommandLine` interface, so plugins
/// can read host flags without reparsing or linking clap.
struct ProcessCommandLine {
    args: Vec<String>,
}

impl ProcessCommandLine {
    fn capture() -> Self {
        Self {
            args: std::env::args().skip(1).collect(),
        }
    }
}

impl CommandLine for ProcessCommandLine {
    fn has_flag(&self, name: &str) -> bool {
        let flag = format!("--{name}");
        self.args
            .iter()
            .any(|a| a == &flag || a.strip_prefix(&flag).is_some_and(|r| r.starts_with('=')))
    }

    fn value_of(&self, name: &str) -> Option<String> {
        let flag = format!("--{name}");
        let mut it = self.args.iter();
        while let Some(arg) = it.next() {
            if arg == &flag {
                return it.next().cloned();
            }
            if let Some(value) = arg.strip_prefix(&flag).and_then(|r| r.strip_prefix('=')) {
                return Some(value.to_owned());
            }
        }
        None
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("Host failed to start: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    settings::set_debug_output(cli.allocator_debug_output);
    settings::set_stack_traces(cli.allocator_stack_traces);
    settings::set_leak_detection(cli.allocator_leak_detection);

    let root = ngt_core::env::home_root().context("resolving the host root")?;
    ngt_core::env::prepend_search_path(&root).context("extending the search path")?;

    tracing::info!(root = %root.display(), unattended = cli.unattended, "Starting NGT host");

    let contexts = ContextManager::new();
    let exe = std::env::current_exe().context("resolving the executable path")?;
    contexts.set_executable_path(exe);
    contexts
        .global()
        .register(interfaces!(ProcessCommandLine::capture() => dyn CommandLine))
        .persist();

    let manager = PluginManager::with_root(contexts.clone(), &root);
    let listed = plugin_list(&manager, cli.config.as_deref())?;
    if listed.is_empty() {
        tracing::error!(root = %root.display(), "No plugins found");
        return Ok(ExitCode::from(2));
    }

    let loaded = manager.load_plugins(&listed);
    tracing::info!(requested = listed.len(), loaded = loaded.len(), "Module batch up");

    let code = match contexts.global().query::<dyn Application>() {
        Some(app) => app.start_application(),
        None => {
            tracing::error!("No module registered an Application interface");
            1
        }
    };

    manager.unload_plugins(&loaded);
    // Exit codes are a byte; mirror the OS truncation for anything wider.
    Ok(ExitCode::from(code as u8))
}

/// Where the module batch comes from: an explicit list file, the default
/// `plugins.txt` next to the executable, or a scan of the plugins folder.
fn plugin_list(manager: &PluginManager, config: Option<&Path>) -> Result<Vec<PathBuf>> {
    let root = manager.root();
    if let Some(listed) = config {
        let file = if listed.is_absolute() {
            listed.to_path_buf()
        } else {
            root.join(listed)
        };
        return discovery::read_plugin_list(&file).context("reading the plugin list");
    }

    let default = root.join("plugins.txt");
    if default.is_file() {
        return discovery::read_plugin_list(&default).context("reading plugins.txt");
    }

    let folder = root.join("plugins");
    if folder.is_dir() {
        return discovery::scan_plugin_folder(&folder).context("scanning the plugins folder");
    }
    Ok(Vec::new())
}

fn init_tracing(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into()))
        .init();
}
