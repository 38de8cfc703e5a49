#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use dumon::backend::XrandrBackend;
use dumon::config::{ProfileStore, SCHEMA_VERSION};
use dumon::constants::{logging, process};
use dumon::reset::{self, ProcessTable, ResetOutcome};
use dumon::{AppContext, DumonError, Topology};

/// Switch display output layouts and keep named profiles
#[derive(Parser, Debug)]
#[command(name = "dumon", version)]
struct Cli {
    /// Detach from the terminal and keep running in the background
    #[arg(long)]
    daemon: bool,

    /// Tell an already running instance to fall back to a single default output
    #[arg(long, conflicts_with_all = ["daemon", "list", "list_profiles", "profile"])]
    reset: bool,

    /// Print the connected outputs and their resolutions, then exit
    #[arg(long)]
    list: bool,

    /// Print the names of the saved profiles, then exit
    #[arg(long)]
    list_profiles: bool,

    /// Configuration file to use instead of the per-user default
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Profile to apply at startup
    #[arg(value_name = "profile:NAME", value_parser = parse_profile_arg)]
    profile: Option<String>,
}

fn parse_profile_arg(arg: &str) -> Result<String, String> {
    arg.strip_prefix("profile:")
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("expected profile:<name>, got '{arg}'"))
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var(logging::LEVEL_ENV)
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

fn remote_reset() -> Result<()> {
    let outcome = reset::request_reset(&ProcessTable::default(), process::PROGRAM_NAME)
        .context("Failed to signal running instance")?;
    match outcome {
        ResetOutcome::Signalled(pid) => println!("Reset requested from running instance (PID: {pid})"),
        ResetOutcome::NoRunningInstance => println!("No running instance found"),
    }
    Ok(())
}

fn print_topology(topology: &Topology) {
    for device in topology.devices() {
        let state = if device.is_active() { "on" } else { "off" };
        println!("{} ({state})", device.name);
        for res in &device.resolutions {
            let default = if *res == device.default_resolution { " [*]" } else { "" };
            let current = if device.current_resolution.as_ref() == Some(res) {
                " (current)"
            } else {
                ""
            };
            println!("  {res}{default}{current}");
        }
    }
}

/// Unknown profile names are fatal; a profile that does not fit the
/// connected outputs only produces a warning
fn apply_startup_profile(app: &mut AppContext, name: &str) -> Result<()> {
    match app.apply_profile(name) {
        Ok(_) => {
            info!(profile = %name, "Startup profile applied");
            Ok(())
        }
        Err(DumonError::ProfileNotFound(_)) => bail!("unknown profile: {name}"),
        Err(e) => {
            warn!(profile = %name, error = %e, "Profile use failed");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    info!("dumon {SCHEMA_VERSION}");

    if cli.reset {
        return remote_reset();
    }

    let store = cli
        .config
        .map(ProfileStore::new)
        .unwrap_or_else(ProfileStore::at_default_location);

    if cli.list_profiles {
        for name in store.load().profile_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let backend = XrandrBackend::new().context("Cannot manage outputs without a display tool")?;
    let mut app = AppContext::new(Box::new(backend), store)
        .context("Failed to read output devices")?;

    if cli.list {
        print_topology(app.topology());
        return Ok(());
    }

    if let Some(name) = &cli.profile {
        apply_startup_profile(&mut app, name)?;
    }

    if cli.daemon {
        nix::unistd::daemon(true, false).context("Failed to detach from terminal")?;
        info!(pid = std::process::id(), "Running as daemon");
    }

    let (control_tx, control_rx) = mpsc::channel();
    let _signal_handle = reset::spawn_signal_listener(control_tx)
        .context("Failed to install signal handlers")?;

    info!("Waiting for control signals (SIGUSR1 resets, SIGINT/SIGTERM quit)");
    app.run_control_loop(&control_rx);
    Ok(())
}
