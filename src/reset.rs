//! Reset controller
//!
//! Two ways to get back to a single output at its native resolution:
//! - a running instance receives `SIGUSR1` and resets in its control loop;
//! - `dumon --reset` finds that running instance and sends it the signal.
//!
//! Signal handlers never touch application state. The listener thread only
//! forwards a [`ControlEvent`] over a channel to the main loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;
use tracing::{debug, info, warn};

use crate::constants::process::{CMDLINE_FILE, COMM_FILE, PROC_ROOT};
use crate::error::Result;

/// Signal a running instance resets on
pub const RESET_SIGNAL: Signal = Signal::SIGUSR1;

/// Requests delivered from signal handlers to the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Fall back to the first output at its default resolution
    Reset,
    /// Shut down in an orderly way
    Quit,
}

/// Spawns a background thread translating signals into control events.
///
/// The thread ends once the receiving side of `sender` is gone.
pub fn spawn_signal_listener(sender: Sender<ControlEvent>) -> Result<thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGUSR1, SIGINT, SIGTERM])?;

    let handle = thread::spawn(move || {
        info!("Signal listener started");
        for signal in signals.forever() {
            let event = if signal == SIGUSR1 {
                ControlEvent::Reset
            } else {
                ControlEvent::Quit
            };
            info!(signal, event = ?event, "Signal received");
            if sender.send(event).is_err() {
                debug!("Control loop gone, stopping signal listener");
                break;
            }
        }
    });

    Ok(handle)
}

/// Result of `--reset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The reset signal was delivered to this process id
    Signalled(u32),
    NoRunningInstance,
}

/// Read-only view of the Linux process table
#[derive(Debug, Clone)]
pub struct ProcessTable {
    root: PathBuf,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new(PROC_ROOT)
    }
}

impl ProcessTable {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Process ids in ascending order
    pub fn pids(&self) -> Result<Vec<u32>> {
        let mut pids: Vec<u32> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    /// First process other than `own_pid` running `program`
    pub fn find_instance(&self, program: &str, own_pid: u32) -> Result<Option<u32>> {
        for pid in self.pids()? {
            if pid == own_pid {
                continue;
            }
            let dir = self.root.join(pid.to_string());
            if runs_program(&dir, program) {
                debug!(pid, program = %program, "Found running instance");
                return Ok(Some(pid));
            }
        }
        Ok(None)
    }
}

/// Matches the command name or the basename of argv[0]; processes that
/// vanish while being inspected simply do not match
fn runs_program(dir: &Path, program: &str) -> bool {
    if let Ok(comm) = fs::read_to_string(dir.join(COMM_FILE)) {
        if comm.trim_end() == program {
            return true;
        }
    }

    let Ok(cmdline) = fs::read(dir.join(CMDLINE_FILE)) else {
        return false;
    };
    let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
    let argv0 = String::from_utf8_lossy(argv0);
    Path::new(argv0.as_ref())
        .file_name()
        .is_some_and(|name| name == program)
}

/// Sends [`RESET_SIGNAL`] to `pid`
pub fn send_reset_signal(pid: u32) -> Result<()> {
    let raw = i32::try_from(pid).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("pid out of range: {pid}"))
    })?;
    signal::kill(Pid::from_raw(raw), RESET_SIGNAL).map_err(std::io::Error::from)?;
    Ok(())
}

/// Asks an already running instance of `program` to reset.
pub fn request_reset(table: &ProcessTable, program: &str) -> Result<ResetOutcome> {
    request_reset_with(table, program, std::process::id(), send_reset_signal)
}

/// [`request_reset`] with an explicit own pid and delivery function
pub fn request_reset_with<F>(
    table: &ProcessTable,
    program: &str,
    own_pid: u32,
    deliver: F,
) -> Result<ResetOutcome>
where
    F: FnOnce(u32) -> Result<()>,
{
    match table.find_instance(program, own_pid)? {
        Some(pid) => {
            deliver(pid)?;
            info!(pid, "Reset signal delivered");
            Ok(ResetOutcome::Signalled(pid))
        }
        None => {
            warn!(program = %program, "No running instance found");
            Ok(ResetOutcome::NoRunningInstance)
        }
    }
}
