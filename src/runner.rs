//! Spawning of external programs
//!
//! Everything that talks to the display tool goes through [`ProcessRunner`],
//! so tests can serve canned tool output without touching the real hardware.

use std::io;
use std::process::Command;

use tracing::debug;

/// Captured result of one finished external process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Capability to run an external program to completion
pub trait ProcessRunner {
    /// Runs `program` with `args` and blocks until it exits.
    ///
    /// An `Err` means the program could not be spawned at all.
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for std::rc::Rc<R> {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        (**self).run(program, args)
    }
}

/// Runs programs with [`std::process::Command`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        debug!(program = %program, args = ?args, "Spawning external command");
        let output = Command::new(program).args(args).output()?;
        Ok(ProcessOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Renders a program and its arguments the way a shell user would type them
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
