//! Output management via the `xrandr` system tool

use tracing::{debug, info, warn};

use super::DisplayBackend;
use crate::constants::tool;
use crate::error::{DumonError, Result};
use crate::layout::{self, CommandInvocation};
use crate::request::ValidatedRequest;
use crate::runner::{ProcessRunner, SystemRunner, command_line};
use crate::topology::Topology;

pub struct XrandrBackend<R: ProcessRunner = SystemRunner> {
    tool: String,
    runner: R,
}

impl XrandrBackend<SystemRunner> {
    /// Locates `xrandr` on this system.
    pub fn new() -> Result<Self> {
        Self::with_runner(SystemRunner)
    }
}

impl<R: ProcessRunner> XrandrBackend<R> {
    /// Probes the candidate paths in order and keeps the first that can be
    /// invoked. Fails with [`DumonError::ToolNotFound`] when none can.
    pub fn with_runner(runner: R) -> Result<Self> {
        for candidate in tool::CANDIDATES {
            match runner.run(candidate, &[tool::PROBE_ARG.to_string()]) {
                Ok(_) => {
                    info!(tool = %candidate, "System tool found");
                    return Ok(Self {
                        tool: (*candidate).to_string(),
                        runner,
                    });
                }
                Err(e) => warn!(tool = %candidate, error = %e, "Unknown tool"),
            }
        }

        Err(DumonError::ToolNotFound {
            candidates: tool::CANDIDATES.iter().map(|c| (*c).to_string()).collect(),
        })
    }

    /// Path of the tool that answered the probe
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Spawn failures and non-zero exits both become
    /// [`DumonError::ToolExecution`]
    fn run(&self, args: &[String]) -> Result<String> {
        let output = self
            .runner
            .run(&self.tool, args)
            .map_err(|e| DumonError::ToolExecution {
                command: command_line(&self.tool, args),
                status: None,
                stderr: e.to_string(),
            })?;
        if !output.success() {
            return Err(DumonError::ToolExecution {
                command: command_line(&self.tool, args),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl<R: ProcessRunner> DisplayBackend for XrandrBackend<R> {
    fn read(&self) -> Result<Topology> {
        let report = self.run(&[tool::QUERY_ARG.to_string()])?;
        Topology::parse(&report)
    }

    fn compose(&self, topology: &Topology, request: &ValidatedRequest) -> Result<CommandInvocation> {
        layout::compose(&self.tool, topology, request)
    }

    fn execute(&self, invocation: &CommandInvocation) -> Result<String> {
        debug!(command = %invocation, "Executing");
        self.run(&invocation.args())
    }

    fn name(&self) -> &'static str {
        "xrandr"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SwitchRequest;
    use crate::runner::fake::FakeRunner;
    use crate::topology::tests::DUAL_REPORT;

    #[test]
    fn test_probe_takes_first_responding_candidate() {
        let backend = XrandrBackend::with_runner(FakeRunner::with_report(DUAL_REPORT)).unwrap();
        assert_eq!(backend.tool(), "xrandr");

        let backend =
            XrandrBackend::with_runner(FakeRunner::with_report(DUAL_REPORT).missing("xrandr")).unwrap();
        assert_eq!(backend.tool(), "/usr/bin/xrandr");
    }

    #[test]
    fn test_probe_fails_without_tool() {
        let runner = FakeRunner::default().missing("xrandr").missing("/usr/bin/xrandr");
        assert!(matches!(
            XrandrBackend::with_runner(runner),
            Err(DumonError::ToolNotFound { candidates }) if candidates.len() == 2
        ));
    }

    #[test]
    fn test_read_parses_query_output() {
        let backend = XrandrBackend::with_runner(FakeRunner::with_report(DUAL_REPORT)).unwrap();
        let topology = backend.read().unwrap();
        assert_eq!(topology.len(), 2);
        assert_eq!(topology.get("LVDS-0").unwrap().resolutions.len(), 1);
        assert_eq!(topology.get("DP-4").unwrap().resolutions.len(), 11);
        assert_eq!(backend.read().unwrap(), topology);
    }

    #[test]
    fn test_execute_runs_composed_command() {
        let backend = XrandrBackend::with_runner(FakeRunner::with_report(DUAL_REPORT)).unwrap();
        let topology = backend.read().unwrap();
        let request = SwitchRequest::single("DP-4", None).validate(&topology).unwrap();
        let invocation = backend.compose(&topology, &request).unwrap();
        backend.execute(&invocation).unwrap();

        assert_eq!(
            backend.runner.configure_calls(),
            vec!["xrandr --output DP-4 --mode 1920x1080 --pos 0x0 --output LVDS-0 --off"]
        );
    }

    #[test]
    fn test_execute_reports_tool_failure() {
        let backend = XrandrBackend::with_runner(FakeRunner::with_report(DUAL_REPORT)).unwrap();
        backend.runner.fail_configure(1, "xrandr: cannot find mode 1920x1080\n");
        let topology = backend.read().unwrap();
        let request = SwitchRequest::single("DP-4", None).validate(&topology).unwrap();
        let invocation = backend.compose(&topology, &request).unwrap();

        match backend.execute(&invocation) {
            Err(DumonError::ToolExecution { status, stderr, command }) => {
                assert_eq!(status, Some(1));
                assert_eq!(stderr, "xrandr: cannot find mode 1920x1080");
                assert!(command.starts_with("xrandr --output DP-4"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_reports_vanished_tool() {
        let mut backend = XrandrBackend::with_runner(FakeRunner::with_report(DUAL_REPORT)).unwrap();
        let topology = backend.read().unwrap();
        let request = SwitchRequest::single("LVDS-0", None).validate(&topology).unwrap();
        let invocation = backend.compose(&topology, &request).unwrap();

        // uninstalled after the probe
        backend.runner.missing.insert("xrandr".to_string());

        match backend.execute(&invocation) {
            Err(DumonError::ToolExecution { status, stderr, .. }) => {
                assert_eq!(status, None);
                assert!(stderr.contains("no such file"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
        assert!(matches!(backend.read(), Err(DumonError::ToolExecution { .. })));
    }
}
