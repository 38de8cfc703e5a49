//! Command synthesis for each layout mode
//!
//! [`compose`] turns a validated request into the exact tool invocation
//! without running anything, so a request can be logged or stored first.

use std::fmt;

use crate::constants::tool::ORIGIN;
use crate::error::{DumonError, Result};
use crate::request::{Direction, SwitchRequest, ValidatedRequest};
use crate::runner::command_line;
use crate::topology::Topology;

/// Placement of an output relative to another one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    RightOf(String),
    Below(String),
}

/// Everything the tool is told about one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputClause {
    pub output: String,
    /// `None` switches the output off
    pub mode: Option<String>,
    /// Absolute position, only used for the single layout
    pub position: Option<String>,
    pub primary: bool,
    pub anchor: Option<Anchor>,
}

impl OutputClause {
    fn on(output: &str, mode: &str) -> Self {
        Self {
            output: output.to_string(),
            mode: Some(mode.to_string()),
            position: None,
            primary: false,
            anchor: None,
        }
    }

    fn off(output: &str) -> Self {
        Self {
            output: output.to_string(),
            mode: None,
            position: None,
            primary: false,
            anchor: None,
        }
    }

    /// Arguments in the order output, mode, position, primary, anchor
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--output".to_string(), self.output.clone()];
        match &self.mode {
            Some(mode) => args.extend(["--mode".to_string(), mode.clone()]),
            None => {
                args.push("--off".to_string());
                return args;
            }
        }
        if let Some(position) = &self.position {
            args.extend(["--pos".to_string(), position.clone()]);
        }
        if self.primary {
            args.push("--primary".to_string());
        }
        match &self.anchor {
            Some(Anchor::RightOf(other)) => args.extend(["--right-of".to_string(), other.clone()]),
            Some(Anchor::Below(other)) => args.extend(["--below".to_string(), other.clone()]),
            None => {}
        }
        args
    }
}

/// A fully composed call of the display tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub clauses: Vec<OutputClause>,
}

impl CommandInvocation {
    pub fn args(&self) -> Vec<String> {
        self.clauses.iter().flat_map(OutputClause::args).collect()
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&command_line(&self.program, &self.args()))
    }
}

/// Builds the invocation of `program` that realizes `request` on `topology`
pub fn compose(
    program: &str,
    topology: &Topology,
    request: &ValidatedRequest,
) -> Result<CommandInvocation> {
    let clauses = match request.request() {
        SwitchRequest::Single { output, resolution } => single(topology, output, resolution.as_deref())?,
        SwitchRequest::Mirror { resolution } => mirror(topology, resolution)?,
        SwitchRequest::Sequence {
            direction,
            outputs,
            resolutions,
            primary,
        } => sequence(topology, *direction, outputs, resolutions, primary.as_deref())?,
    };

    Ok(CommandInvocation {
        program: program.to_string(),
        clauses,
    })
}

fn single(topology: &Topology, output: &str, resolution: Option<&str>) -> Result<Vec<OutputClause>> {
    let device = topology.device(output)?;
    let mode = resolution.unwrap_or(&device.default_resolution);

    let mut active = OutputClause::on(output, mode);
    active.position = Some(ORIGIN.to_string());

    let mut clauses = vec![active];
    clauses.extend(
        topology
            .names()
            .filter(|name| *name != output)
            .map(OutputClause::off),
    );
    Ok(clauses)
}

fn mirror(topology: &Topology, resolution: &str) -> Result<Vec<OutputClause>> {
    topology
        .devices()
        .map(|device| {
            if device.supports(resolution) {
                Ok(OutputClause::on(&device.name, resolution))
            } else {
                Err(DumonError::UnknownResolution {
                    output: device.name.clone(),
                    resolution: resolution.to_string(),
                })
            }
        })
        .collect()
}

fn sequence(
    topology: &Topology,
    direction: Direction,
    outputs: &[String],
    resolutions: &[Option<String>],
    primary: Option<&str>,
) -> Result<Vec<OutputClause>> {
    let mut clauses = Vec::with_capacity(outputs.len());
    let mut previous: Option<&str> = None;

    for (i, output) in outputs.iter().enumerate() {
        let device = topology.device(output)?;
        let mode = resolutions
            .get(i)
            .and_then(Option::as_deref)
            .unwrap_or(&device.default_resolution);

        let mut clause = OutputClause::on(output, mode);
        clause.primary = primary == Some(output.as_str());
        clause.anchor = previous.map(|prev| match direction {
            Direction::Horizontal => Anchor::RightOf(prev.to_string()),
            Direction::Vertical => Anchor::Below(prev.to_string()),
        });

        clauses.push(clause);
        previous = Some(output);
    }

    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::tests::dual_topology;

    fn composed(request: SwitchRequest) -> String {
        let topology = dual_topology();
        let validated = request.validate(&topology).unwrap();
        compose("xrandr", &topology, &validated).unwrap().to_string()
    }

    fn pair() -> Vec<String> {
        vec!["LVDS-0".to_string(), "DP-4".to_string()]
    }

    #[test]
    fn test_single_uses_default_and_switches_others_off() {
        assert_eq!(
            composed(SwitchRequest::single("DP-4", None)),
            "xrandr --output DP-4 --mode 1920x1080 --pos 0x0 --output LVDS-0 --off"
        );
        assert_eq!(
            composed(SwitchRequest::single("DP-4", Some("1280x720".into()))),
            "xrandr --output DP-4 --mode 1280x720 --pos 0x0 --output LVDS-0 --off"
        );
    }

    #[test]
    fn test_horizontal_sequence_primary_and_anchor() {
        assert_eq!(
            composed(SwitchRequest::horizontal(
                pair(),
                vec![Some("1600x900".into()), Some("1920x1080".into())],
                Some("DP-4".into()),
            )),
            "xrandr --output LVDS-0 --mode 1600x900 \
             --output DP-4 --mode 1920x1080 --primary --right-of LVDS-0"
        );
    }

    #[test]
    fn test_horizontal_sequence_clause_structure() {
        let topology = dual_topology();
        let validated = SwitchRequest::horizontal(pair(), vec![None, None], Some("DP-4".into()))
            .validate(&topology)
            .unwrap();
        let invocation = compose("xrandr", &topology, &validated).unwrap();

        assert_eq!(invocation.clauses.len(), 2);
        assert!(!invocation.clauses[0].primary);
        assert_eq!(invocation.clauses[0].anchor, None);
        assert!(invocation.clauses[1].primary);
        assert_eq!(invocation.clauses[1].anchor, Some(Anchor::RightOf("LVDS-0".into())));
    }

    #[test]
    fn test_vertical_sequence_defaults() {
        assert_eq!(
            composed(SwitchRequest::vertical(
                vec!["DP-4".to_string(), "LVDS-0".to_string()],
                vec![None, None],
                Some("DP-4".into()),
            )),
            "xrandr --output DP-4 --mode 1920x1080 --primary \
             --output LVDS-0 --mode 1600x900 --below DP-4"
        );
    }

    #[test]
    fn test_mirror_all_outputs() {
        let topology = Topology::parse(
            "\
HDMI-1 connected 1920x1080+0+0 (normal) 0mm x 0mm
   1920x1080     60.00*+
   1280x720      60.00
eDP-1 connected 1366x768+0+0 (normal) 0mm x 0mm
   1366x768      60.00*+
   1280x720      60.00
",
        )
        .unwrap();
        let validated = SwitchRequest::mirror("1280x720").validate(&topology).unwrap();
        assert_eq!(
            compose("xrandr", &topology, &validated).unwrap().to_string(),
            "xrandr --output HDMI-1 --mode 1280x720 --output eDP-1 --mode 1280x720"
        );
    }

    #[test]
    fn test_compose_against_changed_topology() {
        let topology = dual_topology();
        let validated = SwitchRequest::single("DP-4", None).validate(&topology).unwrap();
        let shrunk = Topology::from_devices(topology.get("LVDS-0").cloned());
        assert!(matches!(
            compose("xrandr", &shrunk, &validated),
            Err(DumonError::UnknownOutput(o)) if o == "DP-4"
        ));

        let mirrored = SwitchRequest::mirror("1600x900")
            .validate(&Topology::from_devices(topology.get("LVDS-0").cloned()))
            .unwrap();
        assert!(matches!(
            compose("xrandr", &topology, &mirrored),
            Err(DumonError::UnknownResolution { output, .. }) if output == "DP-4"
        ));
    }

    #[test]
    fn test_off_clause_has_no_mode() {
        assert_eq!(OutputClause::off("VGA-0").args(), vec!["--output", "VGA-0", "--off"]);
    }
}
