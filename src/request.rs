//! Layout switch requests
//!
//! [`SwitchRequest`] is the typed form used inside the program. Requests that
//! come from outside (saved profiles, the command line) arrive as untyped
//! [`Options`] and are converted with [`SwitchRequest::from_options`], which
//! runs them through the option validator first.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Value, json};

use crate::constants::request::NO_PRIMARY;
use crate::error::{DumonError, Result};
use crate::options::{self, Options, Schema};
use crate::topology::Topology;

/// Direction in which sequenced outputs are placed next to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Left to right, each output right of the previous one
    Horizontal,
    /// Top to bottom, each output below the previous one
    Vertical,
}

impl Direction {
    pub fn mode_name(self) -> &'static str {
        match self {
            Direction::Horizontal => mode::HSEQUENCE,
            Direction::Vertical => mode::VSEQUENCE,
        }
    }
}

/// Values of the `mode` field in untyped requests
pub mod mode {
    pub const SINGLE: &str = "single";
    pub const MIRROR: &str = "mirror";
    pub const HSEQUENCE: &str = "hsequence";
    pub const VSEQUENCE: &str = "vsequence";

    pub const ALL: [&str; 4] = [SINGLE, MIRROR, HSEQUENCE, VSEQUENCE];
}

/// A requested output layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchRequest {
    /// Only `output` is on; `None` resolution means its default
    Single {
        output: String,
        resolution: Option<String>,
    },
    /// Every output shows the same picture at `resolution`
    Mirror { resolution: String },
    /// Outputs placed next to each other in the given order
    Sequence {
        direction: Direction,
        outputs: Vec<String>,
        /// One entry per output; `None` means that output's default
        resolutions: Vec<Option<String>>,
        primary: Option<String>,
    },
}

impl SwitchRequest {
    pub fn single(output: impl Into<String>, resolution: Option<String>) -> Self {
        SwitchRequest::Single {
            output: output.into(),
            resolution,
        }
    }

    pub fn mirror(resolution: impl Into<String>) -> Self {
        SwitchRequest::Mirror {
            resolution: resolution.into(),
        }
    }

    pub fn horizontal(
        outputs: Vec<String>,
        resolutions: Vec<Option<String>>,
        primary: Option<String>,
    ) -> Self {
        SwitchRequest::Sequence {
            direction: Direction::Horizontal,
            outputs,
            resolutions,
            primary: primary.filter(|p| p != NO_PRIMARY),
        }
    }

    pub fn vertical(
        outputs: Vec<String>,
        resolutions: Vec<Option<String>>,
        primary: Option<String>,
    ) -> Self {
        SwitchRequest::Sequence {
            direction: Direction::Vertical,
            outputs,
            resolutions,
            primary: primary.filter(|p| p != NO_PRIMARY),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            SwitchRequest::Single { .. } => mode::SINGLE,
            SwitchRequest::Mirror { .. } => mode::MIRROR,
            SwitchRequest::Sequence { direction, .. } => direction.mode_name(),
        }
    }

    /// Schema for the untyped form of the given mode
    pub fn schema(mode_name: &str) -> Result<Schema> {
        let base = Schema::new().one_of("mode", [mode_name]);
        match mode_name {
            mode::SINGLE => Ok(base.mandatory("output").optional("resolution")),
            mode::MIRROR => Ok(base.mandatory("resolution")),
            mode::HSEQUENCE | mode::VSEQUENCE => Ok(base
                .mandatory("outputs")
                .optional("resolutions")
                .default_value("primary", NO_PRIMARY)),
            other => Err(DumonError::invalid_value(
                "mode",
                other,
                format!("one of {:?}", mode::ALL),
            )),
        }
    }

    /// Converts untyped options into a request.
    ///
    /// Checks field presence and value shapes only; whether the outputs exist
    /// is decided by [`SwitchRequest::validate`].
    pub fn from_options(options: Options) -> Result<Self> {
        let mode_name = match options.get("mode") {
            None | Some(Value::Null) => return Err(DumonError::MissingField("mode".to_string())),
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(DumonError::invalid_value(
                    "mode",
                    other,
                    format!("one of {:?}", mode::ALL),
                ));
            }
        };

        let schema = Self::schema(&mode_name)?;
        let options = options::verify_and_sanitize(options, &schema)?;

        match mode_name.as_str() {
            mode::SINGLE => Ok(SwitchRequest::Single {
                output: string_field(&options, "output")?,
                resolution: optional_string_field(&options, "resolution")?,
            }),
            mode::MIRROR => Ok(SwitchRequest::Mirror {
                resolution: string_field(&options, "resolution")?,
            }),
            _ => {
                let direction = if mode_name == mode::HSEQUENCE {
                    Direction::Horizontal
                } else {
                    Direction::Vertical
                };
                let outputs = string_list_field(&options, "outputs")?;
                let resolutions = match options.get("resolutions") {
                    None | Some(Value::Null) => vec![None; outputs.len()],
                    Some(_) => optional_string_list_field(&options, "resolutions")?,
                };
                let primary = optional_string_field(&options, "primary")?
                    .filter(|p| p != NO_PRIMARY);
                Ok(SwitchRequest::Sequence {
                    direction,
                    outputs,
                    resolutions,
                    primary,
                })
            }
        }
    }

    /// Untyped form, as stored in a profile
    pub fn to_options(&self) -> Options {
        let value = match self {
            SwitchRequest::Single { output, resolution } => {
                let mut value = json!({"mode": mode::SINGLE, "output": output});
                if let Some(resolution) = resolution {
                    value["resolution"] = json!(resolution);
                }
                value
            }
            SwitchRequest::Mirror { resolution } => {
                json!({"mode": mode::MIRROR, "resolution": resolution})
            }
            SwitchRequest::Sequence {
                direction,
                outputs,
                resolutions,
                primary,
            } => json!({
                "mode": direction.mode_name(),
                "outputs": outputs,
                "resolutions": resolutions,
                "primary": primary.as_deref().unwrap_or(NO_PRIMARY),
            }),
        };

        match value {
            Value::Object(map) => map,
            _ => Options::new(),
        }
    }

    /// Checks the request against the connected outputs.
    ///
    /// Nothing is executed; a request that passes can be composed into a
    /// command for the same topology without failing.
    pub fn validate(mut self, topology: &Topology) -> Result<ValidatedRequest> {
        if let SwitchRequest::Sequence { primary, .. } = &mut self {
            if primary.as_deref() == Some(NO_PRIMARY) {
                *primary = None;
            }
        }
        if topology.is_empty() {
            return Err(DumonError::NoOutputsFound);
        }

        match &self {
            SwitchRequest::Single { output, resolution } => {
                let device = topology.device(output)?;
                if let Some(resolution) = resolution {
                    if !device.supports(resolution) {
                        return Err(DumonError::UnknownResolution {
                            output: output.clone(),
                            resolution: resolution.clone(),
                        });
                    }
                }
            }
            SwitchRequest::Mirror { resolution } => {
                if let Some(device) = topology.devices().find(|d| !d.supports(resolution)) {
                    return Err(DumonError::UnknownResolution {
                        output: device.name.clone(),
                        resolution: resolution.clone(),
                    });
                }
            }
            SwitchRequest::Sequence {
                outputs,
                resolutions,
                primary,
                ..
            } => {
                if outputs.len() < 2 {
                    return Err(DumonError::invalid_value(
                        "outputs",
                        outputs.join(","),
                        "at least two outputs",
                    ));
                }
                if resolutions.len() != outputs.len() {
                    return Err(DumonError::invalid_value(
                        "resolutions",
                        resolutions.len(),
                        format!("{} entries, one per output", outputs.len()),
                    ));
                }
                let mut seen = HashSet::new();
                for (output, resolution) in outputs.iter().zip(resolutions) {
                    if !seen.insert(output.as_str()) {
                        return Err(DumonError::invalid_value(
                            "outputs",
                            output,
                            "each output at most once",
                        ));
                    }
                    let device = topology.device(output)?;
                    if let Some(resolution) = resolution {
                        if !device.supports(resolution) {
                            return Err(DumonError::UnknownResolution {
                                output: output.clone(),
                                resolution: resolution.clone(),
                            });
                        }
                    }
                }
                if let Some(primary) = primary {
                    if !outputs.contains(primary) {
                        return Err(DumonError::invalid_value(
                            "primary",
                            primary,
                            format!("one of {outputs:?} or \"{NO_PRIMARY}\""),
                        ));
                    }
                }
            }
        }

        Ok(ValidatedRequest(self))
    }
}

impl fmt::Display for SwitchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchRequest::Single { output, resolution } => write!(
                f,
                "only {output} at {}",
                resolution.as_deref().unwrap_or("default resolution")
            ),
            SwitchRequest::Mirror { resolution } => write!(f, "mirror at {resolution}"),
            SwitchRequest::Sequence {
                direction, outputs, ..
            } => {
                let joiner = match direction {
                    Direction::Horizontal => " left of ",
                    Direction::Vertical => " above ",
                };
                write!(f, "{}", outputs.join(joiner))
            }
        }
    }
}

/// A request that passed [`SwitchRequest::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest(SwitchRequest);

impl ValidatedRequest {
    pub fn request(&self) -> &SwitchRequest {
        &self.0
    }

    pub fn into_inner(self) -> SwitchRequest {
        self.0
    }
}

fn string_field(options: &Options, field: &str) -> Result<String> {
    match options.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => Err(DumonError::MissingField(field.to_string())),
        Some(other) => Err(DumonError::invalid_value(field, other, "a string")),
    }
}

fn optional_string_field(options: &Options, field: &str) -> Result<Option<String>> {
    match options.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DumonError::invalid_value(field, other, "a string or null")),
    }
}

fn string_list_field(options: &Options, field: &str) -> Result<Vec<String>> {
    let Some(Value::Array(items)) = options.get(field) else {
        return Err(DumonError::invalid_value(
            field,
            options.get(field).unwrap_or(&Value::Null),
            "a list of strings",
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(DumonError::invalid_value(field, other, "a list of strings")),
        })
        .collect()
}

fn optional_string_list_field(options: &Options, field: &str) -> Result<Vec<Option<String>>> {
    let Some(Value::Array(items)) = options.get(field) else {
        return Err(DumonError::invalid_value(
            field,
            options.get(field).unwrap_or(&Value::Null),
            "a list of strings or nulls",
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(Some(s.clone())),
            Value::Null => Ok(None),
            other => Err(DumonError::invalid_value(field, other, "a string or null")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::tests::dual_topology;

    fn opts(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_options_single() {
        let request = SwitchRequest::from_options(opts(json!({"mode": "single", "output": "DP-4"}))).unwrap();
        assert_eq!(request, SwitchRequest::single("DP-4", None));

        let request = SwitchRequest::from_options(opts(
            json!({"mode": "single", "output": "DP-4", "resolution": "1280x720"}),
        ))
        .unwrap();
        assert_eq!(request, SwitchRequest::single("DP-4", Some("1280x720".into())));
    }

    #[test]
    fn test_from_options_sequence_defaults() {
        let request = SwitchRequest::from_options(opts(
            json!({"mode": "hsequence", "outputs": ["LVDS-0", "DP-4"]}),
        ))
        .unwrap();
        assert_eq!(
            request,
            SwitchRequest::horizontal(names(&["LVDS-0", "DP-4"]), vec![None, None], None)
        );

        let request = SwitchRequest::from_options(opts(json!({
            "mode": "vsequence",
            "outputs": ["LVDS-0", "DP-4"],
            "resolutions": [null, "1280x720"],
            "primary": "DP-4",
        })))
        .unwrap();
        assert_eq!(
            request,
            SwitchRequest::vertical(
                names(&["LVDS-0", "DP-4"]),
                vec![None, Some("1280x720".into())],
                Some("DP-4".into())
            )
        );
    }

    #[test]
    fn test_from_options_rejects_bad_input() {
        assert!(matches!(
            SwitchRequest::from_options(opts(json!({"output": "DP-4"}))),
            Err(DumonError::MissingField(f)) if f == "mode"
        ));
        assert!(matches!(
            SwitchRequest::from_options(opts(json!({"mode": "spiral"}))),
            Err(DumonError::InvalidValue { field, .. }) if field == "mode"
        ));
        assert!(matches!(
            SwitchRequest::from_options(opts(json!({"mode": "mirror"}))),
            Err(DumonError::MissingField(f)) if f == "resolution"
        ));
        assert!(matches!(
            SwitchRequest::from_options(opts(json!({"mode": "mirror", "resolution": "800x600", "output": "DP-4"}))),
            Err(DumonError::UnknownField(f)) if f == "output"
        ));
        assert!(matches!(
            SwitchRequest::from_options(opts(json!({"mode": "single", "output": 4}))),
            Err(DumonError::InvalidValue { .. })
        ));
        assert!(matches!(
            SwitchRequest::from_options(opts(json!({"mode": "hsequence", "outputs": "DP-4"}))),
            Err(DumonError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_options_round_trip() {
        let requests = [
            SwitchRequest::single("DP-4", Some("1280x720".into())),
            SwitchRequest::mirror("800x600"),
            SwitchRequest::horizontal(
                names(&["LVDS-0", "DP-4"]),
                vec![Some("1600x900".into()), None],
                Some("DP-4".into()),
            ),
        ];
        for request in requests {
            assert_eq!(SwitchRequest::from_options(request.to_options()).unwrap(), request);
        }
    }

    #[test]
    fn test_validate_single() {
        let topology = dual_topology();
        assert!(SwitchRequest::single("DP-4", None).validate(&topology).is_ok());
        assert!(matches!(
            SwitchRequest::single("HDMI-1", None).validate(&topology),
            Err(DumonError::UnknownOutput(o)) if o == "HDMI-1"
        ));
        assert!(matches!(
            SwitchRequest::single("LVDS-0", Some("1920x1080".into())).validate(&topology),
            Err(DumonError::UnknownResolution { .. })
        ));
    }

    #[test]
    fn test_validate_mirror_needs_common_resolution() {
        let topology = dual_topology();
        assert!(matches!(
            SwitchRequest::mirror("1600x900").validate(&topology),
            Err(DumonError::UnknownResolution { output, .. }) if output == "DP-4"
        ));
    }

    #[test]
    fn test_validate_sequence_invariants() {
        let topology = dual_topology();
        let pair = names(&["LVDS-0", "DP-4"]);

        assert!(SwitchRequest::horizontal(pair.clone(), vec![None, None], Some("DP-4".into()))
            .validate(&topology)
            .is_ok());
        // too few outputs
        assert!(SwitchRequest::horizontal(names(&["DP-4"]), vec![None], None)
            .validate(&topology)
            .is_err());
        // length mismatch
        assert!(SwitchRequest::horizontal(pair.clone(), vec![None], None)
            .validate(&topology)
            .is_err());
        // duplicate output
        assert!(SwitchRequest::horizontal(names(&["DP-4", "DP-4"]), vec![None, None], None)
            .validate(&topology)
            .is_err());
        // primary not among outputs
        assert!(matches!(
            SwitchRequest::horizontal(pair.clone(), vec![None, None], Some("VGA-0".into()))
                .validate(&topology),
            Err(DumonError::InvalidValue { field, .. }) if field == "primary"
        ));
        // unsupported resolution
        assert!(matches!(
            SwitchRequest::vertical(pair, vec![Some("640x480".into()), None], None).validate(&topology),
            Err(DumonError::UnknownResolution { output, .. }) if output == "LVDS-0"
        ));
    }

    #[test]
    fn test_no_primary_sentinel_means_no_primary() {
        let topology = dual_topology();
        let pair = names(&["LVDS-0", "DP-4"]);

        let request = SwitchRequest::horizontal(pair.clone(), vec![None, None], Some("none".into()));
        assert_eq!(request, SwitchRequest::horizontal(pair.clone(), vec![None, None], None));
        assert!(request.validate(&topology).is_ok());

        let raw = SwitchRequest::Sequence {
            direction: Direction::Vertical,
            outputs: pair.clone(),
            resolutions: vec![None, None],
            primary: Some("none".into()),
        };
        let validated = raw.validate(&topology).unwrap();
        assert_eq!(
            validated.request(),
            &SwitchRequest::vertical(pair, vec![None, None], None)
        );
    }

    #[test]
    fn test_validate_against_empty_topology() {
        assert!(matches!(
            SwitchRequest::mirror("800x600").validate(&Topology::default()),
            Err(DumonError::NoOutputsFound)
        ));
    }

    #[test]
    fn test_display() {
        let request = SwitchRequest::horizontal(names(&["LVDS-0", "DP-4"]), vec![None, None], None);
        assert_eq!(request.to_string(), "LVDS-0 left of DP-4");
        assert_eq!(SwitchRequest::single("DP-4", None).to_string(), "only DP-4 at default resolution");
    }
}
