//! Output topology model and the parser for the tool's query report
//!
//! The report is line oriented. A `<name> connected ...` line opens an output,
//! the mode lines that follow belong to it until the next `connected` or
//! `disconnected` line:
//!
//! ```text
//! DP-4 connected 1920x1080+0+0 (normal left inverted right x axis y axis) 531mm x 299mm
//!    1920x1080     60.00*+  59.94    50.00
//!    1680x1050     59.95
//! ```
//!
//! `+` marks the preferred (default) mode and `*` the currently active one.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::error::{DumonError, Result};

static CONNECTED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) connected\b").expect("connected-line pattern is valid")
});

static DISCONNECTED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) disconnected\b").expect("disconnected-line pattern is valid")
});

static MODE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+x\d+\w*)\s+(\d+(?:\.\d+)?.*)$").expect("mode-line pattern is valid")
});

const DEFAULT_MARKER: char = '+';
const CURRENT_MARKER: char = '*';

/// One connected video output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    pub name: String,
    /// Supported modes in report order, without duplicates
    pub resolutions: Vec<String>,
    /// Preferred mode, always one of `resolutions`
    pub default_resolution: String,
    /// Active mode, only set while the output is switched on
    pub current_resolution: Option<String>,
}

impl OutputDevice {
    /// Builds a device, checking that it has modes and a default among them
    pub fn new(
        name: impl Into<String>,
        resolutions: Vec<String>,
        default_resolution: Option<String>,
        current_resolution: Option<String>,
    ) -> Result<Self> {
        let name = name.into();
        if resolutions.is_empty() {
            return Err(DumonError::MalformedOutput {
                output: name,
                reason: "no resolutions".to_string(),
            });
        }
        let Some(default_resolution) = default_resolution else {
            return Err(DumonError::MalformedOutput {
                output: name,
                reason: "no default resolution".to_string(),
            });
        };
        if !resolutions.contains(&default_resolution) {
            return Err(DumonError::MalformedOutput {
                output: name,
                reason: format!("default resolution {default_resolution} not among its modes"),
            });
        }

        Ok(Self {
            name,
            resolutions,
            default_resolution,
            current_resolution,
        })
    }

    pub fn supports(&self, resolution: &str) -> bool {
        self.resolutions.iter().any(|r| r == resolution)
    }

    pub fn is_active(&self) -> bool {
        self.current_resolution.is_some()
    }
}

/// Connected outputs keyed by name, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    outputs: IndexMap<String, OutputDevice>,
}

/// Output being collected while walking the report
#[derive(Default)]
struct PendingOutput {
    name: String,
    resolutions: Vec<String>,
    default_resolution: Option<String>,
    current_resolution: Option<String>,
}

impl PendingOutput {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn add_mode(&mut self, resolution: &str, rates: &str) {
        if rates.contains(DEFAULT_MARKER) && self.default_resolution.is_none() {
            self.default_resolution = Some(resolution.to_string());
        }
        if rates.contains(CURRENT_MARKER) && self.current_resolution.is_none() {
            self.current_resolution = Some(resolution.to_string());
        }
        if !self.resolutions.iter().any(|r| r == resolution) {
            self.resolutions.push(resolution.to_string());
        }
    }

    fn finish(self) -> Result<OutputDevice> {
        OutputDevice::new(
            self.name,
            self.resolutions,
            self.default_resolution,
            self.current_resolution,
        )
    }
}

impl Topology {
    /// Parses a query report.
    ///
    /// Fails with [`DumonError::NoOutputsFound`] when nothing is connected and
    /// with [`DumonError::MalformedOutput`] when a connected output lists no
    /// modes or no default mode.
    pub fn parse(report: &str) -> Result<Self> {
        let mut pending: Vec<PendingOutput> = Vec::new();
        let mut open = false;

        for line in report.lines() {
            if let Some(caps) = CONNECTED_LINE.captures(line) {
                let name = &caps[1];
                // a repeated block for the same output starts over
                pending.retain(|p| p.name != name);
                pending.push(PendingOutput::named(name));
                open = true;
                continue;
            }
            if DISCONNECTED_LINE.is_match(line) {
                open = false;
                continue;
            }
            if !open {
                continue;
            }
            if let Some(caps) = MODE_LINE.captures(line) {
                if let Some(current) = pending.last_mut() {
                    current.add_mode(&caps[1], &caps[2]);
                }
            }
        }

        if pending.is_empty() {
            return Err(DumonError::NoOutputsFound);
        }

        let mut outputs = IndexMap::with_capacity(pending.len());
        for output in pending {
            let device = output.finish()?;
            outputs.insert(device.name.clone(), device);
        }

        debug!(outputs = ?outputs.keys().collect::<Vec<_>>(), "Outputs found");
        Ok(Self { outputs })
    }

    /// Builds a topology from already validated devices
    pub fn from_devices(devices: impl IntoIterator<Item = OutputDevice>) -> Self {
        Self {
            outputs: devices.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OutputDevice> {
        self.outputs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn devices(&self) -> impl Iterator<Item = &OutputDevice> {
        self.outputs.values()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// First discovered output, the target of a reset
    pub fn first(&self) -> Option<&OutputDevice> {
        self.outputs.values().next()
    }

    /// Looks up an output or fails with [`DumonError::UnknownOutput`]
    pub fn device(&self, name: &str) -> Result<&OutputDevice> {
        self.get(name)
            .ok_or_else(|| DumonError::UnknownOutput(name.to_string()))
    }

    pub fn default_resolution(&self, output: &str) -> Result<&str> {
        if self.is_empty() {
            return Err(DumonError::NoOutputsFound);
        }
        Ok(self.device(output)?.default_resolution.as_str())
    }

    /// Resolutions every output supports, in the order of the first output
    pub fn common_resolutions(&self) -> Result<Vec<String>> {
        let mut devices = self.outputs.values();
        let first = devices.next().ok_or(DumonError::NoOutputsFound)?;
        let others: Vec<&OutputDevice> = devices.collect();

        Ok(first
            .resolutions
            .iter()
            .filter(|res| others.iter().all(|o| o.supports(res)))
            .cloned()
            .collect())
    }
}
