//! Error types for dumon
//!
//! Validation errors are raised before any external command runs,
//! so a rejected request never leaves the displays half-switched.

#[derive(thiserror::Error, Debug)]
pub enum DumonError {
    #[error("no display tool found, checked for {candidates:?}")]
    ToolNotFound { candidates: Vec<String> },

    #[error("no connected outputs found")]
    NoOutputsFound,

    #[error("malformed output '{output}': {reason}")]
    MalformedOutput { output: String, reason: String },

    #[error("unknown output: {0}")]
    UnknownOutput(String),

    #[error("output '{output}' does not support resolution {resolution}")]
    UnknownResolution { output: String, resolution: String },

    #[error("invalid value '{value}' for '{field}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("missing mandatory option: {0}")]
    MissingField(String),

    #[error("unknown option: {0}")]
    UnknownField(String),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("profile '{name}' cannot be applied (unconnected output?)")]
    ProfileApplication {
        name: String,
        #[source]
        source: Box<DumonError>,
    },

    #[error("command `{command}` failed (exit status {status:?}): {stderr}")]
    ToolExecution {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("underlying I/O error")]
    Io(#[from] std::io::Error),

    #[error("JSON (de)serialization failed")]
    Json(#[from] serde_json::Error),
}

impl DumonError {
    pub(crate) fn invalid_value(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        expected: impl Into<String>,
    ) -> Self {
        DumonError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DumonError>;
