//! Application-wide constants
//!
//! Magic strings shared by the backend, the profile store and the reset
//! controller live here so there is a single source of truth for them.

/// External display tool (xrandr) constants
pub mod tool {
    /// Candidate executables, probed in order; the first one that can be
    /// invoked wins
    pub const CANDIDATES: &[&str] = &["xrandr", "/usr/bin/xrandr"];

    /// Argument used to probe whether a candidate responds
    pub const PROBE_ARG: &str = "--version";

    /// Argument for the query mode that prints one block per output
    pub const QUERY_ARG: &str = "-q";

    /// Position used for the single active output
    pub const ORIGIN: &str = "0x0";
}

/// Configuration file location
pub mod config {
    /// Directory under the user's config dir
    pub const APP_DIR: &str = "dumon";

    /// Configuration file name
    pub const FILENAME: &str = "dumon.json";

    /// Suffix of the temporary file written before the atomic rename
    pub const TEMP_SUFFIX: &str = "tmp";
}

/// Process discovery constants (for `--reset`)
pub mod process {
    /// Name the running instance is matched against
    pub const PROGRAM_NAME: &str = "dumon";

    /// Root of the Linux process table
    pub const PROC_ROOT: &str = "/proc";

    /// Per-process file holding the (possibly truncated) command name
    pub const COMM_FILE: &str = "comm";

    /// Per-process file holding the NUL-separated argument vector
    pub const CMDLINE_FILE: &str = "cmdline";
}

/// Sentinel values used in untyped requests
pub mod request {
    /// `primary` value meaning "no primary output"
    pub const NO_PRIMARY: &str = "none";
}

/// Logging constants
pub mod logging {
    /// Environment variable selecting the max log level
    pub const LEVEL_ENV: &str = "LOG_LEVEL";
}
