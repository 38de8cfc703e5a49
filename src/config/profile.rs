//! Persisted configuration document with named layout profiles
//!
//! Each profile is the untyped request itself, with the schema version it
//! was saved with next to the request fields:
//!
//! ```json
//! {
//!   "version": "0.2.0",
//!   "profiles": {
//!     "desk": {
//!       "version": "0.2.0",
//!       "mode": "hsequence",
//!       "outputs": ["LVDS-0", "DP-4"],
//!       "primary": "DP-4"
//!     }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DumonError, Result};
use crate::options::Options;
use crate::request::SwitchRequest;

/// Schema version stamped into every document and profile written
pub const SCHEMA_VERSION: &str = env!("CARGO_PKG_VERSION");

const VERSION_KEY: &str = "version";

/// A named layout, stored in its untyped form
///
/// Entries that are not JSON objects cannot be turned into a request, but
/// are written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct Profile {
    /// Schema version at the time the profile was saved
    pub version: String,
    pub request: Options,
    unreadable: Option<Value>,
}

impl Profile {
    pub fn from_request(request: &SwitchRequest) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            request: request.to_options(),
            unreadable: None,
        }
    }

    /// Converts the stored options back into a typed request
    pub fn to_request(&self) -> Result<SwitchRequest> {
        if let Some(value) = &self.unreadable {
            return Err(DumonError::InvalidConfiguration(format!(
                "profile is not an object: {value}"
            )));
        }
        SwitchRequest::from_options(self.request.clone())
    }
}

impl From<Value> for Profile {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut request) => {
                let version = match request.get(VERSION_KEY) {
                    Some(Value::String(version)) => version.clone(),
                    _ => String::new(),
                };
                if !version.is_empty() {
                    request.remove(VERSION_KEY);
                }
                Self {
                    version,
                    request,
                    unreadable: None,
                }
            }
            other => Self {
                version: String::new(),
                request: Options::new(),
                unreadable: Some(other),
            },
        }
    }
}

impl From<Profile> for Value {
    fn from(profile: Profile) -> Self {
        if let Some(value) = profile.unreadable {
            return value;
        }
        let mut map = Map::new();
        if !profile.version.is_empty() {
            map.insert(VERSION_KEY.to_string(), Value::String(profile.version));
        }
        map.extend(profile.request);
        Value::Object(map)
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub profiles: IndexMap<String, Profile>,
    /// Top-level keys this version does not know about, kept as they are
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            profiles: IndexMap::new(),
            extra: Map::new(),
        }
    }
}

impl Configuration {
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Adds or replaces a profile, returning the one it replaced
    pub fn insert_profile(&mut self, name: &str, request: &SwitchRequest) -> Option<Profile> {
        self.profiles
            .insert(name.to_string(), Profile::from_request(request))
    }

    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        self.profiles.shift_remove(name)
    }
}
