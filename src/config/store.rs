//! Reading and writing the configuration file
//!
//! Reads never fail the caller: a missing file is created, a damaged one is
//! logged and treated as empty. Writes go to a temporary sibling first and
//! are renamed over the destination, so the file is either old or new.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{error, info, warn};

use super::profile::{Configuration, SCHEMA_VERSION};
use crate::constants::config::{APP_DIR, FILENAME, TEMP_SUFFIX};
use crate::error::{DumonError, Result};
use crate::request::ValidatedRequest;
use crate::topology::Topology;

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user location (`$XDG_CONFIG_HOME/dumon/dumon.json`)
    pub fn at_default_location() -> Self {
        Self::new(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration, creating an empty one on first run.
    pub fn load(&self) -> Configuration {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Config file not found, creating empty config");
            let config = Configuration::default();
            if let Err(e) = self.save(&config) {
                error!(path = %self.path.display(), error = %e, "Failed to create config file");
            }
            return config;
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read config file");
                return Configuration::default();
            }
        };

        if contents.trim().is_empty() {
            warn!(path = %self.path.display(), "Config file is empty");
            return Configuration::default();
        }

        match parse_document(&contents) {
            Ok(config) => {
                info!(profiles = config.profiles.len(), "Loaded config");
                config
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to parse config file, starting with empty config");
                Configuration::default()
            }
        }
    }

    /// Writes the configuration, stamped with the current schema version.
    pub fn save(&self, config: &Configuration) -> Result<()> {
        self.save_document(serde_json::to_value(config)?)
    }

    /// Writes a raw document; fails with
    /// [`DumonError::InvalidConfiguration`] unless it is a JSON object.
    pub fn save_document(&self, document: Value) -> Result<()> {
        let mut map = match document {
            Value::Object(map) => map,
            other => {
                return Err(DumonError::InvalidConfiguration(format!(
                    "expected an object, got {other}"
                )));
            }
        };
        map.insert("version".to_string(), Value::String(SCHEMA_VERSION.to_string()));
        let contents = serde_json::to_string_pretty(&Value::Object(map))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.path.with_extension(TEMP_SUFFIX);
        if let Err(e) = write_synced(&temp, contents.as_bytes()) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        info!(path = %self.path.display(), "Saved config");
        Ok(())
    }

    /// Looks up a profile and validates it against the connected outputs.
    ///
    /// The configuration is never modified, also not when the profile no
    /// longer fits the hardware.
    pub fn apply_profile(
        config: &Configuration,
        name: &str,
        topology: &Topology,
    ) -> Result<ValidatedRequest> {
        let profile = config
            .profile(name)
            .ok_or_else(|| DumonError::ProfileNotFound(name.to_string()))?;

        profile
            .to_request()
            .and_then(|request| request.validate(topology))
            .map_err(|source| DumonError::ProfileApplication {
                name: name.to_string(),
                source: Box::new(source),
            })
    }
}

fn parse_document(contents: &str) -> Result<Configuration> {
    let document: Value = serde_json::from_str(contents)?;
    if !document.is_object() {
        return Err(DumonError::InvalidConfiguration(
            "top-level value is not an object".to_string(),
        ));
    }
    Ok(serde_json::from_value(document)?)
}

/// Writes `bytes` to a fresh file; the file is closed when this returns,
/// whether the write succeeded or not
fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}
