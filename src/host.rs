//! File-backed host configuration.
//!
//! [`JsonProfileHost`] keeps the current values in memory and stores each
//! profile as `<dir>/<profile>.json`, a flat JSON object keyed by the
//! variables' host-side names. It stands in for the application that
//! embeds the daemon when running the `workout-httpd` binary.

use crate::config_vars::{ConfigVar, HostConfig, DEFAULT_PROFILE};
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info};

pub const PROFILE_EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonProfileHost {
    dir: PathBuf,
    values: Map<String, Value>,
}

impl JsonProfileHost {
    /// Host with no values, saving profiles under `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            values: Map::new(),
        }
    }

    /// Host initialized from the `default` profile in `dir`, if there is one.
    pub fn load<P: Into<PathBuf>>(dir: P) -> Result<Self, ConfigError> {
        let mut host = Self::new(dir);
        let path = host.profile_path(DEFAULT_PROFILE);
        match fs::read_to_string(&path) {
            Ok(text) => {
                host.values = serde_json::from_str(&text)?;
                info!(path = %path.display(), vars = host.values.len(), "profile loaded");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no saved profile, starting empty");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(host)
    }

    pub fn profile_path(&self, profile: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", profile, PROFILE_EXT))
    }

    /// Current value stored under a host-side name.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }
}

fn valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl HostConfig for JsonProfileHost {
    fn read_value(&self, var: &ConfigVar) -> Result<String, ConfigError> {
        Ok(match self.values.get(&var.name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
    }

    fn write_value(&mut self, var: &ConfigVar, value: &str) -> Result<(), ConfigError> {
        if value.chars().any(char::is_control) {
            return Err(ConfigError::Rejected {
                name: var.lookup_name.clone(),
                reason: "control characters are not allowed".to_string(),
            });
        }
        self.values
            .insert(var.name.clone(), Value::String(value.to_string()));
        Ok(())
    }

    fn save_profile(&mut self, profile: &str) -> Result<(), ConfigError> {
        if !valid_profile_name(profile) {
            return Err(ConfigError::Rejected {
                name: profile.to_string(),
                reason: "invalid profile name".to_string(),
            });
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.profile_path(profile);
        let body = serde_json::to_vec_pretty(&self.values)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| ConfigError::Io(e.error))?;
        info!(path = %path.display(), "profile saved");
        Ok(())
    }
}
