//! # Configuration variables
//!
//! The host application owns the configuration object. The daemon only knows
//! the list of variables it may show and edit ([`ConfigVar`]) and reaches the
//! values through the host's accessors ([`HostConfig`]).
//!
//! A POST to the configuration form collects raw bytes per variable while the
//! body streams in (see [`crate::form::ingest`]). Once the body is consumed,
//! [`commit`] hands every variable's collected value to the host, and only if
//! the host accepted all of them is the result saved as the `default` profile.

use crate::error::ConfigError;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Profile written after a fully accepted configuration update.
pub const DEFAULT_PROFILE: &str = "default";

/// Largest value, in bytes, collected for one variable.
pub const MAX_VALUE_LEN: usize = 511;

/// One editable configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigVar {
    /// Host-side name
    pub name: String,
    /// Form field name and row label
    pub lookup_name: String,
    /// Rendered as a password input and never logged in clear
    pub is_password: bool,
}

impl ConfigVar {
    pub fn new(name: &str, lookup_name: &str, is_password: bool) -> Self {
        Self {
            name: name.to_string(),
            lookup_name: lookup_name.to_string(),
            is_password,
        }
    }

    /// Value as it may appear in logs.
    pub fn redact<'a>(&self, value: &'a str) -> &'a str {
        if self.is_password {
            "***"
        } else {
            value
        }
    }
}

/// Host configuration accessors.
pub trait HostConfig {
    /// Current value of `var`, as shown in the form.
    fn read_value(&self, var: &ConfigVar) -> Result<String, ConfigError>;

    /// Apply a submitted value to the host configuration.
    fn write_value(&mut self, var: &ConfigVar, value: &str) -> Result<(), ConfigError>;

    /// Persist every current value under `profile`.
    fn save_profile(&mut self, profile: &str) -> Result<(), ConfigError>;
}

/// The set of variables the configuration form exposes.
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    vars: Vec<ConfigVar>,
    by_lookup: HashMap<String, usize>,
}

impl ConfigRegistry {
    pub fn new(vars: Vec<ConfigVar>) -> Self {
        let by_lookup = vars
            .iter()
            .enumerate()
            .map(|(i, v)| (v.lookup_name.clone(), i))
            .collect();
        Self { vars, by_lookup }
    }

    pub fn vars(&self) -> &[ConfigVar] {
        &self.vars
    }

    /// Position of the variable whose form name is `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.by_lookup.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new(default_vars())
    }
}

/// Variables of the running companion app.
pub fn default_vars() -> Vec<ConfigVar> {
    vec![
        ConfigVar::new("user_name", "userName", false),
        ConfigVar::new("api_key", "apiKey", true),
        ConfigVar::new("units", "units", false),
        ConfigVar::new("auto_lap_distance", "autoLapDistance", false),
        ConfigVar::new("gps_interval", "gpsInterval", false),
    ]
}

/// Hand every collected value to the host, then save the default profile.
///
/// `pending` holds one buffer per registry variable, in registry order. Every
/// variable is written even after a rejection, so one bad field does not stop
/// the others from applying; the profile is saved only when all were
/// accepted. Buffers are cleared in every case.
pub fn commit(
    registry: &ConfigRegistry,
    pending: &mut [Vec<u8>],
    host: &mut dyn HostConfig,
) -> Result<(), ConfigError> {
    let mut first_error = None;

    for (var, buf) in registry.vars.iter().zip(pending.iter_mut()) {
        let value = String::from_utf8_lossy(buf).into_owned();
        buf.clear();
        debug!(var = %var.lookup_name, value = %var.redact(&value), "applying configuration value");
        if let Err(e) = host.write_value(var, &value) {
            warn!(var = %var.lookup_name, error = %e, "configuration value rejected");
            first_error.get_or_insert(e);
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    host.save_profile(DEFAULT_PROFILE)?;
    info!(profile = DEFAULT_PROFILE, vars = registry.len(), "configuration saved");
    Ok(())
}
