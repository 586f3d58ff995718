#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use workout_httpd::{ConfigError, ConfigVar, HostConfig};

/// Host that records every accessor call.
#[derive(Default)]
pub struct RecordingHost {
    pub values: HashMap<String, String>,
    pub writes: Vec<(String, String)>,
    pub saved: Vec<String>,
    /// Form names whose writes are refused
    pub reject: Vec<String>,
}

impl HostConfig for RecordingHost {
    fn read_value(&self, var: &ConfigVar) -> Result<String, ConfigError> {
        Ok(self.values.get(&var.lookup_name).cloned().unwrap_or_default())
    }

    fn write_value(&mut self, var: &ConfigVar, value: &str) -> Result<(), ConfigError> {
        self.writes.push((var.lookup_name.clone(), value.to_string()));
        if self.reject.contains(&var.lookup_name) {
            return Err(ConfigError::Rejected {
                name: var.lookup_name.clone(),
                reason: "refused by test host".to_string(),
            });
        }
        self.values.insert(var.lookup_name.clone(), value.to_string());
        Ok(())
    }

    fn save_profile(&mut self, profile: &str) -> Result<(), ConfigError> {
        self.saved.push(profile.to_string());
        Ok(())
    }
}

pub const WORKOUT_ID: &str = "2013-06-01-07-30-00";

/// Two legs: (100, 1.0), (150, 1.2) then (200, 0.8) as deltas.
pub const TWO_LEG_WORKOUT: &str = "100,1,250,2.2\n450,3\n";

pub fn write_workout(dir: &Path, id: &str, content: &str) {
    std::fs::write(dir.join(format!("{}.csv", id)), content).unwrap();
}

/// `application/x-www-form-urlencoded` body from key/value pairs.
pub fn form_body(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}
