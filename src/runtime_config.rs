//! # Runtime Configuration Module
//!
//! Environment-variable settings for the daemon.
//!
//! ## Environment Variables
//!
//! ### `WORKOUT_HTTPD_ADDR`
//!
//! Address the daemon listens on. Default: `0.0.0.0:8000`
//!
//! ### `WORKOUT_HTTPD_DATA_DIR`
//!
//! Directory holding the workout files (`<id>.csv`). Default: `./data`
//!
//! ### `WORKOUT_HTTPD_POLL_MS`
//!
//! Longest time, in milliseconds, the reactor waits for a request before
//! sweeping sessions and checking the stop flag again. Accepts decimal or
//! `0x`-prefixed hexadecimal. Default: `1000`
//!
//! ## Usage
//!
//! ```rust
//! use workout_httpd::runtime_config::ServerSettings;
//!
//! let settings = ServerSettings::from_env();
//! println!("listening on {}", settings.addr);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_POLL_MS: u64 = 1000;

/// Daemon settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub addr: String,
    pub data_dir: PathBuf,
    /// Upper bound on a single reactor wait
    pub poll_interval: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

impl ServerSettings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let defaults = Self::default();
        let addr = lookup("WORKOUT_HTTPD_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.addr);
        let data_dir = lookup("WORKOUT_HTTPD_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let poll_ms = lookup("WORKOUT_HTTPD_POLL_MS")
            .and_then(|v| parse_millis(&v))
            .unwrap_or(DEFAULT_POLL_MS);
        Self {
            addr,
            data_dir,
            poll_interval: Duration::from_millis(poll_ms),
        }
    }
}

fn parse_millis(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let ms = match raw.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => raw.parse().ok()?,
    };
    (ms > 0).then_some(ms)
}
