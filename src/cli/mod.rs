//! # CLI Module
//!
//! Command line for the `workout-httpd` binary, which embeds the daemon the
//! way a host application would: it owns the configuration (a
//! [`JsonProfileHost`](crate::host::JsonProfileHost)), starts the reactor on
//! the main thread and stops it on SIGINT/SIGTERM.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! ```bash
//! workout-httpd serve --addr 127.0.0.1:8000 --data-dir ./data --config-dir ./config
//! ```
//!
//! `--addr` and `--data-dir` fall back to `WORKOUT_HTTPD_ADDR` and
//! `WORKOUT_HTTPD_DATA_DIR`, then to the built-in defaults.
//!
//! ### `list`
//!
//! Print the workouts found in the data directory, newest first:
//!
//! ```bash
//! workout-httpd list --data-dir ./data
//! ```

mod commands;


pub use commands::{run_cli, Cli, Commands};
