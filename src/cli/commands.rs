use crate::config_vars::ConfigRegistry;
use crate::host::JsonProfileHost;
use crate::runtime_config::ServerSettings;
use crate::server::{AppService, DaemonHandle, HttpDaemon};
use crate::workout::WorkoutStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for the workout daemon
#[derive(Parser)]
#[command(name = "workout-httpd")]
#[command(about = "Configuration and workout review over plain HTML forms", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon until interrupted
    Serve {
        /// Listen address (default: 0.0.0.0:8000)
        #[arg(long, env = "WORKOUT_HTTPD_ADDR")]
        addr: Option<String>,

        /// Directory holding `<id>.csv` workout files (default: ./data)
        #[arg(long, env = "WORKOUT_HTTPD_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Directory holding configuration profiles
        #[arg(long, default_value = "./config")]
        config_dir: PathBuf,
    },
    /// List workouts in the data directory
    List {
        #[arg(long, env = "WORKOUT_HTTPD_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
}

/// Settings from the environment with command-line overrides applied.
pub(crate) fn resolve_settings(addr: Option<String>, data_dir: Option<PathBuf>) -> ServerSettings {
    let mut settings = ServerSettings::from_env();
    if let Some(addr) = addr {
        settings.addr = addr;
    }
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    settings
}

pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            addr,
            data_dir,
            config_dir,
        } => {
            let settings = resolve_settings(addr, data_dir);
            let mut host = JsonProfileHost::load(&config_dir)
                .with_context(|| format!("loading profile from {}", config_dir.display()))?;
            let service = AppService::new(
                WorkoutStore::new(&settings.data_dir),
                Arc::new(ConfigRegistry::default()),
            );
            let mut daemon = HttpDaemon::new(&settings, service);
            install_signal_handlers(daemon.handle())?;

            info!(
                addr = %settings.addr,
                data_dir = %settings.data_dir.display(),
                config_dir = %config_dir.display(),
                "starting workout daemon"
            );
            daemon.start(&mut host)?;
            Ok(())
        }
        Commands::List { data_dir } => {
            let settings = resolve_settings(None, data_dir);
            let store = WorkoutStore::new(&settings.data_dir);
            let ids = store
                .list()
                .with_context(|| format!("reading {}", settings.data_dir.display()))?;
            for id in ids {
                println!("{}\t{}", id, id.display_name());
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
fn install_signal_handlers(handle: DaemonHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;
    std::thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!(signal = sig, "stop requested");
                handle.stop();
            }
        })
        .context("spawning signal watcher")?;
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers(_handle: DaemonHandle) -> Result<()> {
    Ok(())
}
