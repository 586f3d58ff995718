use clap::Parser;
use workout_httpd::cli::{run_cli, Cli};
use workout_httpd::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    run_cli(Cli::parse())
}
