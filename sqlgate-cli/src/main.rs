//! `sqlgate` command-line runner.
//!
//! Applies the migration files in a directory to the database named by
//! `--database-url` / `DATABASE_URL`. Meant to be run from deployment scripts or
//! container entrypoints; any number of instances may run it at once.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod database;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    commands::execute(&cli.command, &cli.global, &mut std::io::stdout().lock())
}
