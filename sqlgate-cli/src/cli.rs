//! CLI argument definitions using clap derive API

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Apply a directory of SQL migration files, each exactly once
#[derive(Parser, Debug)]
#[command(name = "sqlgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Database URL: mysql://, postgres://, sqlite://<path> or sqlite::memory:
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Directory containing the migration files
    #[arg(long, env = "SQLGATE_DIR", global = true, default_value = "migrations")]
    pub dir: PathBuf,

    /// Name of the ledger table
    #[arg(long, global = true)]
    pub ledger_table: Option<String>,

    /// Extra file name to ignore in the migration directory (repeatable)
    #[arg(long = "baseline", value_name = "FILE", global = true)]
    pub baselines: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply all pending migrations
    Up(UpArgs),

    /// Show applied and pending migrations
    Status,

    /// List pending migration files
    Pending,
}

#[derive(Args, Debug, Default)]
pub struct UpArgs {
    /// Advisory lock name shared by concurrent instances
    #[arg(long)]
    pub lock_name: Option<String>,

    /// Seconds to wait for another instance holding the lock
    #[arg(long, value_name = "SECS")]
    pub lock_timeout: Option<u64>,

    /// Fail instead of running unlocked when the database has no advisory locks
    #[arg(long)]
    pub require_lock: bool,

    /// Skip statements whose objects already exist (default: only while the ledger is empty)
    #[arg(long, value_name = "BOOL")]
    pub tolerate_existing: Option<bool>,
}
