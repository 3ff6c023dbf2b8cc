//! Command implementations. Output goes to the given writer; logs go to stderr.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlgate::{Backend, LockPolicy, SqlMigrator};

use crate::cli::{Commands, GlobalArgs, UpArgs};
use crate::database::Target;

pub fn execute(command: &Commands, global: &GlobalArgs, out: &mut impl Write) -> Result<()> {
    let url = global
        .database_url
        .as_deref()
        .context("no database URL given; pass --database-url or set DATABASE_URL")?;
    let target = Target::parse(url)?;

    tracing::debug!(backend = target.kind(), dir = %global.dir.display(), "Connecting");
    let mut backend = target.connect()?;

    match command {
        Commands::Up(args) => up(backend.as_mut(), global, args, out),
        Commands::Status => status(backend.as_mut(), global, out),
        Commands::Pending => pending(backend.as_mut(), global, out),
    }
}

fn migrator(global: &GlobalArgs) -> SqlMigrator {
    let mut migrator = SqlMigrator::new(&global.dir);
    if let Some(table) = &global.ledger_table {
        migrator = migrator.with_ledger_table(table);
    }
    for baseline in &global.baselines {
        migrator = migrator.with_baseline(baseline);
    }
    migrator
}

pub fn up(
    backend: &mut dyn Backend,
    global: &GlobalArgs,
    args: &UpArgs,
    out: &mut impl Write,
) -> Result<()> {
    let mut migrator = migrator(global)
        .on_statement_skipped(|migration, statement, error| {
            tracing::warn!(migration, %error, "Skipped `{}`", statement);
        });
    if let Some(name) = &args.lock_name {
        migrator = migrator.with_lock_name(name);
    }
    if let Some(seconds) = args.lock_timeout {
        migrator = migrator.with_lock_timeout(Duration::from_secs(seconds));
    }
    if args.require_lock {
        migrator = migrator.with_lock_policy(LockPolicy::Required);
    }
    if let Some(tolerate) = args.tolerate_existing {
        migrator = migrator.with_tolerate_existing(tolerate);
    }

    let report = migrator
        .run(backend)
        .with_context(|| format!("migrating {}", global.dir.display()))?;

    if report.applied_files.is_empty() {
        writeln!(out, "Database is up to date.")?;
    } else {
        writeln!(out, "Applied {} migration(s):", report.applied_count)?;
        for name in &report.applied_files {
            writeln!(out, "  {}", name)?;
        }
    }
    Ok(())
}

pub fn status(backend: &mut dyn Backend, global: &GlobalArgs, out: &mut impl Write) -> Result<()> {
    let migrator = migrator(global);
    let history = migrator
        .history(backend)
        .context("failed to read migration history")?;
    let pending = migrator
        .preview(backend)
        .context("failed to compute pending migrations")?;

    writeln!(out, "Applied ({}):", history.len())?;
    for entry in &history {
        writeln!(
            out,
            "  {}  {}",
            entry.applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.migration
        )?;
    }
    writeln!(out, "Pending ({}):", pending.len())?;
    for file in &pending {
        writeln!(out, "  {}", file.name)?;
    }
    Ok(())
}

pub fn pending(backend: &mut dyn Backend, global: &GlobalArgs, out: &mut impl Write) -> Result<()> {
    let files = migrator(global)
        .preview(backend)
        .context("failed to compute pending migrations")?;
    for file in files {
        writeln!(out, "{}", file.name)?;
    }
    Ok(())
}
