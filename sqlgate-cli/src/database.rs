//! Backend selection from a database URL.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use sqlgate::mysql::MysqlBackend;
use sqlgate::postgres::PostgresBackend;
use sqlgate::sqlite::SqliteBackend;
use sqlgate::Backend;

#[derive(Debug, PartialEq, Eq)]
pub enum Target {
    Mysql(String),
    Postgres(String),
    SqliteFile(PathBuf),
    SqliteMemory,
}

impl Target {
    pub fn parse(url: &str) -> Result<Self> {
        if url.starts_with("mysql://") {
            return Ok(Self::Mysql(url.to_string()));
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Self::Postgres(url.to_string()));
        }
        if url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Ok(Self::SqliteMemory);
        }
        if let Some(path) = url.strip_prefix("sqlite://") {
            if path.is_empty() {
                bail!("sqlite URL has no file path: {}", url);
            }
            return Ok(Self::SqliteFile(PathBuf::from(path)));
        }
        bail!(
            "unsupported database URL scheme in '{}' (expected mysql://, postgres://, postgresql:// or sqlite://)",
            redact(url)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mysql(_) => "mysql",
            Self::Postgres(_) => "postgres",
            Self::SqliteFile(_) | Self::SqliteMemory => "sqlite",
        }
    }

    pub fn connect(&self) -> Result<Box<dyn Backend>> {
        let backend: Box<dyn Backend> = match self {
            Self::Mysql(url) => {
                Box::new(MysqlBackend::connect(url).context("failed to connect to MySQL")?)
            }
            Self::Postgres(url) => Box::new(
                PostgresBackend::connect(url).context("failed to connect to PostgreSQL")?,
            ),
            Self::SqliteFile(path) => Box::new(
                SqliteBackend::open(path)
                    .with_context(|| format!("failed to open SQLite database {}", path.display()))?,
            ),
            Self::SqliteMemory => Box::new(
                SqliteBackend::open_in_memory().context("failed to open in-memory SQLite")?,
            ),
        };
        Ok(backend)
    }
}

/// Drop any userinfo so passwords never reach the terminal.
fn redact(url: &str) -> String {
    match (url.find("://"), url.find('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
