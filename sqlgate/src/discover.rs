use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// A migration file found on disk. Its file name is its identity in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MigrationFile {
    pub name: String,
    pub path: PathBuf,
}

impl MigrationFile {
    /// Read the file's SQL text.
    pub fn read_sql(&self) -> Result<String, Error> {
        fs::read_to_string(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })
    }
}

/// List the migration files in `dir`, sorted by name.
///
/// Only regular files whose extension matches `extension` (case-insensitively) are
/// returned, minus any whose name is in `excluded`. Name order is byte-wise, which
/// is the order migrations are applied in.
pub(crate) fn discover(
    dir: &Path,
    extension: &str,
    excluded: &[String],
) -> Result<Vec<MigrationFile>, Error> {
    let directory_error = |source| Error::Directory {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(directory_error)? {
        let entry = entry.map_err(directory_error)?;
        let path = entry.path();
        if !entry.file_type().map_err(directory_error)?.is_file() {
            continue;
        }

        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !matches_extension {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(path = %path.display(), "Skipping migration file with non UTF-8 name");
            continue;
        };
        if excluded.iter().any(|x| *x == name) {
            continue;
        }

        files.push(MigrationFile { name, path });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
