//! Database backups.
//!
//! A backup is a plain copy of the database file, named after the time
//! it was taken. The copy is checked against the original's size before
//! anything destructive is allowed to run.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{Result, SyncError};

fn timestamp(date_format: &str) -> Result<String> {
    let mut stamp = String::new();
    write!(stamp, "{}", Local::now().format(date_format))
        .map_err(|_| SyncError::DateFormat(date_format.to_string()))?;
    Ok(stamp)
}

/// Picks `<stamp>-<name>` in `dir`, or `<stamp>-<n>-<name>` if taken.
fn unused_path(dir: &Path, stamp: &str, name: &str) -> PathBuf {
    let mut path = dir.join(format!("{stamp}-{name}"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stamp}-{n}-{name}"));
        n += 1;
    }
    path
}

/// Copies `database` into `dir`, creating the directory if needed, and
/// returns the path of the copy.
///
/// # Errors
///
/// Returns [`SyncError::Backup`] if the copy fails and
/// [`SyncError::BackupIncomplete`] if it is shorter than the original.
pub fn make_backup(database: &Path, dir: &Path, date_format: &str) -> Result<PathBuf> {
    let Some(name) = database.file_name().and_then(|n| n.to_str()) else {
        return Err(SyncError::Backup {
            path: database.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a database file path"),
        });
    };
    fs::create_dir_all(dir).map_err(|source| SyncError::Backup {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = unused_path(dir, &timestamp(date_format)?, name);
    let copied = fs::copy(database, &path).map_err(|source| SyncError::Backup {
        path: path.clone(),
        source,
    })?;
    let original = fs::metadata(database)?.len();
    if copied != original || fs::metadata(&path)?.len() != original {
        return Err(SyncError::BackupIncomplete { path });
    }

    info!(database = %database.display(), backup = %path.display(), "Backed up database");
    Ok(path)
}
