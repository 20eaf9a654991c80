//! Run settings.

use std::path::PathBuf;

/// Default database file.
pub const DEFAULT_DATABASE: &str = "scores.db";

/// Default backup directory.
pub const DEFAULT_BACKUPS: &str = "backups";

/// Default chrono format for backup timestamps.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Where the database lives and where backups go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Database file.
    pub database: PathBuf,
    /// Directory receiving backup copies.
    pub backups: PathBuf,
    /// chrono format used to timestamp backups.
    pub date_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            backups: PathBuf::from(DEFAULT_BACKUPS),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Settings {
    /// Settings for `database` with default backups.
    #[must_use]
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Sets the backup directory.
    #[must_use]
    pub fn backups(mut self, backups: impl Into<PathBuf>) -> Self {
        self.backups = backups.into();
        self
    }

    /// Sets the backup timestamp format.
    #[must_use]
    pub fn date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }
}

/// What a run is allowed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Apply changes; otherwise only report them.
    pub upgrade: bool,
    /// Treat a change in column order as a change.
    pub order_matters: bool,
    /// Rebuild tables without asking.
    pub force: bool,
    /// Restore tables left aside by an interrupted rebuild.
    pub recover: bool,
}

impl SyncOptions {
    /// Options that apply every change without asking.
    #[must_use]
    pub const fn unattended() -> Self {
        Self {
            upgrade: true,
            order_matters: false,
            force: true,
            recover: false,
        }
    }
}
