//! Scoped database sessions.
//!
//! A [`Session`] owns one SQLite connection for the duration of one table
//! check. It is released through [`Session::close`], which takes the
//! outcome of the work done with it so that the connection is closed on
//! the error path too.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, trace, warn};

use crate::error::Result;

/// An open connection to the database being synchronized.
pub struct Session {
    conn: SqliteConnection,
    path: PathBuf,
}

impl Session {
    /// Opens the database at `path`, creating the file if needed.
    ///
    /// The rollback journal is kept in `DELETE` mode so that the database
    /// file alone is a complete copy between statements.
    pub async fn open(path: &Path) -> Result<Self> {
        debug!(database = %path.display(), "Opening database");
        let conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .foreign_keys(true)
            .connect()
            .await?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying connection.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Executes one statement.
    pub async fn execute(&mut self, sql: &str) -> Result<()> {
        trace!(sql = %sql, "Executing SQL");
        sqlx::query(sql).execute(&mut self.conn).await?;
        Ok(())
    }

    /// Executes statements in order inside one transaction.
    pub async fn execute_all(&mut self, statements: &[String]) -> Result<()> {
        let mut tx = self.conn.begin().await?;
        for sql in statements {
            trace!(sql = %sql, "Executing SQL");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Executes statements that move tables around.
    ///
    /// Foreign key enforcement is switched off and legacy `ALTER TABLE`
    /// behavior switched on for the duration, so that renaming a parent
    /// table neither rewrites the references held by its children nor
    /// cascades deletes into them. Both settings are restored afterwards,
    /// whether or not the statements succeed.
    pub async fn execute_restructure(&mut self, statements: &[String]) -> Result<()> {
        self.execute("PRAGMA foreign_keys = OFF").await?;
        self.execute("PRAGMA legacy_alter_table = ON").await?;

        let outcome = self.execute_all(statements).await;

        let legacy = self.execute("PRAGMA legacy_alter_table = OFF").await;
        let foreign_keys = self.execute("PRAGMA foreign_keys = ON").await;
        let restored = legacy.and(foreign_keys);
        if let Err(e) = &restored {
            warn!(error = %e, "Unable to restore connection settings");
        }
        outcome.and(restored)
    }

    /// Closes the connection and passes `outcome` through.
    ///
    /// An error closing the connection is only reported when the work
    /// itself succeeded.
    pub async fn close<T>(self, outcome: Result<T>) -> Result<T> {
        let closed = self.conn.close().await;
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!(error = %close_error, "Unable to close database");
                }
                Err(e)
            }
        }
    }
}
