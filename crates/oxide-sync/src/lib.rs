//! Keeps a SQLite database in step with a declared schema.
//!
//! `oxide-sync` reads the structure of each declared table from a live
//! database, compares it with the declaration parsed by `oxide-ddl`, and
//! applies the smallest safe change:
//!
//! - **Create** - Tables that do not exist are created as declared
//! - **Add columns** - New columns SQLite can add in place are added
//! - **Rebuild** - Anything else backs the database up, moves the table
//!   aside, creates it afresh and copies the shared columns over
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_sync::prelude::*;
//!
//! let settings = Settings::new("scores.db");
//! let report = oxide_sync::init(&settings, &oxide_sync::app_schema::schema()).await?;
//! for table in &report.tables {
//!     println!("{}: {:?}", table.table, table.action);
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Report what differs
//! oxide-sync scores.db
//!
//! # Apply the changes, asking before each rebuild
//! oxide-sync scores.db --upgrade
//!
//! # Check against a schema file without asking
//! oxide-sync scores.db --schema schema.json --upgrade --force
//! ```

pub mod app_schema;
pub mod backup;
pub mod config;
pub mod confirm;
pub mod dialect;
pub mod error;
pub mod introspect;
pub mod planner;
pub mod session;
pub mod sync;

pub use backup::make_backup;
pub use error::{Result, SyncError};

use oxide_ddl::model::SchemaModel;

use crate::config::{Settings, SyncOptions};
use crate::confirm::Always;
use crate::dialect::SqliteDialect;
use crate::sync::{Report, Synchronizer};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{Settings, SyncOptions};
    pub use crate::confirm::{Always, Confirm, Prompt};
    pub use crate::dialect::{SchemaDialect, SqliteDialect, Statement};
    pub use crate::error::{Result, SyncError};
    pub use crate::planner::{Category, Plan};
    pub use crate::session::Session;
    pub use crate::sync::{Action, Report, Synchronizer, TableOutcome};
    pub use oxide_ddl::prelude::*;
}

/// Brings the database named in `settings` in line with `model`,
/// applying every change without asking. Meant for application startup.
pub async fn init(settings: &Settings, model: &SchemaModel) -> Result<Report> {
    Synchronizer::new(
        settings.clone(),
        SyncOptions::unattended(),
        SqliteDialect::new(),
        Always(true),
    )
    .run(model)
    .await
}
