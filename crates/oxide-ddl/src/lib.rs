//! Declarative SQLite table definitions.
//!
//! `oxide-ddl` turns table definitions written as lists of SQL fragments
//! into the records SQLite reports about a table, and compares those
//! records with the ones read from a live database:
//!
//! - **Grammar** - A small engine matching trees of rules against text
//! - **Clauses** - The rules for column definitions and table constraints
//! - **Fragments** - Folding parsed clauses into pragma records
//! - **Model** - Ordered table specs and their dependency order
//! - **Diff** - The categorized difference between two record sets
//!
//! No database access happens here; see `oxide-sync` for that.
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::prelude::*;
//!
//! let players = TableSpec::new(
//!     "Players",
//!     ["Id INTEGER PRIMARY KEY AUTOINCREMENT", "Name TEXT NOT NULL"],
//! );
//! let records = players.desired_records().unwrap();
//! assert_eq!(records.len(), 2);
//!
//! let delta = SchemaDelta::compute("Players", &records, &[], DiffOptions::default());
//! assert_eq!(delta.fields_to_add.len(), 2);
//! ```

pub mod clause;
pub mod diff;
pub mod error;
pub mod fragment;
pub mod grammar;
pub mod model;
pub mod records;

pub use error::{Result, SchemaError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::diff::{AlteredField, DiffOptions, SchemaDelta};
    pub use crate::error::{Result, SchemaError};
    pub use crate::model::{SchemaModel, TableSpec};
    pub use crate::records::{
        ColumnRecord, ForeignKeyAction, ForeignKeyRecord, IndexOrigin, IndexRecord, Record,
    };
}
