//! Pragma records.
//!
//! These mirror the rows SQLite reports from `PRAGMA table_info`,
//! `PRAGMA foreign_key_list` and `PRAGMA index_list`. The fragment parser
//! produces them from declared table specs and the live reader produces
//! them from a database, so the two can be compared directly.

use std::fmt;

use serde::Serialize;

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses an action as written in SQL or reported by SQLite,
    /// ignoring case and spacing.
    #[must_use]
    pub fn from_sql(text: &str) -> Option<Self> {
        let words: Vec<String> = text
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .collect();
        match words.join(" ").as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql())
    }
}

/// How an index came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IndexOrigin {
    /// Created by `CREATE INDEX` (`c`).
    Explicit,
    /// Created for a PRIMARY KEY constraint (`pk`).
    PrimaryKey,
    /// Created for a UNIQUE constraint (`u`).
    Unique,
}

impl IndexOrigin {
    /// Returns the code SQLite reports for this origin.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Explicit => "c",
            Self::PrimaryKey => "pk",
            Self::Unique => "u",
        }
    }

    /// Parses an origin code from `PRAGMA index_list`.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Self::Explicit),
            "pk" => Some(Self::PrimaryKey),
            "u" => Some(Self::Unique),
            _ => None,
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRecord {
    /// Position of the column in the table.
    pub cid: usize,
    /// Column name.
    pub name: String,
    /// Declared type text (may be empty).
    pub type_name: String,
    /// Whether the column is declared NOT NULL.
    pub not_null: bool,
    /// Default value text, if any.
    pub default: Option<String>,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl ColumnRecord {
    /// Creates a nullable, non-key column with no default.
    #[must_use]
    pub fn new(cid: usize, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            cid,
            name: name.into(),
            type_name: type_name.into(),
            not_null: false,
            default: None,
            primary_key: false,
        }
    }
}

/// One column pair of a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyRecord {
    /// Constraint id; shared by all pairs of one constraint.
    pub id: usize,
    /// Position of the pair within the constraint.
    pub seq: usize,
    /// Referenced table.
    pub table: String,
    /// Local column.
    pub from: String,
    /// Referenced column, absent when the primary key is implied.
    pub to: Option<String>,
    /// ON UPDATE action.
    pub on_update: ForeignKeyAction,
    /// ON DELETE action.
    pub on_delete: ForeignKeyAction,
    /// MATCH clause name.
    pub match_clause: Option<String>,
}

/// One index of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRecord {
    /// Position of the index in the index list.
    pub seq: usize,
    /// Index name.
    pub name: String,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// How the index was created.
    pub origin: IndexOrigin,
    /// Whether the index is partial.
    pub partial: bool,
    /// Indexed columns, in index order.
    pub columns: Vec<String>,
}

impl IndexRecord {
    /// Returns the name SQLite gives the `n`th automatic index of a table.
    #[must_use]
    pub fn autoindex_name(table: &str, n: usize) -> String {
        format!("sqlite_autoindex_{table}_{n}")
    }

    /// Returns true if the index is over exactly `columns`, in that order.
    #[must_use]
    pub fn covers_exactly(&self, columns: &[String]) -> bool {
        self.columns.len() == columns.len()
            && self
                .columns
                .iter()
                .zip(columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

/// A pragma record of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// A column.
    Column(ColumnRecord),
    /// A foreign key column pair.
    ForeignKey(ForeignKeyRecord),
    /// An index.
    Index(IndexRecord),
}

impl Record {
    /// Returns the column record, if this is one.
    #[must_use]
    pub const fn as_column(&self) -> Option<&ColumnRecord> {
        match self {
            Self::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Sort key placing columns first, then foreign keys, then indexes.
    #[must_use]
    pub const fn kind_order(&self) -> u8 {
        match self {
            Self::Column(_) => 0,
            Self::ForeignKey(_) => 1,
            Self::Index(_) => 2,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => {
                write!(f, "column {} {}", c.name, c.type_name)?;
                if c.primary_key {
                    f.write_str(" PRIMARY KEY")?;
                }
                if c.not_null {
                    f.write_str(" NOT NULL")?;
                }
                if let Some(default) = &c.default {
                    write!(f, " DEFAULT {default}")?;
                }
                Ok(())
            }
            Self::ForeignKey(fk) => {
                write!(f, "foreign key {} REFERENCES {}", fk.from, fk.table)?;
                if let Some(to) = &fk.to {
                    write!(f, "({to})")?;
                }
                write!(f, " ON UPDATE {} ON DELETE {}", fk.on_update, fk.on_delete)?;
                if let Some(m) = &fk.match_clause {
                    write!(f, " MATCH {m}")?;
                }
                Ok(())
            }
            Self::Index(idx) => {
                let kind = match idx.origin {
                    IndexOrigin::PrimaryKey => "primary key",
                    IndexOrigin::Unique => "unique",
                    IndexOrigin::Explicit => "explicit",
                };
                write!(f, "{kind} index {} ({})", idx.name, idx.columns.join(", "))
            }
        }
    }
}
