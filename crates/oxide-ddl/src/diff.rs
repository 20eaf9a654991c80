//! Schema differ.
//!
//! Compares the records a table spec declares with the records read from
//! a live table. Names are compared without regard to case, and column
//! order only matters when asked for.

use std::fmt;

use serde::Serialize;

use crate::clause::normalize_type;
use crate::records::{ColumnRecord, ForeignKeyAction, IndexOrigin, Record};

/// Options for the differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Report columns whose position differs as altered.
    pub order_matters: bool,
}

/// A common column whose declaration differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlteredField {
    /// Column name as declared.
    pub name: String,
    /// One reason per differing attribute.
    pub reasons: Vec<String>,
}

/// The structural difference between a declared and a live table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDelta {
    /// Table name.
    pub table: String,
    /// Declared columns the live table lacks, in declaration order.
    pub fields_to_add: Vec<ColumnRecord>,
    /// Live columns no longer declared.
    pub fields_deleted: Vec<ColumnRecord>,
    /// Columns present on both sides with different declarations.
    pub fields_altered: Vec<AlteredField>,
    /// Declared foreign keys and indexes the live table lacks.
    pub constraints_to_add: Vec<Record>,
    /// Live foreign keys and indexes no longer declared.
    pub constraints_deleted: Vec<Record>,
}

impl SchemaDelta {
    /// Computes the delta between `desired` and `actual` records.
    #[must_use]
    pub fn compute(
        table: &str,
        desired: &[Record],
        actual: &[Record],
        options: DiffOptions,
    ) -> Self {
        Self {
            table: table.to_string(),
            fields_to_add: missing_fields(desired, actual).into_iter().cloned().collect(),
            fields_deleted: deleted_fields(desired, actual).into_iter().cloned().collect(),
            fields_altered: altered_fields(desired, actual, options),
            constraints_to_add: missing_constraints(desired, actual)
                .into_iter()
                .cloned()
                .collect(),
            constraints_deleted: deleted_constraints(desired, actual)
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    /// Returns true if any category is non-empty.
    #[must_use]
    pub fn changed(&self) -> bool {
        !(self.fields_to_add.is_empty()
            && self.fields_deleted.is_empty()
            && self.fields_altered.is_empty()
            && self.constraints_to_add.is_empty()
            && self.constraints_deleted.is_empty())
    }

    /// Returns true if the only change is new columns.
    #[must_use]
    pub fn only_adds_fields(&self) -> bool {
        !self.fields_to_add.is_empty()
            && self.fields_deleted.is_empty()
            && self.fields_altered.is_empty()
            && self.constraints_deleted.is_empty()
    }

    /// Renders the delta as one line per change.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for column in &self.fields_to_add {
            lines.push(format!("add {}", Record::Column(column.clone())));
        }
        for column in &self.fields_deleted {
            lines.push(format!("delete column {}", column.name));
        }
        for field in &self.fields_altered {
            lines.extend(field.reasons.iter().cloned());
        }
        for record in &self.constraints_to_add {
            lines.push(format!("add {record}"));
        }
        for record in &self.constraints_deleted {
            lines.push(format!("delete {record}"));
        }
        lines
    }
}

impl fmt::Display for SchemaDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Changes to table '{}':", self.table)?;
        for line in self.describe() {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

fn columns(records: &[Record]) -> impl Iterator<Item = &ColumnRecord> {
    records.iter().filter_map(Record::as_column)
}

fn find_column<'r>(records: &'r [Record], name: &str) -> Option<&'r ColumnRecord> {
    columns(records).find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Declared columns missing from the live table.
#[must_use]
pub fn missing_fields<'r>(desired: &'r [Record], actual: &[Record]) -> Vec<&'r ColumnRecord> {
    columns(desired)
        .filter(|c| find_column(actual, &c.name).is_none())
        .collect()
}

/// Live columns that are no longer declared.
#[must_use]
pub fn deleted_fields<'r>(desired: &[Record], actual: &'r [Record]) -> Vec<&'r ColumnRecord> {
    missing_fields(actual, desired)
}

/// Pairs of (declared, live) columns with the same name, in declared order.
#[must_use]
pub fn common_fields<'d, 'a>(
    desired: &'d [Record],
    actual: &'a [Record],
) -> Vec<(&'d ColumnRecord, &'a ColumnRecord)> {
    columns(desired)
        .filter_map(|c| find_column(actual, &c.name).map(|live| (c, live)))
        .collect()
}

fn differs(a: &str, b: &str) -> bool {
    !a.eq_ignore_ascii_case(b)
}

fn default_text(default: Option<&String>) -> &str {
    default.map_or("NULL", String::as_str)
}

/// Common columns whose type, nullability, default or key membership
/// differ; position too when `order_matters` is set.
#[must_use]
pub fn altered_fields(
    desired: &[Record],
    actual: &[Record],
    options: DiffOptions,
) -> Vec<AlteredField> {
    let mut altered = Vec::new();
    for (want, have) in common_fields(desired, actual) {
        let mut reasons = Vec::new();
        let want_type = normalize_type(&want.type_name);
        let have_type = normalize_type(&have.type_name);
        if differs(&want_type, &have_type) {
            reasons.push(reason_line("type", &want.name, &want_type, &have_type));
        }
        if want.not_null != have.not_null {
            reasons.push(reason_line("not null", &want.name, want.not_null, have.not_null));
        }
        let want_default = default_text(want.default.as_ref());
        let have_default = default_text(have.default.as_ref());
        if want.default.is_some() != have.default.is_some() || differs(want_default, have_default)
        {
            reasons.push(reason_line("default", &want.name, want_default, have_default));
        }
        if want.primary_key != have.primary_key {
            reasons.push(reason_line(
                "primary key",
                &want.name,
                want.primary_key,
                have.primary_key,
            ));
        }
        if options.order_matters && want.cid != have.cid {
            reasons.push(reason_line("position", &want.name, want.cid, have.cid));
        }
        if !reasons.is_empty() {
            altered.push(AlteredField {
                name: want.name.clone(),
                reasons,
            });
        }
    }
    altered
}

fn reason_line(
    attribute: &str,
    field: &str,
    want: impl fmt::Display,
    have: impl fmt::Display,
) -> String {
    format!("{attribute} differs for field '{field}' ({want} vs {have})")
}

/// Identity of a constraint record, ignoring ids, sequence numbers and case.
#[derive(Debug, PartialEq, Eq)]
enum ConstraintKey {
    ForeignKey {
        table: String,
        from: String,
        to: Option<String>,
        on_update: ForeignKeyAction,
        on_delete: ForeignKeyAction,
        match_clause: Option<String>,
    },
    Index {
        name: String,
        unique: bool,
        origin: IndexOrigin,
        partial: bool,
        columns: Vec<String>,
    },
}

fn constraint_key(record: &Record) -> Option<ConstraintKey> {
    match record {
        Record::Column(_) => None,
        Record::ForeignKey(fk) => Some(ConstraintKey::ForeignKey {
            table: fk.table.to_lowercase(),
            from: fk.from.to_lowercase(),
            to: fk.to.as_deref().map(str::to_lowercase),
            on_update: fk.on_update,
            on_delete: fk.on_delete,
            match_clause: fk.match_clause.as_deref().map(str::to_lowercase),
        }),
        Record::Index(index) => Some(ConstraintKey::Index {
            name: index.name.to_lowercase(),
            unique: index.unique,
            origin: index.origin,
            partial: index.partial,
            columns: index.columns.iter().map(|c| c.to_lowercase()).collect(),
        }),
    }
}

/// Declared constraints missing from the live table.
#[must_use]
pub fn missing_constraints<'r>(desired: &'r [Record], actual: &[Record]) -> Vec<&'r Record> {
    let live: Vec<ConstraintKey> = actual.iter().filter_map(constraint_key).collect();
    desired
        .iter()
        .filter(|r| constraint_key(r).is_some_and(|key| !live.contains(&key)))
        .collect()
}

/// Live constraints that are no longer declared.
#[must_use]
pub fn deleted_constraints<'r>(desired: &[Record], actual: &'r [Record]) -> Vec<&'r Record> {
    missing_constraints(actual, desired)
}
