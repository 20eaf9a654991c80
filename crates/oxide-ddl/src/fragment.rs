//! Fragment parser.
//!
//! Turns one column definition or table constraint into pragma records.
//! Clauses recognized by the grammar are folded into one builder per
//! record kind; builders are finalized into records only once the whole
//! fragment has been read, so a later clause can never reach back into a
//! record that has already been emitted. The one deliberate exception is
//! a table `PRIMARY KEY` constraint, which marks the columns it names in
//! the caller's context as primary key columns.

use crate::clause::{Clause, Event, CONSTRAINT_GRAMMAR, FRAGMENT_GRAMMAR};
use crate::error::{Result, SchemaError};
use crate::grammar::{self, Unparsed};
use crate::records::{
    ColumnRecord, ForeignKeyAction, ForeignKeyRecord, IndexOrigin, IndexRecord, Record,
};

/// Parses one fragment of the spec of `table`.
///
/// `context` holds the records of the fragments parsed before this one;
/// table constraints resolve their column names against it.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] if the grammar cannot consume the
/// fragment and [`SchemaError::Definition`] if a constraint names columns
/// that do not resolve or a foreign key is malformed.
pub fn parse(fragment: &str, context: &mut [Record], table: &str) -> Result<Vec<Record>> {
    let clauses = grammar::parse(FRAGMENT_GRAMMAR, fragment).map_err(|Unparsed(rest)| {
        SchemaError::Parse {
            table: table.to_string(),
            fragment: fragment.to_string(),
            rest,
        }
    })?;
    let mut builder = FragmentBuilder::new(table);
    for clause in clauses {
        builder.apply(clause)?;
    }
    builder.finish(context)
}

/// Returns true if the constraint grammar accepts the fragment.
#[must_use]
pub fn is_table_constraint(fragment: &str) -> bool {
    grammar::parse(CONSTRAINT_GRAMMAR, fragment)
        .is_ok_and(|clauses| clauses.iter().any(Clause::is_table_constraint))
}

/// Splits a table spec into its column definitions and the table
/// constraints after them. The first fragment the constraint grammar
/// accepts starts the constraint section.
#[must_use]
pub fn split_columns_and_constraints(spec: &[String]) -> (&[String], &[String]) {
    let at = spec
        .iter()
        .position(|fragment| is_table_constraint(fragment))
        .unwrap_or(spec.len());
    spec.split_at(at)
}

/// Returns the tables named in `REFERENCES` clauses of a spec, in order
/// of first appearance. Fragments do not need to parse.
#[must_use]
pub fn parent_tables(spec: &[String]) -> Vec<String> {
    let mut parents: Vec<String> = Vec::new();
    for table in spec.iter().flat_map(|f| crate::clause::referenced_tables(f)) {
        if !parents.iter().any(|p| p.eq_ignore_ascii_case(&table)) {
            parents.push(table);
        }
    }
    parents
}

/// Coerces a captured default to the text SQLite reports: one level of
/// parentheses is removed and NULL means no default.
#[must_use]
pub fn default_value(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("NULL") {
        None
    } else if raw.len() >= 2 && raw.starts_with('(') && raw.ends_with(')') {
        Some(raw[1..raw.len() - 1].trim().to_string())
    } else {
        Some(raw.to_string())
    }
}

#[derive(Debug)]
struct ColumnBuilder {
    name: String,
    type_name: String,
    not_null: bool,
    default: Option<String>,
    primary_key: bool,
    descending: bool,
    unique: bool,
}

impl ColumnBuilder {
    fn new(name: String, type_name: String) -> Self {
        Self {
            name,
            type_name,
            not_null: false,
            default: None,
            primary_key: false,
            descending: false,
            unique: false,
        }
    }

    /// An `INTEGER PRIMARY KEY` column is an alias for the rowid and
    /// gets no index.
    fn is_rowid_alias(&self) -> bool {
        self.primary_key && !self.descending && self.type_name.eq_ignore_ascii_case("INTEGER")
    }

    fn finish(self, cid: usize) -> ColumnRecord {
        ColumnRecord {
            cid,
            name: self.name,
            type_name: self.type_name,
            not_null: self.not_null,
            default: self.default,
            primary_key: self.primary_key,
        }
    }
}

#[derive(Debug)]
struct ForeignKeyBuilder {
    /// Local columns.
    from: Vec<String>,
    /// Referenced table, unset until REFERENCES is seen.
    table: Option<String>,
    to: Vec<String>,
    on_update: ForeignKeyAction,
    on_delete: ForeignKeyAction,
    inline: bool,
}

impl ForeignKeyBuilder {
    fn new(from: Vec<String>, inline: bool) -> Self {
        Self {
            from,
            table: None,
            to: Vec::new(),
            on_update: ForeignKeyAction::NoAction,
            on_delete: ForeignKeyAction::NoAction,
            inline,
        }
    }

    fn finish(self, id: usize, table_name: &str) -> Result<Vec<ForeignKeyRecord>> {
        let Some(table) = self.table else {
            return Err(SchemaError::definition(
                table_name,
                format!("foreign key on {:?} has no REFERENCES clause", self.from),
            ));
        };
        if self.inline && self.to.len() > 1 {
            return Err(SchemaError::definition(
                table_name,
                format!(
                    "foreign key refers to multiple columns {:?} in table {} for field {}",
                    self.to, table, self.from[0]
                ),
            ));
        }
        if !self.to.is_empty() && self.to.len() != self.from.len() {
            return Err(SchemaError::definition(
                table_name,
                format!(
                    "foreign key constraint has mismatched number of keys, {:?} vs. {:?} in table {}",
                    self.from, self.to, table
                ),
            ));
        }
        Ok(self
            .from
            .iter()
            .enumerate()
            .map(|(seq, from)| ForeignKeyRecord {
                id,
                seq,
                table: table.clone(),
                from: from.clone(),
                to: self.to.get(seq).cloned(),
                on_update: self.on_update,
                on_delete: self.on_delete,
                match_clause: None,
            })
            .collect())
    }
}

#[derive(Debug)]
struct IndexBuilder {
    origin: IndexOrigin,
    columns: Vec<String>,
}

impl IndexBuilder {
    fn label(&self) -> &'static str {
        match self.origin {
            IndexOrigin::PrimaryKey => "PRIMARY KEY",
            _ => "UNIQUE",
        }
    }
}

/// Accumulates the clauses of one fragment.
#[derive(Debug)]
struct FragmentBuilder<'t> {
    table: &'t str,
    column: Option<ColumnBuilder>,
    foreign_keys: Vec<ForeignKeyBuilder>,
    indexes: Vec<IndexBuilder>,
}

impl<'t> FragmentBuilder<'t> {
    fn new(table: &'t str) -> Self {
        Self {
            table,
            column: None,
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn apply(&mut self, clause: Clause) -> Result<()> {
        match clause {
            Clause::Column { name, type_name } => {
                self.column = Some(ColumnBuilder::new(name, type_name));
            }
            Clause::PrimaryKey { descending } => {
                if let Some(column) = self.column.as_mut() {
                    column.primary_key = true;
                    column.descending = descending;
                }
            }
            Clause::NotNull => {
                if let Some(column) = self.column.as_mut() {
                    column.not_null = true;
                }
            }
            Clause::Unique => {
                if let Some(column) = self.column.as_mut() {
                    column.unique = true;
                }
            }
            Clause::Default(raw) => {
                if let Some(column) = self.column.as_mut() {
                    column.default = default_value(&raw);
                }
            }
            Clause::References { table, columns } => self.references(table, columns)?,
            Clause::Action { event, action } => {
                if let Some(fk) = self.foreign_keys.last_mut() {
                    match event {
                        Event::Delete => fk.on_delete = action,
                        Event::Update => fk.on_update = action,
                    }
                }
            }
            Clause::TablePrimaryKey(columns) => self.indexes.push(IndexBuilder {
                origin: IndexOrigin::PrimaryKey,
                columns,
            }),
            Clause::TableUnique(columns) => self.indexes.push(IndexBuilder {
                origin: IndexOrigin::Unique,
                columns,
            }),
            Clause::TableForeignKey(columns) => {
                self.foreign_keys.push(ForeignKeyBuilder::new(columns, false));
            }
            // Not reported by the pragmas, so nothing to record. SQLite
            // parses MATCH but always reports NONE.
            Clause::ConstraintName(_)
            | Clause::Match(_)
            | Clause::OnConflict(_)
            | Clause::Autoincrement
            | Clause::Check(_)
            | Clause::Collate(_)
            | Clause::Deferrable { .. }
            | Clause::TableCheck(_) => {}
        }
        Ok(())
    }

    fn references(&mut self, table: String, columns: Vec<String>) -> Result<()> {
        if let Some(fk) = self.foreign_keys.last_mut().filter(|fk| fk.table.is_none()) {
            fk.table = Some(table);
            fk.to = columns;
            return Ok(());
        }
        let Some(column) = self.column.as_ref() else {
            return Err(SchemaError::definition(
                self.table,
                format!("REFERENCES {table} is not attached to a column or FOREIGN KEY"),
            ));
        };
        let mut fk = ForeignKeyBuilder::new(vec![column.name.clone()], true);
        fk.table = Some(table);
        fk.to = columns;
        self.foreign_keys.push(fk);
        Ok(())
    }

    fn finish(self, context: &mut [Record]) -> Result<Vec<Record>> {
        let table = self.table;
        let mut records = Vec::new();
        let mut next_fk_id = context
            .iter()
            .filter_map(|r| match r {
                Record::ForeignKey(fk) => Some(fk.id + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        let has_primary_key = context
            .iter()
            .filter_map(Record::as_column)
            .any(|c| c.primary_key);

        let mut indexes = Vec::new();
        if let Some(column) = self.column {
            let indexed = vec![column.name.clone()];
            if column.primary_key {
                if has_primary_key {
                    return Err(SchemaError::definition(
                        table,
                        format!("column {} adds a second primary key", column.name),
                    ));
                }
                if !column.is_rowid_alias() {
                    add_index(
                        table,
                        context,
                        &mut indexes,
                        IndexOrigin::PrimaryKey,
                        indexed.clone(),
                    );
                }
            }
            if column.unique {
                add_index(table, context, &mut indexes, IndexOrigin::Unique, indexed);
            }
            let cid = context.iter().filter_map(Record::as_column).count();
            records.push(Record::Column(column.finish(cid)));
        }

        for fk in self.foreign_keys {
            records.extend(fk.finish(next_fk_id, table)?.into_iter().map(Record::ForeignKey));
            next_fk_id += 1;
        }

        for index in self.indexes {
            let mut positions = Vec::with_capacity(index.columns.len());
            for name in &index.columns {
                let matches: Vec<usize> = context
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.as_column().is_some_and(|c| c.name.eq_ignore_ascii_case(name)))
                    .map(|(i, _)| i)
                    .collect();
                if matches.len() != 1 {
                    return Err(SchemaError::definition(
                        table,
                        format!(
                            "{} constraint clause mentions {} which has {} matches among the fields of {}",
                            index.label(),
                            name,
                            matches.len(),
                            table
                        ),
                    ));
                }
                positions.push(matches[0]);
            }

            if index.origin == IndexOrigin::PrimaryKey {
                if has_primary_key {
                    return Err(SchemaError::definition(
                        table,
                        "table has more than one primary key",
                    ));
                }
                let mut rowid_alias = false;
                for &pos in &positions {
                    if let Record::Column(column) = &mut context[pos] {
                        column.primary_key = true;
                        rowid_alias = column.type_name.eq_ignore_ascii_case("INTEGER");
                    }
                }
                if positions.len() == 1 && rowid_alias {
                    continue;
                }
            }
            let indexed = positions
                .iter()
                .filter_map(|&pos| context[pos].as_column().map(|c| c.name.clone()))
                .collect();
            add_index(table, context, &mut indexes, index.origin, indexed);
        }

        records.extend(indexes);
        Ok(records)
    }
}

/// Adds the automatic index of a PRIMARY KEY or UNIQUE constraint.
///
/// SQLite reuses an existing index over the same columns instead of
/// creating a second one; a primary key takes the existing index over.
fn add_index(
    table: &str,
    context: &mut [Record],
    indexes: &mut Vec<Record>,
    origin: IndexOrigin,
    columns: Vec<String>,
) {
    let existing = context
        .iter_mut()
        .chain(indexes.iter_mut())
        .find_map(|r| match r {
            Record::Index(index) if index.covers_exactly(&columns) => Some(index),
            _ => None,
        });
    if let Some(index) = existing {
        if origin == IndexOrigin::PrimaryKey {
            index.origin = origin;
        }
        return;
    }

    let count = context
        .iter()
        .chain(indexes.iter())
        .filter(|r| matches!(r, Record::Index(_)))
        .count();
    indexes.push(Record::Index(IndexRecord {
        seq: count,
        name: IndexRecord::autoindex_name(table, count + 1),
        unique: true,
        origin,
        partial: false,
        columns,
    }));
}
