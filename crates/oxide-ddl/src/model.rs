//! Declared schema model.
//!
//! A [`SchemaModel`] is the ordered list of tables an application expects,
//! each given as a [`TableSpec`]: the table name and the fragments that
//! would appear between the parentheses of its `CREATE TABLE` statement.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::clause;
use crate::error::{Result, SchemaError};
use crate::fragment;
use crate::records::Record;

/// The declared structure of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    #[serde(rename = "table")]
    pub name: String,
    /// Column definitions followed by table constraints.
    #[serde(rename = "fields")]
    pub fragments: Vec<String>,
}

impl TableSpec {
    /// Creates a table spec.
    pub fn new<I, S>(name: impl Into<String>, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits the fragments into column definitions and table constraints.
    #[must_use]
    pub fn columns_and_constraints(&self) -> (&[String], &[String]) {
        fragment::split_columns_and_constraints(&self.fragments)
    }

    /// Tables this table references, in order of first appearance.
    #[must_use]
    pub fn parent_tables(&self) -> Vec<String> {
        fragment::parent_tables(&self.fragments)
    }

    /// Returns the fragment that declares `column`.
    #[must_use]
    pub fn column_definition(&self, column: &str) -> Option<&str> {
        let (columns, _) = self.columns_and_constraints();
        columns
            .iter()
            .find(|f| clause::column_name(f).is_some_and(|name| name.eq_ignore_ascii_case(column)))
            .map(String::as_str)
    }

    /// The text between the parentheses of the table's `CREATE TABLE`.
    #[must_use]
    pub fn body(&self) -> String {
        self.fragments.join(", ")
    }

    /// Parses every fragment and returns the records SQLite would report
    /// for this table: columns, then foreign keys, then indexes.
    ///
    /// # Errors
    ///
    /// Returns the first parse or definition error.
    pub fn desired_records(&self) -> Result<Vec<Record>> {
        let (columns, constraints) = self.columns_and_constraints();
        if columns.is_empty() {
            return Err(SchemaError::definition(&self.name, "table has no columns"));
        }

        let mut records: Vec<Record> = Vec::new();
        for text in columns {
            let parsed = fragment::parse(text, &mut records, &self.name)?;
            for record in &parsed {
                let Some(column) = record.as_column() else {
                    continue;
                };
                let duplicate = records
                    .iter()
                    .filter_map(Record::as_column)
                    .any(|c| c.name.eq_ignore_ascii_case(&column.name));
                if duplicate {
                    return Err(SchemaError::definition(
                        &self.name,
                        format!("duplicate column name: {}", column.name),
                    ));
                }
            }
            records.extend(parsed);
        }

        for text in constraints {
            let parsed = fragment::parse(text, &mut records, &self.name)?;
            if parsed.iter().any(|r| r.as_column().is_some()) {
                return Err(SchemaError::definition(
                    &self.name,
                    format!("column definition \"{text}\" follows the table constraints"),
                ));
            }
            records.extend(parsed);
        }

        records.sort_by_key(Record::kind_order);
        Ok(records)
    }
}

/// The ordered set of tables an application declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaModel {
    tables: Vec<TableSpec>,
}

impl SchemaModel {
    /// Creates a model from tables in declaration order.
    #[must_use]
    pub fn new(tables: Vec<TableSpec>) -> Self {
        Self { tables }
    }

    /// Reads a model from a JSON array of `{"table": ..., "fields": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Json`] if the text is not such an array.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Tables in declaration order.
    #[must_use]
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Finds a table by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Orders tables so that every table comes after the tables it
    /// references. Self references and references to tables outside the
    /// model do not constrain the order; otherwise declaration order is
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DependencyCycle`] naming the tables that
    /// could not be placed.
    pub fn check_order(&self) -> Result<Vec<&TableSpec>> {
        let declared: HashSet<String> = self
            .tables
            .iter()
            .map(|t| t.name.to_lowercase())
            .collect();
        let mut scheduled: HashSet<String> = HashSet::new();
        let mut order = Vec::with_capacity(self.tables.len());
        let mut pending: Vec<&TableSpec> = self.tables.iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for table in pending {
                let own = table.name.to_lowercase();
                let ready = table.parent_tables().iter().all(|parent| {
                    let parent = parent.to_lowercase();
                    parent == own || !declared.contains(&parent) || scheduled.contains(&parent)
                });
                if ready {
                    scheduled.insert(own);
                    order.push(table);
                } else {
                    waiting.push(table);
                }
            }
            if waiting.len() == before {
                return Err(SchemaError::DependencyCycle(
                    waiting.iter().map(|t| t.name.clone()).collect(),
                ));
            }
            pending = waiting;
        }
        Ok(order)
    }
}

impl From<Vec<TableSpec>> for SchemaModel {
    fn from(tables: Vec<TableSpec>) -> Self {
        Self::new(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{IndexOrigin, Record};

    fn names<'a>(tables: &[&'a TableSpec]) -> Vec<&'a str> {
        tables.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_desired_records_order() {
        let spec = TableSpec::new(
            "mytable",
            [
                "ID INTEGER PRIMARY KEY AUTOINCREMENT",
                "Field1 TEXT NOT NULL",
                "Field2 TEXT REFERENCES AnotherTable(ID) ON DELETE CASCADE",
                "Field3 REAL",
                "Field4 DATETIME DEFAULT CURRENT_TIMESTAMP",
                "CONSTRAINT KeepItReal UNIQUE(Field3, Field4)",
            ],
        );
        let records = spec.desired_records().unwrap();
        let kinds: Vec<u8> = records.iter().map(Record::kind_order).collect();
        assert_eq!(kinds, vec![0, 0, 0, 0, 0, 1, 2]);

        let cids: Vec<usize> = records
            .iter()
            .filter_map(Record::as_column)
            .map(|c| c.cid)
            .collect();
        assert_eq!(cids, vec![0, 1, 2, 3, 4]);

        let Record::Index(index) = &records[6] else {
            panic!("expected an index");
        };
        assert_eq!(index.origin, IndexOrigin::Unique);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let spec = TableSpec::new("T", ["Name TEXT", "name INTEGER"]);
        let err = spec.desired_records().unwrap_err();
        assert!(err.to_string().contains("duplicate column name"));
    }

    #[test]
    fn test_column_after_constraint_rejected() {
        let spec = TableSpec::new("T", ["A TEXT", "UNIQUE (A)", "B TEXT"]);
        assert!(matches!(
            spec.desired_records(),
            Err(SchemaError::Definition { .. })
        ));
    }

    #[test]
    fn test_empty_table_rejected() {
        let spec = TableSpec::new("T", Vec::<String>::new());
        assert!(spec.desired_records().is_err());
    }

    #[test]
    fn test_column_definition_lookup() {
        let spec = TableSpec::new("Players", ["Id INTEGER PRIMARY KEY", "\"Meetup Name\" TEXT"]);
        assert_eq!(
            spec.column_definition("meetup name"),
            Some("\"Meetup Name\" TEXT")
        );
        assert_eq!(spec.column_definition("Missing"), None);
        assert_eq!(spec.body(), "Id INTEGER PRIMARY KEY, \"Meetup Name\" TEXT");
    }

    #[test]
    fn test_from_json() {
        let model = SchemaModel::from_json(
            r#"[{"table": "Players", "fields": ["Id INTEGER PRIMARY KEY", "Name TEXT"]}]"#,
        )
        .unwrap();
        assert_eq!(model.tables().len(), 1);
        assert_eq!(model.get("players").unwrap().fragments.len(), 2);
        assert!(matches!(
            SchemaModel::from_json("{}"),
            Err(SchemaError::Json(_))
        ));
    }

    #[test]
    fn test_check_order_moves_children_after_parents() {
        let model = SchemaModel::new(vec![
            TableSpec::new("Scores", ["PlayerId INTEGER REFERENCES Players(Id)"]),
            TableSpec::new("Players", ["Id INTEGER PRIMARY KEY"]),
            TableSpec::new("Quarters", ["Quarter TEXT PRIMARY KEY"]),
        ]);
        let order = model.check_order().unwrap();
        assert_eq!(names(&order), vec!["Players", "Quarters", "Scores"]);
    }

    #[test]
    fn test_check_order_ignores_self_and_external_references() {
        let model = SchemaModel::new(vec![
            TableSpec::new(
                "Players",
                [
                    "Id INTEGER PRIMARY KEY",
                    "ReferredBy INTEGER REFERENCES players(Id)",
                    "Org INTEGER REFERENCES Elsewhere(Id)",
                ],
            ),
        ]);
        assert_eq!(names(&model.check_order().unwrap()), vec!["Players"]);
    }

    #[test]
    fn test_check_order_reports_cycles() {
        let model = SchemaModel::new(vec![
            TableSpec::new("Root", ["Id INTEGER PRIMARY KEY"]),
            TableSpec::new("A", ["B INTEGER REFERENCES B(Id)"]),
            TableSpec::new("B", ["A INTEGER REFERENCES A(Id)"]),
        ]);
        match model.check_order() {
            Err(SchemaError::DependencyCycle(tables)) => assert_eq!(tables, vec!["A", "B"]),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
