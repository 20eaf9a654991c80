//! Migration planner.
//!
//! Decides how a live table is brought in line with its spec and lists
//! the statements that do it. Planning never touches the database.

use oxide_ddl::diff::{common_fields, DiffOptions, SchemaDelta};
use oxide_ddl::model::TableSpec;
use oxide_ddl::records::{ColumnRecord, Record};
use serde::Serialize;

use crate::dialect::Statement;

/// How a live table relates to its spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    /// The table does not exist.
    Absent,
    /// The table matches its spec.
    MatchesExactly,
    /// The spec only adds columns SQLite can add in place.
    AddOnly,
    /// The table has to be rebuilt.
    NeedsRebuild,
}

/// The planned change for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Table name as declared.
    pub table: String,
    /// How the live table relates to its spec.
    pub category: Category,
    /// Statements to run, in order.
    pub statements: Vec<Statement>,
    /// The difference found, for existing tables.
    pub delta: Option<SchemaDelta>,
}

/// Name of the table holding the original rows during a rebuild.
#[must_use]
pub fn aside_name(table: &str) -> String {
    format!("old_{table}")
}

/// Returns true if `text` is a literal SQLite accepts as the default of
/// an added column.
fn is_constant_default(text: &str) -> bool {
    let text = text.trim();
    let unsigned = text.trim_start_matches(['+', '-']);
    (text.len() >= 2 && text.starts_with('\'') && text.ends_with('\''))
        || ((text.starts_with("X'") || text.starts_with("x'")) && text.ends_with('\''))
        || text.eq_ignore_ascii_case("TRUE")
        || text.eq_ignore_ascii_case("FALSE")
        || (!unsigned.is_empty() && unsigned.parse::<f64>().is_ok())
}

/// Returns true if `ALTER TABLE ADD COLUMN` can add the column.
fn is_addable(column: &ColumnRecord, delta: &SchemaDelta) -> bool {
    if column.primary_key {
        return false;
    }
    match &column.default {
        None if column.not_null => return false,
        Some(default) if !is_constant_default(default) => return false,
        _ => {}
    }
    // A new foreign key is fine on a new column as long as existing rows
    // get NULL in it.
    delta.constraints_to_add.iter().all(|record| match record {
        Record::ForeignKey(fk) => {
            !fk.from.eq_ignore_ascii_case(&column.name) || column.default.is_none()
        }
        _ => true,
    })
}

/// Returns true if the delta can be applied with `ADD COLUMN` alone.
fn is_add_only(delta: &SchemaDelta) -> bool {
    let added = |name: &str| {
        delta
            .fields_to_add
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
    };
    delta.only_adds_fields()
        && delta.constraints_to_add.iter().all(|record| match record {
            Record::ForeignKey(fk) => added(&fk.from),
            _ => false,
        })
        && delta.fields_to_add.iter().all(|c| is_addable(c, delta))
}

/// Plans the change that brings `actual` in line with `spec`.
///
/// `desired` are the records of `spec`, as returned by
/// [`TableSpec::desired_records`].
#[must_use]
pub fn plan_table(
    spec: &TableSpec,
    desired: &[Record],
    actual: &[Record],
    options: DiffOptions,
) -> Plan {
    let table = spec.name.clone();
    if actual.is_empty() {
        return Plan {
            statements: vec![Statement::CreateTable {
                table: table.clone(),
                body: spec.body(),
                if_not_exists: true,
            }],
            table,
            category: Category::Absent,
            delta: None,
        };
    }

    let delta = SchemaDelta::compute(&table, desired, actual, options);
    let (category, statements) = if !delta.changed() {
        (Category::MatchesExactly, Vec::new())
    } else if is_add_only(&delta) {
        let statements = delta
            .fields_to_add
            .iter()
            .filter_map(|c| spec.column_definition(&c.name))
            .map(|definition| Statement::AddColumn {
                table: table.clone(),
                definition: definition.to_string(),
            })
            .collect();
        (Category::AddOnly, statements)
    } else {
        (Category::NeedsRebuild, rebuild_statements(spec, desired, actual))
    };

    Plan {
        table,
        category,
        statements,
        delta: Some(delta),
    }
}

/// Rename aside, create, copy the shared columns, drop the aside table.
fn rebuild_statements(spec: &TableSpec, desired: &[Record], actual: &[Record]) -> Vec<Statement> {
    let aside = aside_name(&spec.name);
    let columns: Vec<String> = common_fields(desired, actual)
        .into_iter()
        .map(|(want, _)| want.name.clone())
        .collect();

    let mut statements = vec![
        Statement::RenameTable {
            from: spec.name.clone(),
            to: aside.clone(),
        },
        Statement::CreateTable {
            table: spec.name.clone(),
            body: spec.body(),
            if_not_exists: false,
        },
    ];
    if !columns.is_empty() {
        statements.push(Statement::CopyRows {
            from: aside.clone(),
            to: spec.name.clone(),
            columns,
        });
    }
    statements.push(Statement::DropTable {
        table: aside,
        if_exists: false,
    });
    statements
}

/// Statements that put a table moved aside by an interrupted rebuild
/// back in place.
#[must_use]
pub fn recovery_statements(table: &str) -> Vec<Statement> {
    vec![
        Statement::DropTable {
            table: table.to_string(),
            if_exists: true,
        },
        Statement::RenameTable {
            from: aside_name(table),
            to: table.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lowered(records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .map(|record| match record {
                Record::Column(mut c) => {
                    c.name = c.name.to_lowercase();
                    Record::Column(c)
                }
                Record::ForeignKey(mut fk) => {
                    fk.table = fk.table.to_lowercase();
                    fk.from = fk.from.to_lowercase();
                    fk.to = fk.to.map(|t| t.to_lowercase());
                    Record::ForeignKey(fk)
                }
                Record::Index(mut i) => {
                    i.name = i.name.to_lowercase();
                    Record::Index(i)
                }
            })
            .collect()
    }

    fn plan(declared: &[&str], live: &[&str]) -> Plan {
        let spec = TableSpec::new("Players", declared.iter().copied());
        let desired = spec.desired_records().unwrap();
        let actual = if live.is_empty() {
            Vec::new()
        } else {
            lowered(
                TableSpec::new("Players", live.iter().copied())
                    .desired_records()
                    .unwrap(),
            )
        };
        plan_table(&spec, &desired, &actual, DiffOptions::default())
    }

    #[test]
    fn test_absent_table_is_created() {
        let plan = plan(&["Id INTEGER PRIMARY KEY AUTOINCREMENT", "Name TEXT"], &[]);
        assert_eq!(plan.category, Category::Absent);
        assert_eq!(
            plan.statements,
            vec![Statement::CreateTable {
                table: "Players".into(),
                body: "Id INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT".into(),
                if_not_exists: true,
            }]
        );
        assert!(plan.delta.is_none());
    }

    #[test]
    fn test_matching_table_has_no_statements() {
        let fragments = ["Id INTEGER PRIMARY KEY", "Name TEXT"];
        let plan = plan(&fragments, &fragments);
        assert_eq!(plan.category, Category::MatchesExactly);
        assert!(plan.statements.is_empty());
    }

    #[test]
    fn test_added_column() {
        let plan = plan(
            &["Id INTEGER PRIMARY KEY", "Name TEXT", "MeetupName TEXT"],
            &["Id INTEGER PRIMARY KEY", "Name TEXT"],
        );
        assert_eq!(plan.category, Category::AddOnly);
        assert_eq!(
            plan.statements,
            vec![Statement::AddColumn {
                table: "Players".into(),
                definition: "MeetupName TEXT".into(),
            }]
        );
    }

    #[test]
    fn test_added_reference_column_is_add_only() {
        let plan = plan(
            &["Id INTEGER PRIMARY KEY", "Club INTEGER REFERENCES Clubs(Id)"],
            &["Id INTEGER PRIMARY KEY"],
        );
        assert_eq!(plan.category, Category::AddOnly);
    }

    #[test]
    fn test_unaddable_columns_need_rebuild() {
        for column in [
            "Code TEXT UNIQUE",
            "Rank INTEGER NOT NULL",
            "Joined DATETIME DEFAULT CURRENT_TIMESTAMP",
            "Total REAL DEFAULT (1 + 2)",
        ] {
            let plan = plan(&["Id INTEGER PRIMARY KEY", column], &["Id INTEGER PRIMARY KEY"]);
            assert_eq!(plan.category, Category::NeedsRebuild, "{column}");
        }

        let plan = plan(
            &["Id INTEGER PRIMARY KEY", "Rank INTEGER NOT NULL DEFAULT -1"],
            &["Id INTEGER PRIMARY KEY"],
        );
        assert_eq!(plan.category, Category::AddOnly);
    }

    #[test]
    fn test_type_change_needs_rebuild() {
        let plan = plan(
            &["Id INTEGER PRIMARY KEY AUTOINCREMENT", "Name VARCHAR(50)"],
            &["Id INTEGER PRIMARY KEY AUTOINCREMENT", "Name TEXT"],
        );
        assert_eq!(plan.category, Category::NeedsRebuild);
        assert_eq!(
            plan.statements,
            vec![
                Statement::RenameTable {
                    from: "Players".into(),
                    to: "old_Players".into(),
                },
                Statement::CreateTable {
                    table: "Players".into(),
                    body: "Id INTEGER PRIMARY KEY AUTOINCREMENT, Name VARCHAR(50)".into(),
                    if_not_exists: false,
                },
                Statement::CopyRows {
                    from: "old_Players".into(),
                    to: "Players".into(),
                    columns: vec!["Id".into(), "Name".into()],
                },
                Statement::DropTable {
                    table: "old_Players".into(),
                    if_exists: false,
                },
            ]
        );
    }

    #[test]
    fn test_rebuild_copies_shared_columns_only() {
        let plan = plan(&["B TEXT", "C TEXT", "D TEXT"], &["A TEXT", "B TEXT", "C TEXT"]);
        assert_eq!(plan.category, Category::NeedsRebuild);
        assert!(plan.statements.contains(&Statement::CopyRows {
            from: "old_Players".into(),
            to: "Players".into(),
            columns: vec!["B".into(), "C".into()],
        }));
    }

    #[test]
    fn test_constant_defaults() {
        assert!(is_constant_default("'text'"));
        assert!(is_constant_default("-1.5"));
        assert!(is_constant_default("X'00ff'"));
        assert!(is_constant_default("true"));
        assert!(!is_constant_default("CURRENT_DATE"));
        assert!(!is_constant_default("1 + 2"));
    }

    #[test]
    fn test_recovery_statements() {
        assert_eq!(
            recovery_statements("Players"),
            vec![
                Statement::DropTable {
                    table: "Players".into(),
                    if_exists: true,
                },
                Statement::RenameTable {
                    from: "old_Players".into(),
                    to: "Players".into(),
                },
            ]
        );
    }
}
