//! Clauses of the table-definition dialect and the grammars that
//! recognize them.
//!
//! Every rule here is a pure function from a [`Cursor`] to an optional
//! clause and the cursor after it. The grammar trees wire the rules
//! together in the order SQLite accepts them in `CREATE TABLE`:
//! one tree for column definitions and one for table constraints.

use crate::grammar::{Cursor, Match, Node};
use crate::records::ForeignKeyAction;

/// Which change a foreign key action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// ON DELETE.
    Delete,
    /// ON UPDATE.
    Update,
}

/// A recognized clause of a column definition or table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Column name and declared type.
    Column {
        /// Column name, unquoted.
        name: String,
        /// Normalized type text, empty if none was declared.
        type_name: String,
    },
    /// `CONSTRAINT name`.
    ConstraintName(String),
    /// Column `PRIMARY KEY [ASC|DESC]`.
    PrimaryKey {
        /// Whether DESC was given.
        descending: bool,
    },
    /// `ON CONFLICT resolution`.
    OnConflict(String),
    /// `AUTOINCREMENT`.
    Autoincrement,
    /// `NOT NULL`.
    NotNull,
    /// Column `UNIQUE`.
    Unique,
    /// Column `CHECK (expr)`.
    Check(String),
    /// `DEFAULT value`, as written.
    Default(String),
    /// `COLLATE name`.
    Collate(String),
    /// `REFERENCES table [(columns)]`.
    References {
        /// Referenced table.
        table: String,
        /// Referenced columns; empty when omitted.
        columns: Vec<String>,
    },
    /// `ON DELETE|UPDATE action`.
    Action {
        /// The triggering change.
        event: Event,
        /// The action taken.
        action: ForeignKeyAction,
    },
    /// `MATCH name`.
    Match(String),
    /// `[NOT] DEFERRABLE [INITIALLY ...]`.
    Deferrable {
        /// Whether the constraint is initially deferred.
        initially_deferred: bool,
    },
    /// Table `PRIMARY KEY (columns)`.
    TablePrimaryKey(Vec<String>),
    /// Table `UNIQUE (columns)`.
    TableUnique(Vec<String>),
    /// Table `CHECK (expr)`.
    TableCheck(String),
    /// Table `FOREIGN KEY (columns)`.
    TableForeignKey(Vec<String>),
}

impl Clause {
    /// Returns true for clauses that only appear in table constraints.
    #[must_use]
    pub const fn is_table_constraint(&self) -> bool {
        matches!(
            self,
            Self::TablePrimaryKey(_)
                | Self::TableUnique(_)
                | Self::TableCheck(_)
                | Self::TableForeignKey(_)
        )
    }
}

/// Words that cannot start a column definition.
const CONSTRAINT_STARTERS: &[&str] = &["CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK"];

/// Words that end a column's type name.
const TYPE_TERMINATORS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "COLLATE",
    "REFERENCES",
    "GENERATED",
    "AS",
];

/// Literal keywords accepted after DEFAULT.
const DEFAULT_KEYWORDS: &[&str] = &[
    "NULL",
    "TRUE",
    "FALSE",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
];

const ACTIONS: &[&[&str]] = &[
    &["SET", "NULL"],
    &["SET", "DEFAULT"],
    &["CASCADE"],
    &["RESTRICT"],
    &["NO", "ACTION"],
];

const ACTION_VALUES: &[ForeignKeyAction] = &[
    ForeignKeyAction::SetNull,
    ForeignKeyAction::SetDefault,
    ForeignKeyAction::Cascade,
    ForeignKeyAction::Restrict,
    ForeignKeyAction::NoAction,
];

fn is_one_of(word: &str, words: &[&str]) -> bool {
    words.iter().any(|w| word.eq_ignore_ascii_case(w))
}

/// Normalizes declared type text: single spaces between words and no
/// spaces around the size parentheses or commas.
#[must_use]
pub fn normalize_type(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        match c {
            '(' | ')' | ',' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push(c);
            }
            ' ' if out.ends_with('(') || out.ends_with(',') => {}
            _ => out.push(c),
        }
    }
    out
}

fn found(clause: Clause, next: Cursor<'_>) -> Match<'_, Clause> {
    Some((Some(clause), next))
}

// ================================================================
// Column definition rules
// ================================================================

/// `name [type words [(n [, n])]]`
fn column_def(c: Cursor<'_>) -> Match<'_, Clause> {
    if c.word().is_some_and(|(w, _)| is_one_of(w, CONSTRAINT_STARTERS)) {
        return None;
    }
    let (name, after_name) = c.identifier()?;
    let type_start = after_name.skip_whitespace();
    let mut cursor = after_name;
    let mut has_type = false;
    while let Some((word, next)) = cursor.word() {
        if is_one_of(word, TYPE_TERMINATORS) {
            break;
        }
        has_type = true;
        cursor = next;
    }
    let type_name = if has_type {
        if let Some(next) = type_size(cursor) {
            cursor = next;
        }
        normalize_type(type_start.text_until(cursor))
    } else {
        String::new()
    };
    found(Clause::Column { name, type_name }, cursor)
}

/// `(n [, n])` after a type name.
fn type_size(c: Cursor<'_>) -> Option<Cursor<'_>> {
    let (_, cursor) = c.symbol('(')?.number()?;
    let cursor = match cursor.symbol(',') {
        Some(next) => next.number()?.1,
        None => cursor,
    };
    cursor.symbol(')')
}

/// Optional `CONSTRAINT name`; matches zero-width when absent.
fn constraint_name(c: Cursor<'_>) -> Match<'_, Clause> {
    match c.keyword("CONSTRAINT").and_then(Cursor::identifier) {
        Some((name, next)) => found(Clause::ConstraintName(name), next),
        None => Some((None, c)),
    }
}

fn column_primary_key(c: Cursor<'_>) -> Match<'_, Clause> {
    let cursor = c.keywords(&["PRIMARY", "KEY"])?;
    if let Some(next) = cursor.keyword("DESC") {
        return found(Clause::PrimaryKey { descending: true }, next);
    }
    let cursor = cursor.keyword("ASC").unwrap_or(cursor);
    found(Clause::PrimaryKey { descending: false }, cursor)
}

/// Optional `ON CONFLICT resolution`; matches zero-width when absent.
fn conflict(c: Cursor<'_>) -> Match<'_, Clause> {
    match c.keywords(&["ON", "CONFLICT"]).and_then(Cursor::word) {
        Some((resolution, next)) => {
            found(Clause::OnConflict(resolution.to_ascii_uppercase()), next)
        }
        None => Some((None, c)),
    }
}

/// Optional `AUTOINCREMENT`; matches zero-width when absent.
fn autoincrement(c: Cursor<'_>) -> Match<'_, Clause> {
    match c.keyword("AUTOINCREMENT") {
        Some(next) => found(Clause::Autoincrement, next),
        None => Some((None, c)),
    }
}

fn not_null(c: Cursor<'_>) -> Match<'_, Clause> {
    found(Clause::NotNull, c.keywords(&["NOT", "NULL"])?)
}

fn unique(c: Cursor<'_>) -> Match<'_, Clause> {
    found(Clause::Unique, c.keyword("UNIQUE")?)
}

fn check(c: Cursor<'_>) -> Match<'_, Clause> {
    let (expr, next) = c.keyword("CHECK")?.group()?;
    found(Clause::Check(expr.trim().to_string()), next)
}

fn default(c: Cursor<'_>) -> Match<'_, Clause> {
    let cursor = c.keyword("DEFAULT")?;
    let value_start = cursor.skip_whitespace();
    let next = cursor
        .group()
        .map(|(_, next)| next)
        .or_else(|| cursor.string_literal().map(|(_, next)| next))
        .or_else(|| cursor.blob_literal().map(|(_, next)| next))
        .or_else(|| cursor.number().map(|(_, next)| next))
        .or_else(|| {
            cursor
                .word()
                .filter(|(w, _)| is_one_of(w, DEFAULT_KEYWORDS))
                .map(|(_, next)| next)
        })?;
    found(
        Clause::Default(value_start.text_until(next).to_string()),
        next,
    )
}

fn collate(c: Cursor<'_>) -> Match<'_, Clause> {
    let (name, next) = c.keyword("COLLATE")?.identifier()?;
    found(Clause::Collate(name), next)
}

fn references(c: Cursor<'_>) -> Match<'_, Clause> {
    let (table, cursor) = c.keyword("REFERENCES")?.identifier()?;
    let (columns, next) = cursor
        .identifier_list()
        .unwrap_or_else(|| (Vec::new(), cursor));
    found(Clause::References { table, columns }, next)
}

/// `ON DELETE|UPDATE action` or `MATCH name`.
fn foreign_key_clause(c: Cursor<'_>) -> Match<'_, Clause> {
    if let Some((name, next)) = c.keyword("MATCH").and_then(Cursor::word) {
        return found(Clause::Match(name.to_string()), next);
    }
    let cursor = c.keyword("ON")?;
    let (event, cursor) = match cursor.one_of(&[&["DELETE"], &["UPDATE"]])? {
        (0, next) => (Event::Delete, next),
        (_, next) => (Event::Update, next),
    };
    let (i, next) = cursor.one_of(ACTIONS)?;
    found(
        Clause::Action {
            event,
            action: ACTION_VALUES[i],
        },
        next,
    )
}

fn deferrable(c: Cursor<'_>) -> Match<'_, Clause> {
    let cursor = c.keyword("NOT").unwrap_or(c);
    let cursor = cursor.keyword("DEFERRABLE")?;
    match cursor
        .keyword("INITIALLY")
        .and_then(|next| next.one_of(&[&["DEFERRED"], &["IMMEDIATE"]]))
    {
        Some((i, next)) => found(
            Clause::Deferrable {
                initially_deferred: i == 0,
            },
            next,
        ),
        None => found(
            Clause::Deferrable {
                initially_deferred: false,
            },
            cursor,
        ),
    }
}

// ================================================================
// Table constraint rules
// ================================================================

fn table_primary_key(c: Cursor<'_>) -> Match<'_, Clause> {
    let (columns, next) = c.keywords(&["PRIMARY", "KEY"])?.identifier_list()?;
    found(Clause::TablePrimaryKey(columns), next)
}

fn table_unique(c: Cursor<'_>) -> Match<'_, Clause> {
    let (columns, next) = c.keyword("UNIQUE")?.identifier_list()?;
    found(Clause::TableUnique(columns), next)
}

fn table_check(c: Cursor<'_>) -> Match<'_, Clause> {
    let (expr, next) = c.keyword("CHECK")?.group()?;
    found(Clause::TableCheck(expr.trim().to_string()), next)
}

fn table_foreign_key(c: Cursor<'_>) -> Match<'_, Clause> {
    let (columns, next) = c.keywords(&["FOREIGN", "KEY"])?.identifier_list()?;
    found(Clause::TableForeignKey(columns), next)
}

// ================================================================
// Grammar trees
// ================================================================

const FOREIGN_KEY_TAIL: &[Node<Clause>] = &[
    Node::repeated(foreign_key_clause, &[]),
    Node::new(deferrable, &[]),
];

const AUTOINCREMENT: &[Node<Clause>] = &[Node::new(autoincrement, &[])];

const CONFLICT: &[Node<Clause>] = &[Node::new(conflict, &[])];

const CONFLICT_THEN_AUTOINCREMENT: &[Node<Clause>] = &[Node::new(conflict, AUTOINCREMENT)];

const COLUMN_CONSTRAINTS: &[Node<Clause>] = &[
    Node::new(column_primary_key, CONFLICT_THEN_AUTOINCREMENT),
    Node::new(not_null, CONFLICT),
    Node::new(unique, CONFLICT),
    Node::new(check, &[]),
    Node::new(default, &[]),
    Node::new(collate, &[]),
    Node::new(references, FOREIGN_KEY_TAIL),
];

const NAMED_COLUMN_CONSTRAINTS: &[Node<Clause>] =
    &[Node::repeated(constraint_name, COLUMN_CONSTRAINTS)];

const REFERENCES: &[Node<Clause>] = &[Node::new(references, FOREIGN_KEY_TAIL)];

const TABLE_CONSTRAINTS: &[Node<Clause>] = &[
    Node::new(table_primary_key, CONFLICT),
    Node::new(table_unique, CONFLICT),
    Node::new(table_check, &[]),
    Node::new(table_foreign_key, REFERENCES),
];

/// Grammar for a single column definition.
pub const COLUMN_GRAMMAR: &[Node<Clause>] = &[Node::new(column_def, NAMED_COLUMN_CONSTRAINTS)];

/// Grammar for a single table constraint.
pub const CONSTRAINT_GRAMMAR: &[Node<Clause>] = &[Node::new(constraint_name, TABLE_CONSTRAINTS)];

/// Grammar accepting either a column definition or a table constraint.
pub const FRAGMENT_GRAMMAR: &[Node<Clause>] = &[
    Node::new(column_def, NAMED_COLUMN_CONSTRAINTS),
    Node::new(constraint_name, TABLE_CONSTRAINTS),
];

/// Returns the column name a column definition starts with.
#[must_use]
pub fn column_name(fragment: &str) -> Option<String> {
    match column_def(Cursor::new(fragment)) {
        Some((Some(Clause::Column { name, .. }), _)) => Some(name),
        _ => None,
    }
}

/// Scans a fragment for `REFERENCES <table>` clauses without parsing it.
#[must_use]
pub fn referenced_tables(fragment: &str) -> Vec<String> {
    let mut tables = Vec::new();
    let mut cursor = Cursor::new(fragment);
    while !cursor.is_blank() {
        if let Some((table, next)) = cursor.keyword("REFERENCES").and_then(Cursor::identifier) {
            tables.push(table);
            cursor = next;
        } else {
            cursor = cursor.skip_token();
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{parse, Unparsed};

    fn column(name: &str, type_name: &str) -> Clause {
        Clause::Column {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("varchar ( 50 )"), "varchar(50)");
        assert_eq!(normalize_type("DECIMAL(10, 2)"), "DECIMAL(10,2)");
        assert_eq!(normalize_type("UNSIGNED   BIG INT"), "UNSIGNED BIG INT");
        assert_eq!(normalize_type(""), "");
    }

    #[test]
    fn test_primary_key_autoincrement() {
        let clauses = parse(COLUMN_GRAMMAR, "Id INTEGER PRIMARY KEY AUTOINCREMENT").unwrap();
        assert_eq!(
            clauses,
            vec![
                column("Id", "INTEGER"),
                Clause::PrimaryKey { descending: false },
                Clause::Autoincrement,
            ]
        );
    }

    #[test]
    fn test_type_with_size_and_constraints() {
        let clauses = parse(
            COLUMN_GRAMMAR,
            "Name VARCHAR( 50 ) NOT NULL ON CONFLICT REPLACE DEFAULT 'x' COLLATE NOCASE",
        )
        .unwrap();
        assert_eq!(
            clauses,
            vec![
                column("Name", "VARCHAR(50)"),
                Clause::NotNull,
                Clause::OnConflict("REPLACE".into()),
                Clause::Default("'x'".into()),
                Clause::Collate("NOCASE".into()),
            ]
        );
    }

    #[test]
    fn test_column_without_type() {
        assert_eq!(parse(COLUMN_GRAMMAR, "Notes").unwrap(), vec![column("Notes", "")]);
        assert_eq!(
            parse(COLUMN_GRAMMAR, "Flag NOT NULL").unwrap(),
            vec![column("Flag", ""), Clause::NotNull]
        );
    }

    #[test]
    fn test_multi_word_type() {
        let clauses = parse(COLUMN_GRAMMAR, "Big UNSIGNED BIG INT UNIQUE").unwrap();
        assert_eq!(clauses, vec![column("Big", "UNSIGNED BIG INT"), Clause::Unique]);
    }

    #[test]
    fn test_default_forms() {
        for (fragment, expected) in [
            ("D DATETIME DEFAULT CURRENT_TIMESTAMP", "CURRENT_TIMESTAMP"),
            ("N INTEGER DEFAULT -1", "-1"),
            ("R REAL DEFAULT 2.5", "2.5"),
            ("E TEXT DEFAULT (lower('A' || 'B'))", "(lower('A' || 'B'))"),
            ("Z TEXT DEFAULT null", "null"),
            ("B BLOB DEFAULT X'00'", "X'00'"),
        ] {
            let clauses = parse(COLUMN_GRAMMAR, fragment).unwrap();
            assert_eq!(clauses[1], Clause::Default(expected.into()), "{fragment}");
        }
        assert!(parse(COLUMN_GRAMMAR, "D TEXT DEFAULT whatever").is_err());
    }

    #[test]
    fn test_inline_references_with_actions() {
        let clauses = parse(
            COLUMN_GRAMMAR,
            "PlayerId INTEGER REFERENCES Players(Id) ON DELETE CASCADE ON UPDATE set null \
             MATCH SIMPLE DEFERRABLE INITIALLY DEFERRED",
        )
        .unwrap();
        assert_eq!(
            clauses,
            vec![
                column("PlayerId", "INTEGER"),
                Clause::References {
                    table: "Players".into(),
                    columns: vec!["Id".into()],
                },
                Clause::Action {
                    event: Event::Delete,
                    action: ForeignKeyAction::Cascade,
                },
                Clause::Action {
                    event: Event::Update,
                    action: ForeignKeyAction::SetNull,
                },
                Clause::Match("SIMPLE".into()),
                Clause::Deferrable {
                    initially_deferred: true,
                },
            ]
        );
    }

    #[test]
    fn test_constraints_after_references() {
        let clauses = parse(
            COLUMN_GRAMMAR,
            "Owner INTEGER CONSTRAINT fk_owner REFERENCES Users NOT NULL",
        )
        .unwrap();
        assert_eq!(
            clauses,
            vec![
                column("Owner", "INTEGER"),
                Clause::ConstraintName("fk_owner".into()),
                Clause::References {
                    table: "Users".into(),
                    columns: vec![],
                },
                Clause::NotNull,
            ]
        );
    }

    #[test]
    fn test_check_with_nested_parentheses() {
        let clauses = parse(COLUMN_GRAMMAR, "Rank TINYINT CHECK (Rank IN (1, 2, 3, 4))").unwrap();
        assert_eq!(clauses[1], Clause::Check("Rank IN (1, 2, 3, 4)".into()));
    }

    #[test]
    fn test_column_grammar_rejects_constraints() {
        assert!(parse(COLUMN_GRAMMAR, "PRIMARY KEY (Id)").is_err());
        assert_eq!(
            parse(COLUMN_GRAMMAR, "Name TEXT NOT EMPTY").unwrap_err(),
            Unparsed("NOT EMPTY".into())
        );
    }

    #[test]
    fn test_table_constraints() {
        assert_eq!(
            parse(CONSTRAINT_GRAMMAR, "CONSTRAINT KeepItReal UNIQUE(Field3, Field4)").unwrap(),
            vec![
                Clause::ConstraintName("KeepItReal".into()),
                Clause::TableUnique(vec!["Field3".into(), "Field4".into()]),
            ]
        );
        assert_eq!(
            parse(CONSTRAINT_GRAMMAR, "PRIMARY KEY (A, B) ON CONFLICT ABORT").unwrap(),
            vec![
                Clause::TablePrimaryKey(vec!["A".into(), "B".into()]),
                Clause::OnConflict("ABORT".into()),
            ]
        );
        assert_eq!(
            parse(CONSTRAINT_GRAMMAR, "CHECK (Score >= 0)").unwrap(),
            vec![Clause::TableCheck("Score >= 0".into())]
        );
        let clauses = parse(
            CONSTRAINT_GRAMMAR,
            "FOREIGN KEY(PlayerId) REFERENCES Players(Id) ON DELETE CASCADE",
        )
        .unwrap();
        assert_eq!(clauses.len(), 3);
        assert!(clauses[0].is_table_constraint());
    }

    #[test]
    fn test_constraint_grammar_rejects_columns() {
        assert!(parse(CONSTRAINT_GRAMMAR, "Name TEXT").is_err());
        assert!(parse(CONSTRAINT_GRAMMAR, "Field2 TEXT REFERENCES T(ID)").is_err());
    }

    #[test]
    fn test_fragment_grammar_accepts_both() {
        assert!(parse(FRAGMENT_GRAMMAR, "Name TEXT").is_ok());
        assert!(parse(FRAGMENT_GRAMMAR, "UNIQUE (Name)").is_ok());
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name("  \"Meetup Name\" TEXT").as_deref(), Some("Meetup Name"));
        assert_eq!(column_name("UNIQUE(a)"), None);
    }

    #[test]
    fn test_referenced_tables() {
        assert_eq!(
            referenced_tables("FOREIGN KEY(PlayerId) REFERENCES Players(Id)"),
            vec!["Players"]
        );
        assert_eq!(
            referenced_tables("Note TEXT DEFAULT 'REFERENCES Nowhere'"),
            Vec::<String>::new()
        );
        // Unparseable text is still scanned.
        assert_eq!(referenced_tables("?? references Quarters ??"), vec!["Quarters"]);
    }
}
