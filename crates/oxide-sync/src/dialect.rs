//! Schema statements and their SQL.
//!
//! Plans are made of [`Statement`] values; a [`SchemaDialect`] renders
//! them as SQL text.

use serde::Serialize;

/// A schema change statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    /// `CREATE TABLE` with the declared fragments as its body.
    CreateTable {
        /// Table name.
        table: String,
        /// Fragments joined with commas.
        body: String,
        /// Add `IF NOT EXISTS`.
        if_not_exists: bool,
    },
    /// `ALTER TABLE ... ADD COLUMN` with a declared column definition.
    AddColumn {
        /// Table name.
        table: String,
        /// The column definition fragment.
        definition: String,
    },
    /// `ALTER TABLE ... RENAME TO`.
    RenameTable {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// `INSERT INTO ... SELECT` copying the named columns.
    CopyRows {
        /// Source table.
        from: String,
        /// Destination table.
        to: String,
        /// Columns present in both tables.
        columns: Vec<String>,
    },
    /// `DROP TABLE`.
    DropTable {
        /// Table name.
        table: String,
        /// Add `IF EXISTS`.
        if_exists: bool,
    },
}

impl Statement {
    /// Returns true if the statement can lose data.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::RenameTable { .. } | Self::DropTable { .. })
    }
}

/// Trait for database-specific SQL generation.
pub trait SchemaDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Generates SQL for a statement.
    fn statement_sql(&self, statement: &Statement) -> String;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn create_table_sql(&self, name: &str, body: &str, if_not_exists: bool) -> String {
        let mut sql = String::from("CREATE TABLE ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.quote_identifier(name));
        sql.push_str(" (");
        sql.push_str(body);
        sql.push(')');
        sql
    }

    fn drop_table_sql(&self, name: &str, if_exists: bool) -> String {
        let mut sql = String::from("DROP TABLE ");
        if if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.quote_identifier(name));
        sql
    }

    fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    fn add_column_sql(&self, table: &str, definition: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            definition
        )
    }

    fn copy_rows_sql(&self, from: &str, to: &str, columns: &[String]) -> String {
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let list = quoted.join(", ");
        format!(
            "INSERT INTO {} ({list}) SELECT {list} FROM {}",
            self.quote_identifier(to),
            self.quote_identifier(from)
        )
    }
}

impl SchemaDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn statement_sql(&self, statement: &Statement) -> String {
        match statement {
            Statement::CreateTable {
                table,
                body,
                if_not_exists,
            } => self.create_table_sql(table, body, *if_not_exists),
            Statement::AddColumn { table, definition } => self.add_column_sql(table, definition),
            Statement::RenameTable { from, to } => self.rename_table_sql(from, to),
            Statement::CopyRows { from, to, columns } => self.copy_rows_sql(from, to, columns),
            Statement::DropTable { table, if_exists } => self.drop_table_sql(table, *if_exists),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table() {
        let dialect = SqliteDialect::new();
        let sql = dialect.statement_sql(&Statement::CreateTable {
            table: "Players".into(),
            body: "Id INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT".into(),
            if_not_exists: true,
        });
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"Players\" (Id INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT)"
        );
    }

    #[test]
    fn test_add_column() {
        let sql = SqliteDialect.statement_sql(&Statement::AddColumn {
            table: "Players".into(),
            definition: "MeetupName TEXT".into(),
        });
        assert_eq!(sql, "ALTER TABLE \"Players\" ADD COLUMN MeetupName TEXT");
    }

    #[test]
    fn test_rebuild_statements() {
        let dialect = SqliteDialect;
        assert_eq!(
            dialect.statement_sql(&Statement::RenameTable {
                from: "Players".into(),
                to: "old_Players".into(),
            }),
            "ALTER TABLE \"Players\" RENAME TO \"old_Players\""
        );
        assert_eq!(
            dialect.statement_sql(&Statement::CopyRows {
                from: "old_Players".into(),
                to: "Players".into(),
                columns: vec!["Id".into(), "Name".into()],
            }),
            "INSERT INTO \"Players\" (\"Id\", \"Name\") SELECT \"Id\", \"Name\" FROM \"old_Players\""
        );
        assert_eq!(
            dialect.statement_sql(&Statement::DropTable {
                table: "old_Players".into(),
                if_exists: false,
            }),
            "DROP TABLE \"old_Players\""
        );
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(SqliteDialect.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(SqliteDialect.name(), "sqlite");
    }

    #[test]
    fn test_destructive_statements() {
        assert!(Statement::DropTable {
            table: "t".into(),
            if_exists: true
        }
        .is_destructive());
        assert!(!Statement::AddColumn {
            table: "t".into(),
            definition: "c".into()
        }
        .is_destructive());
    }
}
