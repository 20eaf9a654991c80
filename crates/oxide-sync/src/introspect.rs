//! Live schema reader.
//!
//! Reads the pragma records of a table from a live database. Names are
//! lower-cased so they compare directly with declared records.

use oxide_ddl::records::{
    ColumnRecord, ForeignKeyAction, ForeignKeyRecord, IndexOrigin, IndexRecord, Record,
};
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, warn};

use crate::error::Result;

type ColumnRow = (i64, String, String, i64, Option<String>, i64);
type ForeignKeyRow = (i64, i64, String, String, Option<String>, String, String, String);
type IndexRow = (i64, String, i64, String, i64);

fn index(value: i64) -> usize {
    usize::try_from(value).unwrap_or_default()
}

fn action(table: &str, text: &str) -> ForeignKeyAction {
    ForeignKeyAction::from_sql(text).unwrap_or_else(|| {
        warn!(table = %table, action = %text, "Unknown foreign key action");
        ForeignKeyAction::NoAction
    })
}

/// Reads the columns, foreign keys and indexes of `table`, in that order.
///
/// An empty result means the table does not exist.
pub async fn read_table(conn: &mut SqliteConnection, table: &str) -> Result<Vec<Record>> {
    let columns: Vec<ColumnRow> = sqlx::query_as(
        "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?)",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    let foreign_keys: Vec<ForeignKeyRow> = sqlx::query_as(
        "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete, \"match\" \
         FROM pragma_foreign_key_list(?)",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    let indexes: Vec<IndexRow> =
        sqlx::query_as("SELECT seq, name, \"unique\", origin, partial FROM pragma_index_list(?)")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

    let mut records = Vec::with_capacity(columns.len() + foreign_keys.len() + indexes.len());
    for (cid, name, type_name, not_null, default, pk) in columns {
        records.push(Record::Column(ColumnRecord {
            cid: index(cid),
            name: name.to_lowercase(),
            type_name,
            not_null: not_null != 0,
            // A declared DEFAULT NULL is reported as the text NULL. The outer
            // parentheses of an expression default are already gone.
            default: default.filter(|d| !d.trim().eq_ignore_ascii_case("NULL")),
            primary_key: pk != 0,
        }));
    }
    for (id, seq, parent, from, to, on_update, on_delete, match_clause) in foreign_keys {
        records.push(Record::ForeignKey(ForeignKeyRecord {
            id: index(id),
            seq: index(seq),
            table: parent.to_lowercase(),
            from: from.to_lowercase(),
            to: to.map(|to| to.to_lowercase()),
            on_update: action(table, &on_update),
            on_delete: action(table, &on_delete),
            match_clause: Some(match_clause).filter(|m| !m.eq_ignore_ascii_case("NONE")),
        }));
    }
    for (seq, name, unique, origin, partial) in indexes {
        let Some(origin) = IndexOrigin::from_code(&origin) else {
            warn!(table = %table, index = %name, origin = %origin, "Unknown index origin");
            continue;
        };
        let columns: Vec<(Option<String>,)> =
            sqlx::query_as("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&name)
                .fetch_all(&mut *conn)
                .await?;
        records.push(Record::Index(IndexRecord {
            seq: index(seq),
            name: name.to_lowercase(),
            unique: unique != 0,
            origin,
            partial: partial != 0,
            columns: columns
                .into_iter()
                .filter_map(|(column,)| column.map(|c| c.to_lowercase()))
                .collect(),
        }));
    }

    debug!(table = %table, records = records.len(), "Read live schema");
    Ok(records)
}

/// Returns true if a table named `name` exists.
pub async fn table_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, SqliteConnection};

    async fn memory() -> SqliteConnection {
        SqliteConnection::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_table_reads_empty() {
        let mut conn = memory().await;
        assert!(read_table(&mut conn, "Players").await.unwrap().is_empty());
        assert!(!table_exists(&mut conn, "Players").await.unwrap());
    }

    #[tokio::test]
    async fn test_reads_columns_keys_and_indexes() {
        let mut conn = memory().await;
        sqlx::query("CREATE TABLE Quarters (Quarter TEXT PRIMARY KEY, GameCount INTEGER)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE Memberships (PlayerId INTEGER NOT NULL DEFAULT 0, \
             QuarterId TEXT REFERENCES Quarters ON DELETE CASCADE, \
             Note TEXT DEFAULT 'x', PRIMARY KEY (PlayerId, QuarterId))",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        assert!(table_exists(&mut conn, "memberships").await.unwrap());

        let records = read_table(&mut conn, "Memberships").await.unwrap();
        let mut player = ColumnRecord::new(0, "playerid", "INTEGER");
        player.not_null = true;
        player.default = Some("0".into());
        player.primary_key = true;
        assert_eq!(records[0], Record::Column(player));
        assert_eq!(records[2].as_column().unwrap().default.as_deref(), Some("'x'"));

        assert_eq!(
            records[3],
            Record::ForeignKey(ForeignKeyRecord {
                id: 0,
                seq: 0,
                table: "quarters".into(),
                from: "quarterid".into(),
                to: None,
                on_update: ForeignKeyAction::NoAction,
                on_delete: ForeignKeyAction::Cascade,
                match_clause: None,
            })
        );
        assert_eq!(
            records[4],
            Record::Index(IndexRecord {
                seq: 0,
                name: "sqlite_autoindex_memberships_1".into(),
                unique: true,
                origin: IndexOrigin::PrimaryKey,
                partial: false,
                columns: vec!["playerid".into(), "quarterid".into()],
            })
        );
        assert_eq!(records.len(), 5);
    }

    #[tokio::test]
    async fn test_rowid_alias_has_no_index() {
        let mut conn = memory().await;
        sqlx::query("CREATE TABLE Players (Id INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT)")
            .execute(&mut conn)
            .await
            .unwrap();
        let records = read_table(&mut conn, "Players").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].as_column().unwrap().primary_key);
    }

    #[tokio::test]
    async fn test_null_default_reads_as_absent() {
        let mut conn = memory().await;
        sqlx::query("CREATE TABLE Notes (Body TEXT DEFAULT NULL, Total INTEGER DEFAULT ((1)+(2)))")
            .execute(&mut conn)
            .await
            .unwrap();
        let records = read_table(&mut conn, "Notes").await.unwrap();
        assert_eq!(records[0].as_column().unwrap().default, None);
        assert_eq!(
            records[1].as_column().unwrap().default.as_deref(),
            Some("(1)+(2)")
        );
    }

    #[tokio::test]
    async fn test_reads_index_columns() {
        let mut conn = memory().await;
        sqlx::query("CREATE TABLE Seats (Game INTEGER, Player INTEGER, UNIQUE (Player, Game))")
            .execute(&mut conn)
            .await
            .unwrap();
        let records = read_table(&mut conn, "Seats").await.unwrap();
        let Record::Index(index) = &records[2] else {
            panic!("expected an index");
        };
        assert_eq!(index.columns, ["player", "game"]);
        assert_eq!(index.origin, IndexOrigin::Unique);
    }
}
