//! Schema synchronization.
//!
//! The [`Synchronizer`] checks each declared table against the database,
//! parents before children, and applies the planned change when running
//! in upgrade mode. Every table gets its own [`Session`].

use std::path::PathBuf;

use oxide_ddl::diff::{DiffOptions, SchemaDelta};
use oxide_ddl::model::{SchemaModel, TableSpec};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::backup::make_backup;
use crate::config::{Settings, SyncOptions};
use crate::confirm::Confirm;
use crate::dialect::{SchemaDialect, Statement};
use crate::error::{Result, SyncError};
use crate::introspect;
use crate::planner::{self, Category, Plan};
use crate::session::Session;

/// What happened to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    /// The table was created.
    Created,
    /// The table already matched.
    Unchanged,
    /// Columns were added in place.
    ColumnsAdded,
    /// The table was rebuilt.
    Rebuilt,
    /// The operator declined the rebuild.
    Declined,
    /// Changes were found but not applied.
    Pending,
}

/// The result of checking one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    /// Table name.
    pub table: String,
    /// How the live table related to its spec.
    pub category: Category,
    /// What was done.
    pub action: Action,
    /// SQL of the planned statements.
    pub statements: Vec<String>,
    /// Backup taken before a rebuild.
    pub backup: Option<PathBuf>,
    /// The difference found, for tables that existed.
    pub delta: Option<SchemaDelta>,
}

impl TableOutcome {
    /// Returns true if the table differed from its spec.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.category != Category::MatchesExactly
    }
}

/// The outcome of a run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// One outcome per declared table.
    pub tables: Vec<TableOutcome>,
}

impl Report {
    /// Returns true if any table differed from its spec.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.tables.iter().any(TableOutcome::changed)
    }

    /// Finds the outcome for a table, ignoring case.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<&TableOutcome> {
        self.tables
            .iter()
            .find(|t| t.table.eq_ignore_ascii_case(table))
    }

    /// Tables whose rebuild was declined.
    pub fn declined(&self) -> impl Iterator<Item = &TableOutcome> {
        self.tables.iter().filter(|t| t.action == Action::Declined)
    }

    /// Renders the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Brings a database in line with a schema model.
pub struct Synchronizer<D: SchemaDialect, C: Confirm> {
    settings: Settings,
    options: SyncOptions,
    dialect: D,
    confirm: C,
}

impl<D: SchemaDialect, C: Confirm> Synchronizer<D, C> {
    /// Creates a synchronizer.
    pub const fn new(settings: Settings, options: SyncOptions, dialect: D, confirm: C) -> Self {
        Self {
            settings,
            options,
            dialect,
            confirm,
        }
    }

    /// Checks every table of `model`, parents first.
    ///
    /// Stops at the first error; tables checked before it keep whatever
    /// change was applied to them.
    pub async fn run(&mut self, model: &SchemaModel) -> Result<Report> {
        let order = model.check_order()?;
        info!(
            database = %self.settings.database.display(),
            tables = order.len(),
            upgrade = self.options.upgrade,
            "Checking schema"
        );

        let mut report = Report::default();
        for spec in order {
            report.tables.push(self.sync_table(spec).await?);
        }
        Ok(report)
    }

    /// Checks one table in its own session.
    pub async fn sync_table(&mut self, spec: &TableSpec) -> Result<TableOutcome> {
        let mut session = Session::open(&self.settings.database).await?;
        let outcome = self.check_table(&mut session, spec).await;
        session.close(outcome).await
    }

    fn render(&self, statements: &[Statement]) -> Vec<String> {
        statements
            .iter()
            .map(|s| self.dialect.statement_sql(s))
            .collect()
    }

    async fn check_table(&mut self, session: &mut Session, spec: &TableSpec) -> Result<TableOutcome> {
        let table = spec.name.as_str();
        let aside = planner::aside_name(table);
        if introspect::table_exists(session.connection(), &aside).await? {
            if !self.options.recover {
                return Err(SyncError::InterruptedRebuild {
                    table: table.to_string(),
                    aside,
                });
            }
            warn!(table = %table, aside = %aside, "Restoring table left by an interrupted rebuild");
            let statements = self.render(&planner::recovery_statements(table));
            session.execute_restructure(&statements).await?;
        }

        let desired = spec.desired_records()?;
        let actual = introspect::read_table(session.connection(), table).await?;
        let options = DiffOptions {
            order_matters: self.options.order_matters,
        };
        let plan = planner::plan_table(spec, &desired, &actual, options);
        if let Some(delta) = &plan.delta {
            for line in delta.describe() {
                debug!(table = %table, "{line}");
            }
        }
        let statements = self.render(&plan.statements);
        for sql in &statements {
            trace!(table = %table, sql = %sql, "Planned SQL");
        }

        let mut outcome = TableOutcome {
            table: plan.table.clone(),
            category: plan.category,
            action: Action::Unchanged,
            statements,
            backup: None,
            delta: plan.delta.clone(),
        };

        if plan.category == Category::MatchesExactly {
            info!(table = %table, "Table is up to date");
            return Ok(outcome);
        }
        if !self.options.upgrade {
            info!(table = %table, category = ?plan.category, "Table differs from its spec");
            outcome.action = Action::Pending;
            return Ok(outcome);
        }

        // Anything that can lose data goes through backup and confirmation.
        outcome.action = match plan.category {
            _ if plan.statements.iter().any(Statement::is_destructive) => {
                self.rebuild(session, &plan, &mut outcome).await?
            }
            Category::Absent => {
                info!(table = %table, "Creating table");
                session.execute_all(&outcome.statements).await?;
                Action::Created
            }
            Category::AddOnly => {
                info!(table = %table, columns = outcome.statements.len(), "Adding columns");
                session.execute_all(&outcome.statements).await?;
                Action::ColumnsAdded
            }
            Category::NeedsRebuild | Category::MatchesExactly => Action::Unchanged,
        };
        Ok(outcome)
    }

    async fn rebuild(
        &mut self,
        session: &mut Session,
        plan: &Plan,
        outcome: &mut TableOutcome,
    ) -> Result<Action> {
        let table = plan.table.as_str();
        outcome.backup = Some(make_backup(
            session.path(),
            &self.settings.backups,
            &self.settings.date_format,
        )?);

        if !self.options.force {
            let delta = plan.delta.clone().unwrap_or_default();
            if !self.confirm.confirm(&delta)? {
                warn!(table = %table, "Rebuild declined, table left as it is");
                return Ok(Action::Declined);
            }
        }

        info!(table = %table, "Rebuilding table");
        session.execute_restructure(&outcome.statements).await?;
        Ok(Action::Rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::confirm::Always;
    use crate::dialect::SqliteDialect;

    /// Counts the backups present each time a rebuild is offered.
    struct CountBackups {
        dir: PathBuf,
        seen: Rc<RefCell<Vec<usize>>>,
    }

    impl Confirm for CountBackups {
        fn confirm(&mut self, _delta: &SchemaDelta) -> Result<bool> {
            let count = std::fs::read_dir(&self.dir)?.count();
            self.seen.borrow_mut().push(count);
            Ok(true)
        }
    }

    fn synchronizer(
        dir: &tempfile::TempDir,
        options: SyncOptions,
    ) -> Synchronizer<SqliteDialect, Always> {
        let settings = Settings::new(dir.path().join("scores.db")).backups(dir.path().join("b"));
        Synchronizer::new(settings, options, SqliteDialect, Always(true))
    }

    fn players(fragments: &[&str]) -> SchemaModel {
        SchemaModel::new(vec![TableSpec::new("Players", fragments.iter().copied())])
    }

    #[tokio::test]
    async fn test_report_only_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sync = synchronizer(&dir, SyncOptions::default());
        let report = sync.run(&players(&["Id INTEGER PRIMARY KEY"])).await.unwrap();
        assert!(report.changed());
        assert_eq!(report.tables[0].action, Action::Pending);
        assert_eq!(report.tables[0].category, Category::Absent);

        let mut sync = synchronizer(&dir, SyncOptions::unattended());
        let report = sync.run(&players(&["Id INTEGER PRIMARY KEY"])).await.unwrap();
        assert_eq!(report.tables[0].action, Action::Created);
    }

    #[tokio::test]
    async fn test_interrupted_rebuild_is_detected_and_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.db");
        let mut session = Session::open(&path).await.unwrap();
        session
            .execute_all(&[
                "CREATE TABLE old_Players (Id INTEGER PRIMARY KEY, Name TEXT)".to_string(),
                "INSERT INTO old_Players (Name) VALUES ('kept')".to_string(),
                "CREATE TABLE Players (Id INTEGER PRIMARY KEY)".to_string(),
            ])
            .await
            .unwrap();
        session.close(Ok(())).await.unwrap();

        let model = players(&["Id INTEGER PRIMARY KEY", "Name TEXT"]);
        let mut sync = synchronizer(&dir, SyncOptions::unattended());
        assert!(matches!(
            sync.run(&model).await,
            Err(SyncError::InterruptedRebuild { .. })
        ));

        let options = SyncOptions {
            recover: true,
            ..SyncOptions::unattended()
        };
        let report = synchronizer(&dir, options).run(&model).await.unwrap();
        assert_eq!(report.tables[0].action, Action::Unchanged);

        let mut session = Session::open(&path).await.unwrap();
        let name: (String,) = sqlx::query_as("SELECT Name FROM Players")
            .fetch_one(session.connection())
            .await
            .unwrap();
        assert_eq!(name.0, "kept");
        assert!(!introspect::table_exists(session.connection(), "old_Players")
            .await
            .unwrap());
        session.close(Ok(())).await.unwrap();
    }

    #[tokio::test]
    async fn test_definition_error_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut sync = synchronizer(&dir, SyncOptions::unattended());
        let result = sync.run(&players(&["Id INTEGER", "UNIQUE (Nope)"])).await;
        assert!(matches!(result, Err(SyncError::Schema(_))));
    }

    #[tokio::test]
    async fn test_backup_exists_before_rebuild_is_offered() {
        let dir = tempfile::tempdir().unwrap();
        let mut sync = synchronizer(&dir, SyncOptions::unattended());
        sync.run(&players(&["Id INTEGER PRIMARY KEY", "Name TEXT"]))
            .await
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let settings = Settings::new(dir.path().join("scores.db")).backups(dir.path().join("b"));
        let confirm = CountBackups {
            dir: dir.path().join("b"),
            seen: Rc::clone(&seen),
        };
        let options = SyncOptions {
            upgrade: true,
            ..SyncOptions::default()
        };
        let mut sync = Synchronizer::new(settings, options, SqliteDialect, confirm);
        let report = sync
            .run(&players(&["Id INTEGER PRIMARY KEY", "Name VARCHAR(50)"]))
            .await
            .unwrap();
        assert_eq!(report.tables[0].action, Action::Rebuilt);
        assert_eq!(*seen.borrow(), [1]);
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut sync = synchronizer(&dir, SyncOptions::default());
        let report = sync.run(&players(&["Id INTEGER PRIMARY KEY"])).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["tables"][0]["table"], "Players");
        assert_eq!(json["tables"][0]["action"], "Pending");
        assert_eq!(json["tables"][0]["category"], "Absent");
    }
}
