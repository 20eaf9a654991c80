//! oxide-sync CLI
//!
//! Command-line tool for checking and upgrading a database against a
//! declared schema.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_sync::app_schema;
use oxide_sync::config::{DEFAULT_BACKUPS, DEFAULT_DATABASE, DEFAULT_DATE_FORMAT};
use oxide_sync::prelude::*;

/// Keeps a SQLite database in step with a declared schema.
#[derive(Parser)]
#[command(name = "oxide-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(env = "OXIDE_SYNC_DATABASE", default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// JSON schema file (the built-in application schema if not given).
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Directory for backups made before rebuilding a table.
    #[arg(short, long, env = "OXIDE_SYNC_BACKUPS", default_value = DEFAULT_BACKUPS)]
    backups: PathBuf,

    /// chrono format for backup timestamps.
    #[arg(long, env = "OXIDE_SYNC_DATE_FORMAT", default_value = DEFAULT_DATE_FORMAT)]
    date_format: String,

    /// Apply the changes instead of only reporting them.
    #[arg(short, long)]
    upgrade: bool,

    /// Treat a change in column order as a change.
    #[arg(short, long)]
    order_matters: bool,

    /// Rebuild tables without asking.
    #[arg(short, long)]
    force: bool,

    /// Restore tables left aside by an interrupted rebuild.
    #[arg(short, long)]
    recover: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// More output; repeat for field differences and SQL.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn load_schema(path: Option<&PathBuf>) -> anyhow::Result<SchemaModel> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(SchemaModel::from_json(&text)?)
        }
        None => Ok(app_schema::schema()),
    }
}

/// Returns true if `outcome` is printed at verbosity `verbose`. Quiet runs
/// only list tables still waiting for the operator.
fn shows(outcome: &TableOutcome, verbose: u8) -> bool {
    verbose > 0 || matches!(outcome.action, Action::Pending | Action::Declined)
}

fn print_report(report: &Report, verbose: u8) {
    for outcome in report.tables.iter().filter(|t| shows(t, verbose)) {
        println!("{:<20} {:?}", outcome.table, outcome.action);
        if outcome.action == Action::Unchanged {
            continue;
        }
        if let Some(delta) = &outcome.delta {
            for line in delta.describe() {
                println!("    {line}");
            }
        }
        if outcome.action == Action::Pending {
            for sql in &outcome.statements {
                println!("    {sql};");
            }
        }
        if let Some(backup) = &outcome.backup {
            println!("    backup: {}", backup.display());
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose))
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let model = load_schema(cli.schema.as_ref())?;
    let settings = Settings::new(&cli.database)
        .backups(&cli.backups)
        .date_format(&cli.date_format);
    let options = SyncOptions {
        upgrade: cli.upgrade,
        order_matters: cli.order_matters,
        force: cli.force,
        recover: cli.recover,
    };

    let mut synchronizer = Synchronizer::new(settings, options, SqliteDialect::new(), Prompt::stdio());
    let report = synchronizer.run(&model).await?;

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report, cli.verbose);
    }
    if !cli.upgrade && report.changed() {
        info!("Run again with --upgrade to apply the changes");
    }
    Ok(())
}
