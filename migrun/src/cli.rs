//! Command-line runner.
//!
//! An application exposes its migrations by building a [Registry] and handing
//! it to [main]:
//!
//! ```no_run
//! use migrun::{registry, sql_migration};
//!
//! sql_migration!(CreateUsers,
//!     apply: "CREATE TABLE users (id INTEGER PRIMARY KEY)",
//!     revert: "DROP TABLE users"
//! );
//!
//! fn main() -> std::process::ExitCode {
//!     match registry! { "2025_03_09_001_create_users" => CreateUsers } {
//!         Ok(registry) => migrun::cli::main(registry),
//!         Err(e) => {
//!             eprintln!("{}", e);
//!             std::process::ExitCode::FAILURE
//!         }
//!     }
//! }
//! ```
//!
//! The resulting binary accepts:
//!
//! - no arguments: apply all pending migrations
//! - `<identifier>`: apply one migration
//! - `rollback`: revert the most recently applied migration
//! - `rollback all`: revert every applied migration, newest first
//! - `--status`: list migrations with their state

use crate::config::{Config, Overrides};
use crate::core::{Command, Direction, Executor, MigrationReport, RollbackScope, UnitStatus};
use crate::error::Error;
use crate::ledger::Ledger;
use crate::loader::{Registry, UnitLoader};
use crate::migrator::Migrator;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const ROLLBACK_KEYWORD: &str = "rollback";
const ROLLBACK_ALL_KEYWORD: &str = "all";

#[derive(Parser, Debug)]
#[command(name = "migrate", version, about = "Apply and roll back database migrations")]
pub struct CliArgs {
    /// Migration to apply, or `rollback`. Applies all pending migrations when omitted
    #[arg(value_name = "MIGRATION")]
    pub target: Option<String>,

    /// After `rollback`: `all` reverts every applied migration instead of the last one
    #[arg(value_name = "SCOPE")]
    pub scope: Option<String>,

    /// Database to migrate (`sqlite://path`, `sqlite::memory:` or `mysql://...`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory holding migration source files
    #[arg(long, env = "MIGRATIONS_DIR")]
    pub migrations_dir: Option<PathBuf>,

    /// Name of the bookkeeping table
    #[arg(long)]
    pub table: Option<String>,

    /// File extension that marks migration sources
    #[arg(long)]
    pub extension: Option<String>,

    /// Configuration file (defaults to `migrun.toml` when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List every migration and whether it is applied
    #[arg(long, conflicts_with_all = ["target", "scope"])]
    pub status: bool,
}

impl CliArgs {
    /// The invocation mode selected by the positional arguments.
    pub fn command(&self) -> Result<Command, Error> {
        match (self.target.as_deref(), self.scope.as_deref()) {
            (None, _) => Ok(Command::ApplyAll),
            (Some(ROLLBACK_KEYWORD), None) => Ok(Command::Rollback(RollbackScope::Last)),
            (Some(ROLLBACK_KEYWORD), Some(ROLLBACK_ALL_KEYWORD)) => {
                Ok(Command::Rollback(RollbackScope::All))
            }
            (Some(ROLLBACK_KEYWORD), Some(other)) => Err(Error::InvalidConfig(format!(
                "unknown rollback scope '{}'; expected '{}'",
                other, ROLLBACK_ALL_KEYWORD
            ))),
            (Some(identifier), None) => Ok(Command::ApplyOne(identifier.to_string())),
            (Some(_), Some(extra)) => Err(Error::InvalidConfig(format!(
                "unexpected argument '{}'",
                extra
            ))),
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            database_url: self.database_url.clone(),
            migrations_dir: self.migrations_dir.clone(),
            table: self.table.clone(),
            extension: self.extension.clone(),
            config: self.config.clone(),
        }
    }
}

/// Open a connection for `url`.
pub fn connect(url: &str) -> Result<Box<dyn Executor>, Error> {
    if url.starts_with("sqlite:") {
        return connect_sqlite(url);
    }
    if url.starts_with("mysql://") {
        return connect_mysql(url);
    }
    Err(Error::InvalidConfig(format!(
        "unsupported database URL '{}'; expected sqlite:// or mysql://",
        url
    )))
}

#[cfg(feature = "sqlite")]
fn connect_sqlite(url: &str) -> Result<Box<dyn Executor>, Error> {
    if url == "sqlite::memory:" {
        return Ok(Box::new(rusqlite::Connection::open_in_memory()?));
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    Ok(Box::new(rusqlite::Connection::open(path)?))
}

#[cfg(not(feature = "sqlite"))]
fn connect_sqlite(_url: &str) -> Result<Box<dyn Executor>, Error> {
    Err(Error::InvalidConfig(
        "SQLite support requires the `sqlite` feature".to_string(),
    ))
}

#[cfg(feature = "mysql")]
fn connect_mysql(url: &str) -> Result<Box<dyn Executor>, Error> {
    let opts = mysql::Opts::from_url(url).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    Ok(Box::new(mysql::Conn::new(opts)?))
}

#[cfg(not(feature = "mysql"))]
fn connect_mysql(_url: &str) -> Result<Box<dyn Executor>, Error> {
    Err(Error::InvalidConfig(
        "MySQL support requires the `mysql` feature".to_string(),
    ))
}

/// Parse the process arguments, run, and turn any failure into a message.
pub fn main(registry: Registry) -> ExitCode {
    init_tracing();
    let args = CliArgs::parse();
    match run(registry, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // a subscriber installed by the host application wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(registry: Registry, args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(args.overrides())?;
    let command = if args.status {
        None
    } else {
        Some(args.command()?)
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(config = ?config, command = ?command, "Starting migration runner");

    let loader = UnitLoader::new(&config.migrations_dir, registry).with_extension(&config.extension);
    let migrator = with_console_notices(Migrator::new(loader).with_ledger(Ledger::new(&config.table)?));
    let mut executor = connect(&config.database_url)?;

    let Some(command) = command else {
        print_status(&migrator.status(executor.as_mut())?);
        return Ok(());
    };

    match &command {
        Command::ApplyAll => println!("🚀 Running all pending migrations..."),
        Command::ApplyOne(_) => {}
        Command::Rollback(RollbackScope::Last) => {
            println!("⏪ Rolling back the last applied migration...")
        }
        Command::Rollback(RollbackScope::All) => println!("⏪ Rolling back all migrations..."),
    }

    let report = migrator.run(executor.as_mut(), &command)?;
    finish(&command, report)
}

fn with_console_notices(migrator: Migrator) -> Migrator {
    migrator
        .on_unit_start(|identifier, direction| match direction {
            Direction::Apply => println!("Running migration: {}", identifier),
            Direction::Revert => println!("Rolling back: {}", identifier),
        })
        .on_unit_complete(|identifier, direction, _duration| match direction {
            Direction::Apply => println!("✅ Migration '{}' applied successfully.", identifier),
            Direction::Revert => println!("⏪ Rolled back: {}", identifier),
        })
        .on_unit_skipped(|identifier| {
            println!("=>X Skipping already applied migration: {}", identifier)
        })
}

fn finish(command: &Command, report: MigrationReport) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(failure) = report.failing_migration {
        return Err(format!(
            "Migration '{}' failed to {}: {}",
            failure.identifier(),
            failure.direction(),
            failure.error()
        )
        .into());
    }
    match command {
        Command::ApplyAll if report.applied.is_empty() => println!("Nothing to migrate."),
        Command::ApplyAll => println!("✅ All migrations applied successfully."),
        Command::ApplyOne(_) => {}
        Command::Rollback(_) if report.reverted.is_empty() => {
            println!("No migrations to roll back.")
        }
        Command::Rollback(_) => println!("✅ Rollback completed successfully."),
    }
    Ok(())
}

fn print_status(statuses: &[UnitStatus]) {
    if statuses.is_empty() {
        println!("No migrations found.");
        return;
    }
    for status in statuses {
        match (status.applied_at, status.source_present) {
            (Some(applied_at), true) => println!("  [x] {}  applied {}", status.identifier, applied_at),
            (None, _) => println!("  [ ] {}  pending", status.identifier),
            (Some(applied_at), false) => println!(
                "  [!] {}  applied {}, source file missing",
                status.identifier, applied_at
            ),
        }
    }
}
