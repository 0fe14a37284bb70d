use crate::error::Error;
use chrono::{DateTime, Utc};

/// A row returned by [Executor::query], one optional text value per column.
pub type Row = Vec<Option<String>>;

/// The statement executor migrations and the ledger run against.
///
/// Implemented for `rusqlite::Connection` (with the `sqlite` feature) and
/// `mysql::Conn` (with the `mysql` feature). Any failure reported by the
/// database surfaces as a data-access [Error].
pub trait Executor {
    /// Run a statement that returns no rows, returning the number of affected rows.
    /// Parameters bind to `?` placeholders in order.
    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64, Error>;

    /// Run a statement that returns rows, rendering every value as text.
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error>;

    /// The `CREATE TABLE IF NOT EXISTS` statement for the bookkeeping table named `table`.
    ///
    /// The table must have an auto-increment surrogate `id`, a unique non-null
    /// `migration` column and an `applied_at` timestamp defaulting to insertion time.
    fn ledger_table_ddl(&self, table: &str) -> String;
}

/// A trait that must be implemented to define a migration.
///
/// Both operations are required. A unit is identified by the stem of its
/// source file and bound to it through a [Registry](crate::Registry).
pub trait MigrationUnit {
    /// Execute the migration's forward logic.
    fn apply(&self, executor: &mut dyn Executor) -> Result<(), Error>;

    /// Undo what [MigrationUnit::apply] did.
    fn revert(&self, executor: &mut dyn Executor) -> Result<(), Error>;

    /// Returns an optional description of what this migration does.
    fn description(&self) -> Option<&'static str> {
        None
    }
}

/// Which way a migration is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Apply,
    Revert,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply => f.write_str("apply"),
            Self::Revert => f.write_str("revert"),
        }
    }
}

/// How many applied migrations a rollback reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackScope {
    /// Only the most recently applied migration.
    #[default]
    Last,
    /// Every applied migration, newest first.
    All,
}

/// One invocation of the migrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply every pending migration in ascending identifier order.
    ApplyAll,
    /// Apply exactly one migration, skipping it if already applied.
    ApplyOne(String),
    /// Revert applied migrations, newest first.
    Rollback(RollbackScope),
}

/// The migration that stopped a run, and why.
#[derive(Debug, PartialEq)]
pub struct MigrationFailure {
    pub(crate) identifier: String,
    pub(crate) direction: Direction,
    pub(crate) error: Error,
}

impl MigrationFailure {
    /// Get the identifier of the migration that failed.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Whether the failure happened while applying or reverting.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Get the error that caused the migration to fail.
    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn into_error(self) -> Error {
        self.error
    }
}

/// A report of actions performed during one invocation.
///
/// Identifiers are listed in the order they were processed. Work completed
/// before a failure stays recorded in the ledger and is listed here too.
#[derive(Debug, Default, PartialEq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub reverted: Vec<String>,
    pub skipped: Vec<String>,
    pub failing_migration: Option<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failing_migration.is_none()
    }
}

/// A row of the bookkeeping table.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// The identifier of the migration.
    pub identifier: String,
    /// The timestamp when the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// The state of one migration as reported by [Migrator::status](crate::Migrator::status).
#[derive(Debug, Clone, PartialEq)]
pub struct UnitStatus {
    pub identifier: String,
    /// When the migration was applied, or `None` if it is pending.
    pub applied_at: Option<DateTime<Utc>>,
    /// False for orphaned history: a ledger entry whose source file is gone.
    pub source_present: bool,
}

impl UnitStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }

    pub fn is_orphaned(&self) -> bool {
        !self.source_present
    }
}
