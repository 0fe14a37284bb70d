//! The migration state machine: selecting, applying and reverting units.

use crate::core::{
    Command, Direction, Executor, MigrationFailure, MigrationReport, RollbackScope, UnitStatus,
};
use crate::error::Error;
use crate::ledger::Ledger;
use crate::loader::UnitLoader;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

type StartHook = Box<dyn Fn(&str, Direction) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&str, Direction, Duration) + Send + Sync>;
type SkippedHook = Box<dyn Fn(&str) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str, Direction, &Error) + Send + Sync>;

/// The entrypoint for applying and reverting migrations.
///
/// Construct it with a [UnitLoader] describing where migration sources live
/// and which units they bind to. Each run threads the executor through
/// explicitly; the migrator holds no connection.
///
/// There is no locking: two processes running at once can both find a
/// migration pending and both apply it. The second to record it fails with
/// [Error::DuplicateIdentifier] after its statements already ran.
pub struct Migrator {
    loader: UnitLoader,
    ledger: Ledger,
    on_unit_start: Option<StartHook>,
    on_unit_complete: Option<CompleteHook>,
    on_unit_skipped: Option<SkippedHook>,
    on_unit_error: Option<ErrorHook>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("loader", &self.loader)
            .field("ledger", &self.ledger)
            .field("on_unit_start", &self.on_unit_start.is_some())
            .field("on_unit_complete", &self.on_unit_complete.is_some())
            .field("on_unit_skipped", &self.on_unit_skipped.is_some())
            .field("on_unit_error", &self.on_unit_error.is_some())
            .finish()
    }
}

impl Migrator {
    pub fn new(loader: UnitLoader) -> Self {
        Self {
            loader,
            ledger: Ledger::default(),
            on_unit_start: None,
            on_unit_complete: None,
            on_unit_skipped: None,
            on_unit_error: None,
        }
    }

    /// Use a ledger other than the default `migrations` table.
    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Set a callback to be invoked when a migration starts applying or reverting.
    pub fn on_unit_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, Direction) + Send + Sync + 'static,
    {
        self.on_unit_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration has run and the ledger is updated.
    pub fn on_unit_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, Direction, Duration) + Send + Sync + 'static,
    {
        self.on_unit_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration is skipped because it is already applied.
    pub fn on_unit_skipped<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_unit_skipped = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration fails.
    pub fn on_unit_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, Direction, &Error) + Send + Sync + 'static,
    {
        self.on_unit_error = Some(Box::new(callback));
        self
    }

    pub fn loader(&self) -> &UnitLoader {
        &self.loader
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run one invocation.
    ///
    /// Errors that occur before any migration is touched are returned as `Err`.
    /// A migration failing stops the run and is reported in
    /// [MigrationReport::failing_migration], next to the work already done.
    pub fn run(&self, executor: &mut dyn Executor, command: &Command) -> Result<MigrationReport, Error> {
        match command {
            Command::ApplyAll => self.apply_all(executor),
            Command::ApplyOne(identifier) => self.apply_one(executor, identifier),
            Command::Rollback(scope) => self.rollback(executor, *scope),
        }
    }

    /// Apply every pending migration in ascending identifier order.
    /// Already-applied migrations are skipped without being resolved.
    pub fn apply_all(&self, executor: &mut dyn Executor) -> Result<MigrationReport, Error> {
        self.prepare(executor)?;
        let candidates = self.loader.discover_all()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(candidates = ?candidates, "Considering migrations to apply");

        let mut report = MigrationReport::default();
        for identifier in candidates {
            match self.ledger.is_applied(executor, &identifier) {
                Ok(true) => {
                    self.skip(&identifier);
                    report.skipped.push(identifier);
                    continue;
                }
                Ok(false) => {}
                Err(error) => {
                    report.failing_migration = Some(self.fail(identifier, Direction::Apply, error));
                    break;
                }
            }

            match self.run_unit(executor, &identifier, Direction::Apply) {
                Ok(()) => report.applied.push(identifier),
                Err(error) => {
                    report.failing_migration = Some(MigrationFailure {
                        identifier,
                        direction: Direction::Apply,
                        error,
                    });
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Apply exactly one migration. Already applied is a successful no-op.
    ///
    /// Fails with [Error::UnitNotFound] if no source file exists for `identifier`.
    pub fn apply_one(&self, executor: &mut dyn Executor, identifier: &str) -> Result<MigrationReport, Error> {
        self.prepare(executor)?;
        let identifier = self.loader.identifier_for(identifier);
        if !self.loader.source_exists(identifier) {
            return Err(Error::UnitNotFound(identifier.to_string()));
        }

        let mut report = MigrationReport::default();
        match self.ledger.is_applied(executor, identifier) {
            Ok(true) => {
                self.skip(identifier);
                report.skipped.push(identifier.to_string());
            }
            Ok(false) => match self.run_unit(executor, identifier, Direction::Apply) {
                Ok(()) => report.applied.push(identifier.to_string()),
                Err(error) => {
                    report.failing_migration = Some(MigrationFailure {
                        identifier: identifier.to_string(),
                        direction: Direction::Apply,
                        error,
                    });
                }
            },
            Err(error) => {
                report.failing_migration =
                    Some(self.fail(identifier.to_string(), Direction::Apply, error));
            }
        }
        Ok(report)
    }

    /// Revert the latest migration, or every applied migration newest first.
    ///
    /// An empty ledger yields an empty, successful report. A ledger entry
    /// whose source file is gone stops the run with [Error::UnitNotFound].
    pub fn rollback(&self, executor: &mut dyn Executor, scope: RollbackScope) -> Result<MigrationReport, Error> {
        self.prepare(executor)?;
        let limit = match scope {
            RollbackScope::Last => Some(1),
            RollbackScope::All => None,
        };
        let selected = self.ledger.list_applied_descending(executor, limit)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(scope = ?scope, selected = ?selected, "Considering migrations to revert");

        let mut report = MigrationReport::default();
        for identifier in selected {
            match self.run_unit(executor, &identifier, Direction::Revert) {
                Ok(()) => report.reverted.push(identifier),
                Err(error) => {
                    report.failing_migration = Some(MigrationFailure {
                        identifier,
                        direction: Direction::Revert,
                        error,
                    });
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Every migration source paired with its ledger state, in identifier order.
    /// Ledger entries without a source file are included as orphans.
    pub fn status(&self, executor: &mut dyn Executor) -> Result<Vec<UnitStatus>, Error> {
        self.prepare(executor)?;
        let mut applied: BTreeMap<String, _> = self
            .ledger
            .history(executor)?
            .into_iter()
            .map(|entry| (entry.identifier, entry.applied_at))
            .collect();

        let mut statuses: Vec<UnitStatus> = self
            .loader
            .discover_all()?
            .into_iter()
            .map(|identifier| UnitStatus {
                applied_at: applied.remove(&identifier),
                identifier,
                source_present: true,
            })
            .collect();
        statuses.extend(applied.into_iter().map(|(identifier, applied_at)| UnitStatus {
            identifier,
            applied_at: Some(applied_at),
            source_present: false,
        }));
        statuses.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(statuses)
    }

    fn prepare(&self, executor: &mut dyn Executor) -> Result<(), Error> {
        self.ledger.ensure_schema(executor)?;
        self.loader.ensure_directory()
    }

    fn skip(&self, identifier: &str) {
        #[cfg(feature = "tracing")]
        tracing::info!(migration = identifier, "Skipping already applied migration");

        if let Some(ref callback) = self.on_unit_skipped {
            callback(identifier);
        }
    }

    fn fail(&self, identifier: String, direction: Direction, error: Error) -> MigrationFailure {
        #[cfg(feature = "tracing")]
        tracing::error!(migration = %identifier, %direction, error = %error, "Migration failed");

        if let Some(ref callback) = self.on_unit_error {
            callback(&identifier, direction, &error);
        }
        MigrationFailure {
            identifier,
            direction,
            error,
        }
    }

    /// Resolve one unit, run it in `direction` and update the ledger.
    fn run_unit(&self, executor: &mut dyn Executor, identifier: &str, direction: Direction) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("migration", migration = identifier, %direction).entered();

        #[cfg(feature = "tracing")]
        tracing::info!("Starting migration");

        if let Some(ref callback) = self.on_unit_start {
            callback(identifier, direction);
        }

        let started = Instant::now();
        let result = self.loader.resolve(identifier).and_then(|unit| match direction {
            Direction::Apply => {
                unit.apply(executor)?;
                self.ledger.record_applied(executor, identifier)
            }
            Direction::Revert => {
                unit.revert(executor)?;
                self.ledger.record_reverted(executor, identifier)
            }
        });

        match &result {
            Ok(()) => {
                let duration = started.elapsed();

                #[cfg(feature = "tracing")]
                tracing::info!(duration_ms = duration.as_millis(), "Migration completed successfully");

                if let Some(ref callback) = self.on_unit_complete {
                    callback(identifier, direction, duration);
                }
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %error, "Migration failed");

                if let Some(ref callback) = self.on_unit_error {
                    callback(identifier, direction, error);
                }
            }
        }
        result
    }
}
