//! Testing utilities for migration development.
//!
//! [MigrationDir] provides a throwaway migrations directory, and
//! [RecordingUnit] is a migration that logs every call into a shared
//! [Journal], so tests can assert exactly what ran and in which order.
//!
//! # Example
//!
//! ```
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! # #[cfg(feature = "sqlite")]
//! # fn main() {
//! use migrun::testing::{Journal, MigrationDir};
//! use migrun::{Direction, Migrator, UnitLoader};
//!
//! let dir = MigrationDir::with_units(&["2025_01_02_b", "2025_01_01_a"]);
//! let journal = Journal::default();
//! let registry = journal.registry(&["2025_01_01_a", "2025_01_02_b"]);
//! let migrator = Migrator::new(UnitLoader::new(dir.path(), registry));
//!
//! let mut conn = rusqlite::Connection::open_in_memory().unwrap();
//! migrator.apply_all(&mut conn).unwrap();
//! assert_eq!(
//!     journal.entries(),
//!     vec![
//!         (Direction::Apply, "2025_01_01_a".to_string()),
//!         (Direction::Apply, "2025_01_02_b".to_string()),
//!     ]
//! );
//! # }
//! ```

use crate::core::{Direction, Executor, MigrationUnit};
use crate::error::Error;
use crate::loader::{Registry, DEFAULT_UNIT_EXTENSION};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A temporary migrations directory, removed when dropped.
#[derive(Debug)]
pub struct MigrationDir {
    dir: tempfile::TempDir,
}

impl Default for MigrationDir {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temporary migrations directory"),
        }
    }

    /// Create a directory holding a source file for each identifier.
    pub fn with_units(identifiers: &[&str]) -> Self {
        let dir = Self::new();
        for identifier in identifiers {
            dir.touch(identifier);
        }
        dir
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create the source file for `identifier`.
    pub fn touch(&self, identifier: &str) {
        self.touch_file(&format!("{}.{}", identifier, DEFAULT_UNIT_EXTENSION));
    }

    /// Create an empty file named exactly `name`.
    pub fn touch_file(&self, name: &str) {
        std::fs::write(self.dir.path().join(name), "").expect("Failed to create migration source file");
    }

    /// Delete the source file for `identifier`, leaving any ledger entry orphaned.
    pub fn remove(&self, identifier: &str) {
        std::fs::remove_file(
            self.dir
                .path()
                .join(format!("{}.{}", identifier, DEFAULT_UNIT_EXTENSION)),
        )
        .expect("Failed to remove migration source file");
    }
}

/// A shared, ordered log of migration calls.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<(Direction, String)>>>,
}

impl Journal {
    pub fn record(&self, direction: Direction, identifier: &str) {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .push((direction, identifier.to_string()));
    }

    pub fn entries(&self) -> Vec<(Direction, String)> {
        self.entries.lock().expect("journal lock poisoned").clone()
    }

    /// Identifiers recorded for `direction`, in call order.
    pub fn calls(&self, direction: Direction) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(d, _)| *d == direction)
            .map(|(_, identifier)| identifier)
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("journal lock poisoned").clear();
    }

    /// A unit named `identifier` that logs into this journal.
    pub fn unit(&self, identifier: &str) -> RecordingUnit {
        RecordingUnit::new(identifier, self.clone())
    }

    /// A registry binding a [RecordingUnit] to each identifier.
    pub fn registry(&self, identifiers: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for identifier in identifiers {
            let unit = self.unit(identifier);
            registry
                .register_with(*identifier, move || -> Box<dyn MigrationUnit> {
                    Box::new(unit.clone())
                })
                .expect("identifiers must be unique");
        }
        registry
    }
}

/// A migration that records each call and optionally runs a statement or fails.
#[derive(Debug, Clone)]
pub struct RecordingUnit {
    identifier: String,
    journal: Journal,
    apply_sql: Option<String>,
    revert_sql: Option<String>,
    fail_apply: bool,
    fail_revert: bool,
}

impl RecordingUnit {
    pub fn new(identifier: &str, journal: Journal) -> Self {
        Self {
            identifier: identifier.to_string(),
            journal,
            apply_sql: None,
            revert_sql: None,
            fail_apply: false,
            fail_revert: false,
        }
    }

    /// Run `sql` against the executor when applied.
    pub fn applying(mut self, sql: &str) -> Self {
        self.apply_sql = Some(sql.to_string());
        self
    }

    /// Run `sql` against the executor when reverted.
    pub fn reverting(mut self, sql: &str) -> Self {
        self.revert_sql = Some(sql.to_string());
        self
    }

    /// Fail with [Error::Generic] after recording the apply call.
    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    /// Fail with [Error::Generic] after recording the revert call.
    pub fn failing_revert(mut self) -> Self {
        self.fail_revert = true;
        self
    }

    fn run(&self, executor: &mut dyn Executor, direction: Direction) -> Result<(), Error> {
        self.journal.record(direction, &self.identifier);
        let (sql, fail) = match direction {
            Direction::Apply => (&self.apply_sql, self.fail_apply),
            Direction::Revert => (&self.revert_sql, self.fail_revert),
        };
        if let Some(sql) = sql {
            executor.execute(sql, &[])?;
        }
        if fail {
            return Err(Error::Generic(format!(
                "{} of '{}' failed",
                direction, self.identifier
            )));
        }
        Ok(())
    }
}

impl MigrationUnit for RecordingUnit {
    fn apply(&self, executor: &mut dyn Executor) -> Result<(), Error> {
        self.run(executor, Direction::Apply)
    }

    fn revert(&self, executor: &mut dyn Executor) -> Result<(), Error> {
        self.run(executor, Direction::Revert)
    }
}
