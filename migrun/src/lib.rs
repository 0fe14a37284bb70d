#![cfg_attr(docsrs, feature(doc_cfg))]
//! `migrun` applies and rolls back database migrations kept as files in a
//! directory, recording each applied migration in a bookkeeping table.
//!
//! Core concepts:
//! - A migration's identifier is the stem of its source file. Identifiers sort
//!   lexicographically, so date-prefixed names such as
//!   `2025_03_09_001_create_users` run in the order they were written.
//! - Each file is bound to a [MigrationUnit] through a [Registry]: an `apply`
//!   and a `revert` operation receiving a live [Executor].
//! - The [Ledger] is the single source of truth for what has been applied.
//!   An identifier is recorded only after its `apply` succeeded and removed
//!   only after its `revert` succeeded.
//!
//! # Usage
//!
//! ```
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use migrun::{registry, sql_migration, Migrator, RollbackScope, UnitLoader};
//!
//! sql_migration!(CreateUsers,
//!     apply: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
//!     revert: "DROP TABLE users"
//! );
//!
//! let dir = tempfile::tempdir()?;
//! std::fs::write(dir.path().join("2025_03_09_001_create_users.rs"), "")?;
//!
//! let registry = registry! { "2025_03_09_001_create_users" => CreateUsers }?;
//! let migrator = Migrator::new(UnitLoader::new(dir.path(), registry));
//! let mut conn = rusqlite::Connection::open_in_memory()?;
//!
//! let report = migrator.apply_all(&mut conn)?;
//! assert_eq!(report.applied, vec!["2025_03_09_001_create_users"]);
//!
//! let report = migrator.rollback(&mut conn, RollbackScope::Last)?;
//! assert_eq!(report.reverted, vec!["2025_03_09_001_create_users"]);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```
//!
//! # Features
//!
//! - [`SQLite`](sqlite) - available with the `sqlite` feature flag (default).
//! - [`MySQL`](mysql) - available with the `mysql` feature flag.
//! - Tracing integration - available with the `tracing` feature flag (default).
//! - A ready-made [command line](cli) - available with the `cli` feature flag.
//! - Testing utilities - available with the `testing` feature flag.

mod core;
pub use core::{
    Command, Direction, Executor, LedgerEntry, MigrationFailure, MigrationReport, MigrationUnit,
    RollbackScope, Row, UnitStatus,
};

mod error;
pub use error::Error;

#[macro_use]
mod macros;

mod ledger;
pub use ledger::Ledger;

mod loader;
pub use loader::{Registry, UnitLoader};

mod migrator;
pub use migrator::Migrator;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod cli;

#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod config;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(all(test, feature = "mysql"))]
pub(crate) mod test_mysql;
