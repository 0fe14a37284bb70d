//!
//! # SQLite support
//!
//! [Executor] is implemented for [rusqlite::Connection]. Each statement runs
//! on its own; migrations are not wrapped in a transaction.
//!
//! ```
//! use migrun::{sql_migration, Migrator, Registry, UnitLoader};
//! use rusqlite::Connection;
//!
//! sql_migration!(CreateUsers,
//!     apply: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
//!     revert: "DROP TABLE users"
//! );
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! std::fs::write(dir.path().join("2025_01_01_create_users.rs"), "")?;
//!
//! let mut registry = Registry::new();
//! registry.register::<CreateUsers>("2025_01_01_create_users")?;
//! let migrator = Migrator::new(UnitLoader::new(dir.path(), registry));
//!
//! let mut conn = Connection::open_in_memory()?;
//! let report = migrator.apply_all(&mut conn)?;
//! assert_eq!(report.applied, vec!["2025_01_01_create_users"]);
//!
//! // a second run finds nothing to do
//! let report = migrator.apply_all(&mut conn)?;
//! assert!(report.applied.is_empty());
//! assert_eq!(report.skipped, vec!["2025_01_01_create_users"]);
//! # Ok(())
//! # }
//! ```

use crate::core::{Executor, Row};
use crate::error::Error;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};

impl Executor for Connection {
    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64, Error> {
        let affected = Connection::execute(self, sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        let mut stmt = self.prepare(sql)?;
        let column_count = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(value_as_text))
                    .collect::<Result<Row, rusqlite::Error>>()
            })?
            .collect::<Result<Vec<Row>, rusqlite::Error>>()?;
        Ok(rows)
    }

    fn ledger_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                migration TEXT UNIQUE NOT NULL,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            table
        )
    }
}

fn value_as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
