//! The bookkeeping table recording which migrations have been applied.

use crate::core::{Executor, LedgerEntry};
use crate::error::Error;
use chrono::{NaiveDateTime, Utc};

pub(crate) const DEFAULT_LEDGER_TABLE_NAME: &str = "migrations";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The persisted record of applied migrations, stored in a single table.
///
/// Every method takes the executor explicitly; the ledger holds no connection.
/// A migration is applied if and only if its identifier has a row here.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    table: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            table: DEFAULT_LEDGER_TABLE_NAME.to_string(),
        }
    }
}

impl Ledger {
    /// Create a ledger backed by the table `table`.
    /// The name is interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
    pub fn new(table: impl Into<String>) -> Result<Self, Error> {
        let table = table.into();
        let mut chars = table.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::InvalidConfig(format!(
                "'{}' is not a valid ledger table name",
                table
            )));
        }
        Ok(Self { table })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Create the bookkeeping table if it does not exist yet.
    pub fn ensure_schema(&self, executor: &mut dyn Executor) -> Result<(), Error> {
        let ddl = executor.ledger_table_ddl(&self.table);
        executor.execute(&ddl, &[])?;
        Ok(())
    }

    pub fn is_applied(&self, executor: &mut dyn Executor, identifier: &str) -> Result<bool, Error> {
        let rows = executor.query(
            &format!(
                "SELECT 1 FROM {} WHERE migration = ? LIMIT 1",
                self.table
            ),
            &[identifier],
        )?;
        Ok(!rows.is_empty())
    }

    /// Insert an entry stamped with the current time.
    ///
    /// Fails with [Error::DuplicateIdentifier] if the identifier is already
    /// recorded. Callers check [Ledger::is_applied] first; this is what catches
    /// a second operator that raced past that check.
    pub fn record_applied(&self, executor: &mut dyn Executor, identifier: &str) -> Result<(), Error> {
        let applied_at = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        executor
            .execute(
                &format!(
                    "INSERT INTO {} (migration, applied_at) VALUES (?, ?)",
                    self.table
                ),
                &[identifier, &applied_at],
            )
            .map_err(|err| {
                if err.is_unique_violation() {
                    Error::DuplicateIdentifier(identifier.to_string())
                } else {
                    err
                }
            })?;
        Ok(())
    }

    /// Remove the entry for `identifier`. Removing an absent entry is not an error.
    pub fn record_reverted(&self, executor: &mut dyn Executor, identifier: &str) -> Result<(), Error> {
        executor.execute(
            &format!("DELETE FROM {} WHERE migration = ?", self.table),
            &[identifier],
        )?;
        Ok(())
    }

    /// Applied identifiers, most recently applied first, optionally truncated to `limit`.
    pub fn list_applied_descending(
        &self,
        executor: &mut dyn Executor,
        limit: Option<usize>,
    ) -> Result<Vec<String>, Error> {
        let mut sql = format!("SELECT migration FROM {} ORDER BY id DESC", self.table);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        executor
            .query(&sql, &[])?
            .into_iter()
            .map(|row| first_column(row, "migration"))
            .collect()
    }

    /// Every entry in the order it was applied.
    pub fn history(&self, executor: &mut dyn Executor) -> Result<Vec<LedgerEntry>, Error> {
        let rows = executor.query(
            &format!(
                "SELECT migration, applied_at FROM {} ORDER BY id",
                self.table
            ),
            &[],
        )?;

        rows.into_iter()
            .map(|row| {
                let mut values = row.into_iter();
                let identifier = values
                    .next()
                    .flatten()
                    .ok_or_else(|| Error::Generic("ledger row is missing its migration".to_string()))?;
                let applied_at_str = values.next().flatten().ok_or_else(|| {
                    Error::Generic(format!("ledger row for '{}' has no applied_at", identifier))
                })?;
                let applied_at = NaiveDateTime::parse_from_str(&applied_at_str, TIMESTAMP_FORMAT)
                    .map_err(|e| Error::Generic(format!("Failed to parse datetime: {}", e)))?
                    .and_utc();
                Ok(LedgerEntry {
                    identifier,
                    applied_at,
                })
            })
            .collect()
    }
}

fn first_column(row: Vec<Option<String>>, column: &str) -> Result<String, Error> {
    row.into_iter()
        .next()
        .flatten()
        .ok_or_else(|| Error::Generic(format!("ledger row is missing its {}", column)))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn ledger_conn() -> (Ledger, Connection) {
        let mut conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::default();
        ledger.ensure_schema(&mut conn).unwrap();
        (ledger, conn)
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let (ledger, mut conn) = ledger_conn();
        ledger.record_applied(&mut conn, "2025_01_01_a").unwrap();
        ledger.ensure_schema(&mut conn).unwrap();
        // existing entries survive a second ensure_schema
        assert!(ledger.is_applied(&mut conn, "2025_01_01_a").unwrap());

        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(migrations)")
            .unwrap()
            .query_map([], |row| row.get(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(columns, vec!["id", "migration", "applied_at"]);
    }

    #[test]
    fn is_applied_on_empty_ledger() {
        let (ledger, mut conn) = ledger_conn();
        assert!(!ledger.is_applied(&mut conn, "2025_01_01_a").unwrap());
    }

    #[test]
    fn record_applied_twice_is_duplicate() {
        let (ledger, mut conn) = ledger_conn();
        ledger.record_applied(&mut conn, "2025_01_01_a").unwrap();
        assert_eq!(
            ledger.record_applied(&mut conn, "2025_01_01_a"),
            Err(Error::DuplicateIdentifier("2025_01_01_a".to_string()))
        );
        assert_eq!(ledger.history(&mut conn).unwrap().len(), 1);
    }

    #[test]
    fn record_reverted_missing_entry_is_noop() {
        let (ledger, mut conn) = ledger_conn();
        ledger.record_reverted(&mut conn, "2025_01_01_a").unwrap();
        ledger.record_applied(&mut conn, "2025_01_01_a").unwrap();
        ledger.record_reverted(&mut conn, "2025_01_01_a").unwrap();
        assert!(!ledger.is_applied(&mut conn, "2025_01_01_a").unwrap());
    }

    #[test]
    fn list_applied_descending_follows_insertion_order() {
        let (ledger, mut conn) = ledger_conn();
        // insertion order, not name order, decides recency
        ledger.record_applied(&mut conn, "2025_01_02_b").unwrap();
        ledger.record_applied(&mut conn, "2025_01_01_a").unwrap();
        ledger.record_applied(&mut conn, "2025_01_03_c").unwrap();

        assert_eq!(
            ledger.list_applied_descending(&mut conn, None).unwrap(),
            vec!["2025_01_03_c", "2025_01_01_a", "2025_01_02_b"]
        );
        assert_eq!(
            ledger.list_applied_descending(&mut conn, Some(1)).unwrap(),
            vec!["2025_01_03_c"]
        );
    }

    #[test]
    fn list_applied_descending_empty() {
        let (ledger, mut conn) = ledger_conn();
        assert!(ledger
            .list_applied_descending(&mut conn, Some(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn history_has_timestamps() {
        let (ledger, mut conn) = ledger_conn();
        let before = Utc::now() - chrono::Duration::seconds(1);
        ledger.record_applied(&mut conn, "2025_01_01_a").unwrap();
        ledger.record_applied(&mut conn, "2025_01_02_b").unwrap();
        let after = Utc::now() + chrono::Duration::seconds(1);

        let history = ledger.history(&mut conn).unwrap();
        let identifiers: Vec<&str> = history.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["2025_01_01_a", "2025_01_02_b"]);
        for entry in &history {
            assert!(entry.applied_at >= before && entry.applied_at <= after);
        }
    }

    #[test]
    fn history_reads_default_timestamp() {
        let (ledger, mut conn) = ledger_conn();
        // rows written without an explicit applied_at fall back to the column default
        conn.execute("INSERT INTO migrations (migration) VALUES ('legacy')", [])
            .unwrap();
        let history = ledger.history(&mut conn).unwrap();
        assert_eq!(history[0].identifier, "legacy");
    }

    #[test]
    fn custom_table_name() {
        let mut conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new("_schema_history").unwrap();
        ledger.ensure_schema(&mut conn).unwrap();
        ledger.record_applied(&mut conn, "2025_01_01_a").unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM _schema_history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn rejects_unsafe_table_names() {
        for name in ["", "1migrations", "migrations; DROP TABLE users", "my-table"] {
            assert!(matches!(Ledger::new(name), Err(Error::InvalidConfig(_))));
        }
    }
}
