//!
//! # MySQL support
//!
//! [Executor] is implemented for [mysql::Conn], matching the schema the
//! bookkeeping table has always had on MySQL:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS migrations (
//!     id INT AUTO_INCREMENT PRIMARY KEY,
//!     migration VARCHAR(255) UNIQUE NOT NULL,
//!     applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
//! )
//! ```
//!
//! DDL statements commit implicitly in MySQL, so a migration that fails
//! partway leaves its earlier statements applied. The ledger entry is only
//! written after the whole migration succeeds, so fixing the migration and
//! running again picks up where it stopped.

use crate::core::{Executor, Row};
use crate::error::Error;
use mysql::prelude::*;
use mysql::{Conn, Value};

impl Executor for Conn {
    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64, Error> {
        if params.is_empty() {
            // text protocol; some DDL cannot be prepared
            self.query_drop(sql)?;
        } else {
            self.exec_drop(sql, bind(params))?;
        }
        Ok(self.affected_rows())
    }

    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, Error> {
        let rows: Vec<mysql::Row> = if params.is_empty() {
            Queryable::query(self, sql)?
        } else {
            Queryable::exec(self, sql, bind(params))?
        };
        Ok(rows
            .into_iter()
            .map(|row| row.unwrap().into_iter().map(value_as_text).collect())
            .collect())
    }

    fn ledger_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INT AUTO_INCREMENT PRIMARY KEY,
                migration VARCHAR(255) UNIQUE NOT NULL,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            table
        )
    }
}

fn bind(params: &[&str]) -> Vec<Value> {
    params
        .iter()
        .map(|param| Value::Bytes(param.as_bytes().to_vec()))
        .collect()
}

fn value_as_text(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Date(year, month, day, hour, minute, second, _micros) => Some(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hour, minute, second
        )),
        Value::Time(negative, days, hours, minutes, seconds, _micros) => Some(format!(
            "{}{}:{:02}:{:02}",
            if negative { "-" } else { "" },
            days * 24 + u32::from(hours),
            minutes,
            seconds
        )),
    }
}
