//! Migration runner for the sample application.
//!
//! Run from this directory so `migrun.toml` and `migrations/` are found:
//!
//! ```text
//! cargo run --bin migrate                 # apply everything pending
//! cargo run --bin migrate -- 2025_03_09_001_test
//! cargo run --bin migrate -- rollback
//! cargo run --bin migrate -- rollback all
//! cargo run --bin migrate -- --status
//! ```

use migrun::{registry, Error, Registry};
use std::process::ExitCode;

#[path = "../migrations/2025_03_09_001_test.rs"]
mod test_migration;

#[path = "../migrations/2025_03_09_001_test2.rs"]
mod test_migration2;

/// Every migration file in `migrations/`, bound to its implementation.
fn migrations() -> Result<Registry, Error> {
    registry! {
        "2025_03_09_001_test" => test_migration::CreateTestMigration,
        "2025_03_09_001_test2" => test_migration2::CreateTestMigration2,
    }
}

fn main() -> ExitCode {
    match migrations() {
        Ok(registry) => migrun::cli::main(registry),
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
