//! Convenience macros for defining and registering migrations.

/// Define a simple SQL-only migration.
///
/// This macro reduces boilerplate for migrations that consist only of fixed
/// statements run one after another through the [`Executor`](crate::Executor).
///
/// # Basic Usage
///
/// ```
/// use migrun::sql_migration;
///
/// sql_migration!(CreateUsersTable,
///     apply: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
///     revert: "DROP TABLE users"
/// );
/// ```
///
/// This expands to a unit struct `CreateUsersTable` implementing
/// [`MigrationUnit`](crate::MigrationUnit) and `Default`, ready for
/// [`Registry::register`](crate::Registry::register).
///
/// # Multiple Statements
///
/// ```
/// use migrun::sql_migration;
///
/// sql_migration!(InitialSchema,
///     description: "Create users and posts",
///     apply: [
///         "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
///         "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
///         "CREATE INDEX idx_posts_user ON posts(user_id)"
///     ],
///     revert: [
///         "DROP INDEX idx_posts_user",
///         "DROP TABLE posts",
///         "DROP TABLE users"
///     ]
/// );
/// ```
///
/// A list on one side and a single statement on the other also works:
///
/// ```
/// use migrun::sql_migration;
///
/// sql_migration!(SeedSettings,
///     apply: [
///         "CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT)",
///         "INSERT INTO settings (key, value) VALUES ('theme', 'dark')"
///     ],
///     revert: "DROP TABLE settings"
/// );
/// ```
///
/// For migrations that need to read data and transform it in Rust, implement
/// [`MigrationUnit`](crate::MigrationUnit) directly instead.
#[macro_export]
macro_rules! sql_migration {
    ($name:ident, description: $description:expr, apply: $($rest:tt)*) => {
        $crate::__sql_migration_impl!(@apply $name, Some($description), $($rest)*);
    };

    ($name:ident, apply: $($rest:tt)*) => {
        $crate::__sql_migration_impl!(@apply $name, None, $($rest)*);
    };
}

/// Internal implementation macro for [`sql_migration!`].
///
/// Each side may be a single statement or a bracketed list; both are
/// normalized to a list before the unit is emitted.
#[macro_export]
#[doc(hidden)]
macro_rules! __sql_migration_impl {
    (@apply $name:ident, $description:expr, [$($apply_sql:expr),* $(,)?], revert: $($rest:tt)*) => {
        $crate::__sql_migration_impl!(@revert $name, $description, [$($apply_sql),*], $($rest)*);
    };

    (@apply $name:ident, $description:expr, $apply_sql:expr, revert: $($rest:tt)*) => {
        $crate::__sql_migration_impl!(@revert $name, $description, [$apply_sql], $($rest)*);
    };

    (@revert $name:ident, $description:expr, [$($apply_sql:expr),*], [$($revert_sql:expr),* $(,)?] $(,)?) => {
        $crate::__sql_migration_impl!(@emit $name, $description,
            apply: [$($apply_sql),*],
            revert: [$($revert_sql),*]
        );
    };

    (@revert $name:ident, $description:expr, [$($apply_sql:expr),*], $revert_sql:expr $(,)?) => {
        $crate::__sql_migration_impl!(@emit $name, $description,
            apply: [$($apply_sql),*],
            revert: [$revert_sql]
        );
    };

    (@emit $name:ident, $description:expr,
        apply: [$($apply_sql:expr),*],
        revert: [$($revert_sql:expr),*]
    ) => {
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl $crate::MigrationUnit for $name {
            fn apply(&self, executor: &mut dyn $crate::Executor) -> Result<(), $crate::Error> {
                $(executor.execute($apply_sql, &[])?;)*
                Ok(())
            }

            fn revert(&self, executor: &mut dyn $crate::Executor) -> Result<(), $crate::Error> {
                $(executor.execute($revert_sql, &[])?;)*
                Ok(())
            }

            fn description(&self) -> Option<&'static str> {
                $description
            }
        }
    };
}

/// Build a [`Registry`](crate::Registry) from `identifier => Type` pairs.
///
/// Evaluates to `Result<Registry, Error>`, failing if an identifier repeats.
///
/// ```
/// use migrun::{registry, sql_migration};
///
/// sql_migration!(CreateUsers, apply: "CREATE TABLE users (id INTEGER PRIMARY KEY)", revert: "DROP TABLE users");
/// sql_migration!(CreatePosts, apply: "CREATE TABLE posts (id INTEGER PRIMARY KEY)", revert: "DROP TABLE posts");
///
/// let registry = registry! {
///     "2025_03_09_001_create_users" => CreateUsers,
///     "2025_03_09_002_create_posts" => CreatePosts,
/// }
/// .unwrap();
/// assert_eq!(registry.len(), 2);
/// ```
#[macro_export]
macro_rules! registry {
    ($($identifier:expr => $unit:ty),* $(,)?) => {
        (|| -> Result<$crate::Registry, $crate::Error> {
            #[allow(unused_mut)]
            let mut registry = $crate::Registry::new();
            $(registry.register::<$unit>($identifier)?;)*
            Ok(registry)
        })()
    };
}

#[cfg(test)]
mod tests {
    use crate::{Error, MigrationUnit};

    #[test]
    fn test_macro_compiles_single_statement() {
        sql_migration!(TestMigration1,
            apply: "CREATE TABLE test (id INTEGER PRIMARY KEY)",
            revert: "DROP TABLE test"
        );

        assert_eq!(TestMigration1.description(), None);
    }

    #[test]
    fn test_macro_compiles_with_description() {
        sql_migration!(TestMigration2,
            description: "Multi-statement",
            apply: [
                "CREATE TABLE a (id INTEGER PRIMARY KEY)",
                "CREATE TABLE b (id INTEGER PRIMARY KEY)",
            ],
            revert: [
                "DROP TABLE b",
                "DROP TABLE a",
            ]
        );

        assert_eq!(TestMigration2.description(), Some("Multi-statement"));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        sql_migration!(First, apply: "SELECT 1", revert: "SELECT 1");
        sql_migration!(Second, apply: "SELECT 2", revert: "SELECT 2");

        let result = registry! {
            "2025_01_01_a" => First,
            "2025_01_01_a" => Second,
        };
        assert!(matches!(
            result,
            Err(Error::DuplicateRegistration(id)) if id == "2025_01_01_a"
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_macro_sqlite_runtime() {
        use crate::testing::MigrationDir;
        use crate::{Migrator, RollbackScope, UnitLoader};
        use rusqlite::Connection;

        sql_migration!(CreateUsers,
            apply: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
            revert: "DROP TABLE users"
        );

        sql_migration!(CreatePosts,
            apply: [
                "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
                "CREATE INDEX idx_posts_user ON posts(user_id)"
            ],
            revert: [
                "DROP INDEX idx_posts_user",
                "DROP TABLE posts"
            ]
        );

        let dir = MigrationDir::with_units(&["2025_01_01_users", "2025_01_02_posts"]);
        let registry = registry! {
            "2025_01_01_users" => CreateUsers,
            "2025_01_02_posts" => CreatePosts,
        }
        .unwrap();
        let migrator = Migrator::new(UnitLoader::new(dir.path(), registry));
        let mut conn = Connection::open_in_memory().unwrap();

        // Run migrations
        let report = migrator.apply_all(&mut conn).unwrap();
        assert_eq!(report.applied, vec!["2025_01_01_users", "2025_01_02_posts"]);

        // Verify index exists
        let index_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_posts_user'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);

        // Test rollback
        let report = migrator.rollback(&mut conn, RollbackScope::All).unwrap();
        assert_eq!(report.reverted, vec!["2025_01_02_posts", "2025_01_01_users"]);

        // Verify tables are gone
        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('users', 'posts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 0);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_macro_sqlite_mixed_forms() {
        use rusqlite::Connection;

        sql_migration!(SeedWithDescription,
            description: "Table plus seed row",
            apply: [
                "CREATE TABLE seeded (id INTEGER PRIMARY KEY, note TEXT NOT NULL)",
                "INSERT INTO seeded (note) VALUES ('first')",
            ],
            revert: "DROP TABLE seeded",
        );

        sql_migration!(SeedPlain,
            apply: [
                "CREATE TABLE plain (id INTEGER PRIMARY KEY)",
                "INSERT INTO plain (id) VALUES (7)"
            ],
            revert: "DROP TABLE plain"
        );

        sql_migration!(IndexWithDescription,
            description: "Single create, listed drops",
            apply: "CREATE TABLE indexed (id INTEGER PRIMARY KEY, name TEXT)",
            revert: ["DROP TABLE indexed", "DROP TABLE IF EXISTS indexed_archive"],
        );

        sql_migration!(IndexPlain,
            apply: "CREATE INDEX idx_indexed_name ON indexed(name)",
            revert: [
                "DROP INDEX idx_indexed_name",
            ]
        );

        let count = |conn: &Connection, sql: &str| -> i64 {
            conn.query_row(sql, [], |row| row.get(0)).unwrap()
        };
        let tables = "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('seeded', 'plain', 'indexed')";

        let mut conn = Connection::open_in_memory().unwrap();
        SeedWithDescription.apply(&mut conn).unwrap();
        SeedPlain.apply(&mut conn).unwrap();
        IndexWithDescription.apply(&mut conn).unwrap();
        IndexPlain.apply(&mut conn).unwrap();

        assert_eq!(SeedWithDescription.description(), Some("Table plus seed row"));
        assert_eq!(SeedPlain.description(), None);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM seeded WHERE note = 'first'"), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM plain WHERE id = 7"), 1);
        assert_eq!(count(&conn, tables), 3);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_indexed_name'"),
            1
        );

        IndexPlain.revert(&mut conn).unwrap();
        IndexWithDescription.revert(&mut conn).unwrap();
        SeedPlain.revert(&mut conn).unwrap();
        SeedWithDescription.revert(&mut conn).unwrap();
        assert_eq!(count(&conn, tables), 0);
    }
}
