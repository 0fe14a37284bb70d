migrun::sql_migration!(CreateTestMigration2,
    description: "Create the test_migration2 table with one entry",
    apply: [
        "CREATE TABLE IF NOT EXISTS test_migration2 (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
        "INSERT INTO test_migration2 (description) VALUES ('Test migration entry')",
    ],
    revert: "DROP TABLE IF EXISTS test_migration2"
);
