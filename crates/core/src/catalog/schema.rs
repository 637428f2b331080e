//! Catalog schema definitions and migration runner.
//!
//! Migrations are simple SQL strings applied in order. The SQLite
//! `user_version` pragma tracks which migrations have already been applied,
//! so a version of 0 means the file is not (yet) a catalog.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::CatalogError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "initial catalog schema",
        r#"
        CREATE TABLE IF NOT EXISTS catalog_users (
            username        TEXT PRIMARY KEY,
            password_hash   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS procedures (
            name    TEXT PRIMARY KEY,
            body    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS employees (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            uid         TEXT,
            firstname   TEXT,
            lastname    TEXT,
            mail        TEXT
        );

        CREATE TABLE IF NOT EXISTS students (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            uid         TEXT,
            firstname   TEXT,
            lastname    TEXT,
            mail        TEXT
        );
        "#,
    ),
    (
        2,
        "default account list procedures",
        r#"
        INSERT OR IGNORE INTO procedures (name, body) VALUES
            ('mitarbeiter_account_pkg.accountList',
             'SELECT uid, firstname, lastname, mail FROM employees ORDER BY seq'),
            ('student_account_pkg.accountList',
             'SELECT uid, firstname, lastname, mail FROM students ORDER BY seq');
        "#,
    ),
];

/// Schema version a fully migrated catalog reports.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.0).unwrap_or(0)
}

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), CatalogError> {
    let current_version = schema_version(conn)?;
    info!(
        current_version,
        target_version = latest_version(),
        "checking catalog migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| CatalogError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            conn.pragma_update(None, "user_version", version)?;
            debug!(version, "migration applied successfully");
        }
    }

    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
pub fn schema_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };

        for table in ["catalog_users", "procedures", "employees", "students"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_default_procedures_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let names: Vec<String> = {
            let mut stmt = conn.prepare("SELECT name FROM procedures ORDER BY name").unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert_eq!(
            names,
            vec![
                "mitarbeiter_account_pkg.accountList",
                "student_account_pkg.accountList"
            ]
        );
    }

    #[test]
    fn test_fresh_connection_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }
}
