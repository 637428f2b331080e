//! Creating and editing catalog databases.

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::schema;
use crate::config::Password;
use crate::errors::CatalogError;
use crate::source::AccountRow;

/// Which account table a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Employee,
    Student,
}

impl CatalogKind {
    fn table(self) -> &'static str {
        match self {
            Self::Employee => "employees",
            Self::Student => "students",
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Employee => write!(f, "employee"),
            Self::Student => write!(f, "student"),
        }
    }
}

/// Read-write handle on a catalog database.
pub struct CatalogAdmin {
    conn: Connection,
    hash_cost: u32,
}

impl CatalogAdmin {
    /// Open (or create) a catalog database at `path`.
    ///
    /// The schema is not touched until [`initialize`](Self::initialize).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening catalog database");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        Ok(Self {
            conn,
            hash_cost: bcrypt::DEFAULT_COST,
        })
    }

    /// Override the bcrypt cost used by [`add_user`](Self::add_user).
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Run all schema migrations to bring the catalog up to date.
    pub fn initialize(&self) -> Result<(), CatalogError> {
        info!("initializing catalog schema");
        schema::run_migrations(&self.conn)?;
        debug!("catalog schema is up to date");
        Ok(())
    }

    /// Add a user allowed to connect, or replace its password.
    pub fn add_user(&self, username: &str, password: &Password) -> Result<(), CatalogError> {
        if username.is_empty() {
            return Err(CatalogError::InvalidValue {
                field: "username".into(),
                detail: "username must not be empty".into(),
            });
        }
        let hash = bcrypt::hash(password.expose(), self.hash_cost)?;
        self.conn.execute(
            "INSERT INTO catalog_users (username, password_hash) VALUES (?1, ?2)
             ON CONFLICT(username) DO UPDATE SET password_hash = excluded.password_hash",
            params![username, hash],
        )?;
        info!(username, "catalog user saved");
        Ok(())
    }

    /// Register a procedure, replacing any existing body with the same name.
    pub fn define_procedure(&self, name: &str, body: &str) -> Result<(), CatalogError> {
        if name.is_empty() {
            return Err(CatalogError::InvalidValue {
                field: "name".into(),
                detail: "procedure name must not be empty".into(),
            });
        }
        self.conn.execute(
            "INSERT INTO procedures (name, body) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET body = excluded.body",
            params![name, body],
        )?;
        debug!(name, "catalog procedure defined");
        Ok(())
    }

    /// Append one row to the employee or student table.
    pub fn insert_account(&self, kind: CatalogKind, row: &AccountRow) -> Result<i64, CatalogError> {
        insert_row(&self.conn, kind, row)
    }

    /// Append many rows in a single transaction, in order.
    pub fn insert_accounts(
        &mut self,
        kind: CatalogKind,
        rows: &[AccountRow],
    ) -> Result<usize, CatalogError> {
        let tx = self.conn.transaction()?;
        for row in rows {
            insert_row(&tx, kind, row)?;
        }
        tx.commit()?;
        info!(%kind, count = rows.len(), "catalog rows inserted");
        Ok(rows.len())
    }

    /// Number of rows in the employee or student table.
    pub fn count(&self, kind: CatalogKind) -> Result<usize, CatalogError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn insert_row(conn: &Connection, kind: CatalogKind, row: &AccountRow) -> Result<i64, CatalogError> {
    let sql = format!(
        "INSERT INTO {} (uid, firstname, lastname, mail) VALUES (?1, ?2, ?3, ?4)",
        kind.table()
    );
    conn.execute(&sql, params![row.uid, row.firstname, row.lastname, row.mail])?;
    let id = conn.last_insert_rowid();
    debug!(%kind, id, uid = ?row.uid, "inserted catalog row");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(dir: &Path) -> CatalogAdmin {
        let admin = CatalogAdmin::open(dir.join("catalog.db"))
            .unwrap()
            .with_hash_cost(4);
        admin.initialize().unwrap();
        admin
    }

    #[test]
    fn test_initialize_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        admin(dir.path());
        assert!(dir.path().join("catalog.db").exists());
    }

    #[test]
    fn test_add_user_hashes_password() {
        let dir = tempfile::tempdir().unwrap();
        let admin = admin(dir.path());
        admin.add_user("idm", &Password::new("s3cret")).unwrap();

        let hash: String = admin
            .conn
            .query_row(
                "SELECT password_hash FROM catalog_users WHERE username = 'idm'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(hash, "s3cret");
        assert!(bcrypt::verify("s3cret", &hash).unwrap());
    }

    #[test]
    fn test_add_user_replaces_password() {
        let dir = tempfile::tempdir().unwrap();
        let admin = admin(dir.path());
        admin.add_user("idm", &Password::new("old")).unwrap();
        admin.add_user("idm", &Password::new("new")).unwrap();

        let hashes: Vec<String> = {
            let mut stmt = admin.conn.prepare("SELECT password_hash FROM catalog_users").unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert_eq!(hashes.len(), 1);
        assert!(bcrypt::verify("new", &hashes[0]).unwrap());
    }

    #[test]
    fn test_add_user_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let admin = admin(dir.path());
        let result = admin.add_user("", &Password::new("x"));
        assert!(matches!(result, Err(CatalogError::InvalidValue { .. })));
    }

    #[test]
    fn test_insert_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut admin = admin(dir.path());

        admin
            .insert_account(CatalogKind::Employee, &AccountRow::new(Some("e1"), None, None, None))
            .unwrap();
        let inserted = admin
            .insert_accounts(
                CatalogKind::Student,
                &[AccountRow::default(), AccountRow::new(Some("s2"), None, None, None)],
            )
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(admin.count(CatalogKind::Employee).unwrap(), 1);
        assert_eq!(admin.count(CatalogKind::Student).unwrap(), 2);
    }

    #[test]
    fn test_define_procedure_replaces_body() {
        let dir = tempfile::tempdir().unwrap();
        let admin = admin(dir.path());
        admin
            .define_procedure("student_account_pkg.accountList", "SELECT 1, 2, 3, 4")
            .unwrap();

        let body: String = admin
            .conn
            .query_row(
                "SELECT body FROM procedures WHERE name = 'student_account_pkg.accountList'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(body, "SELECT 1, 2, 3, 4");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CatalogKind::Employee.to_string(), "employee");
        assert_eq!(CatalogKind::Student.to_string(), "student");
    }
}
