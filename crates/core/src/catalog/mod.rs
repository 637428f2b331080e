//! SQLite-backed account catalog.
//!
//! The service identifier is the path of a catalog database. A catalog holds
//! the employee and student tables, a table of named "stored procedures"
//! (single SQL queries returning `uid, firstname, lastname, mail`), and the
//! users allowed to connect, with bcrypt password hashes.
//!
//! [`SqliteConnector`] opens catalogs read-only for a sync pass;
//! [`CatalogAdmin`] creates and edits them.

pub mod admin;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::CatalogCredentials;
use crate::errors::{ConnectionError, SourceError};
use crate::source::{AccountRow, CatalogConnection, Connector};

pub use admin::{CatalogAdmin, CatalogKind};

/// Number of columns every account list procedure must return.
const ROW_COLUMNS: usize = 4;

/// Opens read-only connections to SQLite catalogs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    type Connection = CatalogDatabase;

    fn connect(&self, credentials: &CatalogCredentials) -> Result<CatalogDatabase, ConnectionError> {
        let service = credentials.service.as_str();
        let path = Path::new(service);
        let offline = |detail: String| ConnectionError::Unreachable {
            service: service.to_string(),
            detail,
        };

        if !path.is_file() {
            return Err(offline("catalog database file does not exist".into()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| offline(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| offline(e.to_string()))?;

        let version = schema::schema_version(&conn).map_err(|e| ConnectionError::NotACatalog {
            service: service.to_string(),
            detail: e.to_string(),
        })?;
        if version == 0 {
            return Err(ConnectionError::NotACatalog {
                service: service.to_string(),
                detail: "catalog schema has not been initialized".into(),
            });
        }

        authenticate(&conn, credentials)?;

        info!(service, username = %credentials.username, version, "catalog connection established");
        Ok(CatalogDatabase {
            conn,
            service: service.to_string(),
        })
    }
}

/// Check the credentials against the `catalog_users` table.
fn authenticate(conn: &Connection, credentials: &CatalogCredentials) -> Result<(), ConnectionError> {
    let rejected = || ConnectionError::CredentialsRejected {
        username: credentials.username.clone(),
    };

    let hash: Option<String> = conn
        .query_row(
            "SELECT password_hash FROM catalog_users WHERE username = ?1",
            params![credentials.username],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| ConnectionError::NotACatalog {
            service: credentials.service.clone(),
            detail: e.to_string(),
        })?;

    let Some(hash) = hash else {
        debug!(username = %credentials.username, "unknown catalog user");
        return Err(rejected());
    };

    match bcrypt::verify(credentials.password.expose(), &hash) {
        Ok(true) => Ok(()),
        Ok(false) => {
            debug!(username = %credentials.username, "catalog password mismatch");
            Err(rejected())
        }
        Err(e) => {
            warn!(username = %credentials.username, error = %e, "stored password hash is unusable");
            Err(rejected())
        }
    }
}

/// An open, read-only catalog connection.
pub struct CatalogDatabase {
    conn: Connection,
    service: String,
}

impl CatalogDatabase {
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl std::fmt::Debug for CatalogDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogDatabase")
            .field("service", &self.service)
            .finish()
    }
}

impl CatalogConnection for CatalogDatabase {
    fn call(&self, procedure: &str) -> Result<Vec<AccountRow>, SourceError> {
        let failed = |e: rusqlite::Error| SourceError::ProcedureFailed {
            procedure: procedure.to_string(),
            detail: e.to_string(),
        };

        let body: String = self
            .conn
            .query_row(
                "SELECT body FROM procedures WHERE name = ?1",
                params![procedure],
                |row| row.get(0),
            )
            .optional()
            .map_err(failed)?
            .ok_or_else(|| SourceError::ProcedureNotFound(procedure.to_string()))?;

        debug!(procedure, "invoking catalog procedure");
        let mut stmt = self.conn.prepare(&body).map_err(failed)?;
        let columns = stmt.column_count();
        if columns != ROW_COLUMNS {
            return Err(SourceError::WrongColumnCount {
                procedure: procedure.to_string(),
                expected: ROW_COLUMNS,
                found: columns,
            });
        }
        let mut rows = stmt.query([]).map_err(failed)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(failed)? {
            let index = records.len() + 1;
            let field = |i: usize| {
                row.get::<_, Option<String>>(i)
                    .map_err(|e| SourceError::MalformedRow {
                        procedure: procedure.to_string(),
                        row: index,
                        detail: e.to_string(),
                    })
            };
            records.push(AccountRow {
                uid: field(0)?,
                firstname: field(1)?,
                lastname: field(2)?,
                mail: field(3)?,
            });
        }

        debug!(procedure, rows = records.len(), "catalog procedure returned");
        Ok(records)
    }
}
