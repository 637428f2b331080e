//! Error types for the idmsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`.
//! [`SyncError`] combines the connection and source errors a sync pass can
//! hit.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Connection errors
// ---------------------------------------------------------------------------

/// Errors raised while opening a connection to the catalog backend.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The backend behind the service identifier could not be reached.
    #[error("catalog service '{service}' is unreachable: {detail}")]
    Unreachable {
        service: String,
        detail: String,
    },

    /// The backend rejected the supplied username / password.
    #[error("catalog rejected credentials for user '{username}'")]
    CredentialsRejected {
        username: String,
    },

    /// The backend is reachable but does not expose a catalog schema.
    #[error("service '{service}' is not an account catalog: {detail}")]
    NotACatalog {
        service: String,
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Row source errors
// ---------------------------------------------------------------------------

/// Errors from invoking a row-source procedure.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No procedure with this name is registered in the catalog.
    #[error("catalog procedure not found: {0}")]
    ProcedureNotFound(String),

    /// The procedure exists but its execution failed.
    #[error("catalog procedure '{procedure}' failed: {detail}")]
    ProcedureFailed {
        procedure: String,
        detail: String,
    },

    /// The procedure's result set does not have the four account columns.
    #[error("catalog procedure '{procedure}' returns {found} columns, expected {expected}")]
    WrongColumnCount {
        procedure: String,
        expected: usize,
        found: usize,
    },

    /// The procedure returned a row that is not a (uid, firstname, lastname, mail) tuple.
    #[error("catalog procedure '{procedure}' returned a malformed row {row}: {detail}")]
    MalformedRow {
        procedure: String,
        row: usize,
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from a catalog sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Could not connect to the catalog backend.
    #[error("sync connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A row source failed.
    #[error("sync source error: {0}")]
    Source(#[from] SourceError),
}

// ---------------------------------------------------------------------------
// Catalog administration errors
// ---------------------------------------------------------------------------

/// Errors from creating or editing a SQLite catalog database.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying rusqlite error.
    #[error("catalog database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("catalog migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(#[from] bcrypt::BcryptError),

    /// A value supplied to an admin operation is invalid.
    #[error("invalid catalog value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ConnectionError::CredentialsRejected {
            username: "idm".into(),
        };
        assert_eq!(err.to_string(), "catalog rejected credentials for user 'idm'");

        let err = SourceError::ProcedureNotFound("student_account_pkg.accountList".into());
        assert_eq!(
            err.to_string(),
            "catalog procedure not found: student_account_pkg.accountList"
        );

        let err = ConfigError::EnvVarMissing {
            var: "IDM_PASSWORD".into(),
            field: "catalog.password_env".into(),
        };
        assert!(err.to_string().contains("IDM_PASSWORD"));

        let err = SourceError::MalformedRow {
            procedure: "p".into(),
            row: 3,
            detail: "expected 4 columns, got 2".into(),
        };
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn test_sync_error_from_source() {
        let sync_err: SyncError = SourceError::ProcedureNotFound("x".into()).into();
        assert!(matches!(sync_err, SyncError::Source(_)));
        assert!(sync_err.to_string().contains("x"));
    }
}
