//! Catalog sync pass: employees, then students.
//!
//! [`CatalogSync`] owns a [`Connector`], the credentials to hand it, and at
//! most one open connection. Every fetch connects on demand and then reuses
//! that connection for the lifetime of the value:
//!
//! 1. Connect (once).
//! 2. List the employee procedure and map each row to an [`Account`].
//! 3. List the student procedure and map each row to an [`Account`].
//! 4. Return employees followed by students, each in row order.
//!
//! Nothing is retried or swallowed. A failure anywhere fails the whole pass.

use tracing::{debug, info};

use crate::account::Account;
use crate::config::{CatalogCredentials, ProcedureConfig};
use crate::errors::{ConnectionError, SourceError, SyncError};
use crate::source::{Connector, EmployeeSource, RowSource, StudentSource};

/// Connection lifecycle of a [`CatalogSync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Fetches the employee and student catalogs as [`Account`]s.
pub struct CatalogSync<C: Connector> {
    connector: C,
    credentials: CatalogCredentials,
    procedures: ProcedureConfig,
    connection: Option<C::Connection>,
}

impl<C: Connector> CatalogSync<C> {
    /// Create a sync in the disconnected state.
    pub fn new(connector: C, credentials: CatalogCredentials, procedures: ProcedureConfig) -> Self {
        info!(
            service = %credentials.service,
            username = %credentials.username,
            employee_procedure = %procedures.employee,
            student_procedure = %procedures.student,
            "initializing catalog sync"
        );
        Self {
            connector,
            credentials,
            procedures,
            connection: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.connection.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Open the catalog connection, or return the one already open.
    pub fn connect(&mut self) -> Result<&C::Connection, ConnectionError> {
        let connection = match self.connection.take() {
            Some(connection) => {
                debug!(service = %self.credentials.service, "reusing catalog connection");
                connection
            }
            None => {
                info!(service = %self.credentials.service, "connecting to catalog");
                self.connector.connect(&self.credentials)?
            }
        };
        Ok(&*self.connection.insert(connection))
    }

    /// Fetch the employee catalog.
    pub fn fetch_employee(&mut self) -> Result<Vec<Account>, SyncError> {
        let procedure = self.procedures.employee.clone();
        let connection = self.connect()?;
        let accounts = accounts_from(&EmployeeSource::new(connection, &procedure))?;
        info!(procedure = %procedure, count = accounts.len(), "fetched employee accounts");
        Ok(accounts)
    }

    /// Fetch the student catalog.
    pub fn fetch_students(&mut self) -> Result<Vec<Account>, SyncError> {
        let procedure = self.procedures.student.clone();
        let connection = self.connect()?;
        let accounts = accounts_from(&StudentSource::new(connection, &procedure))?;
        info!(procedure = %procedure, count = accounts.len(), "fetched student accounts");
        Ok(accounts)
    }

    /// Fetch both catalogs: all employees first, then all students.
    pub fn fetch(&mut self) -> Result<Vec<Account>, SyncError> {
        let mut accounts = self.fetch_employee()?;
        let employees = accounts.len();
        accounts.extend(self.fetch_students()?);
        info!(
            employees,
            students = accounts.len() - employees,
            total = accounts.len(),
            "catalog sync pass complete"
        );
        Ok(accounts)
    }
}

/// Map every row of a source to an [`Account`], preserving order.
pub fn accounts_from<S: RowSource + ?Sized>(source: &S) -> Result<Vec<Account>, SourceError> {
    let rows = source.list()?;
    debug!(rows = rows.len(), "mapping catalog rows to accounts");
    Ok(rows.into_iter().map(Account::from).collect())
}
