//! Row sources and the backend seams behind them.
//!
//! The sync pass only ever sees [`RowSource::list`]. How a procedure is
//! executed is the business of a [`CatalogConnection`], and how that
//! connection is opened is the business of a [`Connector`].

use crate::config::CatalogCredentials;
use crate::errors::{ConnectionError, SourceError};

/// One catalog row: `(uid, firstname, lastname, mail)`, each nullable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRow {
    pub uid: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub mail: Option<String>,
}

impl AccountRow {
    pub fn new(
        uid: Option<&str>,
        firstname: Option<&str>,
        lastname: Option<&str>,
        mail: Option<&str>,
    ) -> Self {
        Self {
            uid: uid.map(str::to_string),
            firstname: firstname.map(str::to_string),
            lastname: lastname.map(str::to_string),
            mail: mail.map(str::to_string),
        }
    }
}

/// Anything that can list account rows in a stable order.
pub trait RowSource {
    fn list(&self) -> Result<Vec<AccountRow>, SourceError>;
}

/// An open connection to a catalog backend.
pub trait CatalogConnection {
    /// Invoke a stored procedure and return every row it produced.
    fn call(&self, procedure: &str) -> Result<Vec<AccountRow>, SourceError>;
}

/// Opens connections to a catalog backend.
pub trait Connector {
    type Connection: CatalogConnection;

    fn connect(&self, credentials: &CatalogCredentials)
        -> Result<Self::Connection, ConnectionError>;
}

/// The employee account list, served by one procedure on a connection.
pub struct EmployeeSource<'a, C: ?Sized> {
    connection: &'a C,
    procedure: &'a str,
}

impl<'a, C: CatalogConnection + ?Sized> EmployeeSource<'a, C> {
    pub fn new(connection: &'a C, procedure: &'a str) -> Self {
        Self {
            connection,
            procedure,
        }
    }
}

impl<C: CatalogConnection + ?Sized> RowSource for EmployeeSource<'_, C> {
    fn list(&self) -> Result<Vec<AccountRow>, SourceError> {
        self.connection.call(self.procedure)
    }
}

/// The student account list, served by one procedure on a connection.
pub struct StudentSource<'a, C: ?Sized> {
    connection: &'a C,
    procedure: &'a str,
}

impl<'a, C: CatalogConnection + ?Sized> StudentSource<'a, C> {
    pub fn new(connection: &'a C, procedure: &'a str) -> Self {
        Self {
            connection,
            procedure,
        }
    }
}

impl<C: CatalogConnection + ?Sized> RowSource for StudentSource<'_, C> {
    fn list(&self) -> Result<Vec<AccountRow>, SourceError> {
        self.connection.call(self.procedure)
    }
}

/// A fixed list of rows, handy for tests and for feeding exported data back in.
impl RowSource for Vec<AccountRow> {
    fn list(&self) -> Result<Vec<AccountRow>, SourceError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingConnection {
        calls: RefCell<Vec<String>>,
    }

    impl CatalogConnection for RecordingConnection {
        fn call(&self, procedure: &str) -> Result<Vec<AccountRow>, SourceError> {
            self.calls.borrow_mut().push(procedure.to_string());
            Ok(vec![AccountRow::new(Some(procedure), None, None, None)])
        }
    }

    #[test]
    fn test_sources_call_their_procedure() {
        let conn = RecordingConnection {
            calls: RefCell::new(Vec::new()),
        };

        let employees = EmployeeSource::new(&conn, "hr.list").list().unwrap();
        let students = StudentSource::new(&conn, "campus.list").list().unwrap();

        assert_eq!(employees[0].uid.as_deref(), Some("hr.list"));
        assert_eq!(students[0].uid.as_deref(), Some("campus.list"));
        assert_eq!(*conn.calls.borrow(), vec!["hr.list", "campus.list"]);
    }

    #[test]
    fn test_source_through_trait_object() {
        let conn = RecordingConnection {
            calls: RefCell::new(Vec::new()),
        };
        let dyn_conn: &dyn CatalogConnection = &conn;
        let source: Box<dyn RowSource + '_> = Box::new(EmployeeSource::new(dyn_conn, "p"));
        assert_eq!(source.list().unwrap().len(), 1);
    }

    #[test]
    fn test_vec_row_source() {
        let rows = vec![
            AccountRow::new(Some("a"), None, None, None),
            AccountRow::default(),
        ];
        assert_eq!(rows.list().unwrap(), rows);
    }
}
