//! idmsync core library.
//!
//! This crate fetches the employee and student account catalogs, normalizes
//! each row into an [`Account`], and derives the integrity checksum and the
//! `inetOrgPerson` directory projection for every account: configuration,
//! the row-source seams, a SQLite catalog backend, the sync pass, and LDIF
//! rendering.

pub mod account;
pub mod catalog;
pub mod catalog_sync;
pub mod config;
pub mod errors;
pub mod ldif;
pub mod source;

// Re-exports for convenience.
pub use account::{Account, DirectoryEntry};
pub use catalog::SqliteConnector;
pub use catalog_sync::CatalogSync;
pub use config::{AppConfig, CatalogCredentials, Password};
pub use source::{AccountRow, RowSource};
