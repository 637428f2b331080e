//! TOML-based configuration for idmsync.
//!
//! The catalog password is never stored in the file. The `[catalog]` section
//! names an environment variable through `password_env`, and the value is
//! resolved at runtime via [`AppConfig::resolve_env_vars`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Environment variable holding the catalog username (legacy contract).
pub const ENV_USERNAME: &str = "IDM_USERNAME";
/// Environment variable holding the catalog password.
pub const ENV_PASSWORD: &str = "IDM_PASSWORD";
/// Environment variable holding the catalog service identifier.
pub const ENV_SERVICE: &str = "IDM_SID";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Catalog backend connection settings.
    pub catalog: CatalogConfig,

    /// Names of the row-source procedures.
    #[serde(default)]
    pub procedures: ProcedureConfig,

    /// Directory projection settings.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Catalog backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Service / instance identifier of the catalog backend.
    pub service: String,

    /// Username for authentication.
    pub username: String,

    /// Environment variable holding the catalog password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<Password>,
}

fn default_password_env() -> String {
    ENV_PASSWORD.into()
}

// ---------------------------------------------------------------------------
// Procedures
// ---------------------------------------------------------------------------

/// Stored procedures backing the two row sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureConfig {
    /// Procedure returning the employee account list.
    #[serde(default = "default_employee_procedure")]
    pub employee: String,

    /// Procedure returning the student account list.
    #[serde(default = "default_student_procedure")]
    pub student: String,
}

fn default_employee_procedure() -> String {
    "mitarbeiter_account_pkg.accountList".into()
}
fn default_student_procedure() -> String {
    "student_account_pkg.accountList".into()
}

impl Default for ProcedureConfig {
    fn default() -> Self {
        Self {
            employee: default_employee_procedure(),
            student: default_student_procedure(),
        }
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base DN under which entries are rendered in LDIF output.
    #[serde(default = "default_base_dn")]
    pub base_dn: String,
}

fn default_base_dn() -> String {
    "dc=example,dc=com".into()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_dn: default_base_dn(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A password that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext password. Only pass this to the backend.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Everything needed to open a catalog connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCredentials {
    pub username: String,
    pub password: Password,
    pub service: String,
}

impl CatalogCredentials {
    pub fn new(
        username: impl Into<String>,
        password: Password,
        service: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            service: service.into(),
        }
    }

    /// Read credentials from `IDM_USERNAME`, `IDM_PASSWORD` and `IDM_SID`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let username = require_env(ENV_USERNAME, "catalog.username")?;
        let password = require_env(ENV_PASSWORD, "catalog.password")?;
        let service = require_env(ENV_SERVICE, "catalog.service")?;
        debug!(username = %username, service = %service, "catalog credentials read from environment");
        Ok(Self::new(username, Password::new(password), service))
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `catalog.password_env` into `catalog.password`.
    ///
    /// A missing variable only logs a warning here; [`credentials`](Self::credentials)
    /// is where the password becomes mandatory.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        self.catalog.password =
            resolve_optional_env(&self.catalog.password_env, "catalog.password_env")
                .map(Password::new);
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.service.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "catalog.service".into(),
                detail: "catalog service identifier must not be empty".into(),
            });
        }
        if self.catalog.username.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "catalog.username".into(),
                detail: "catalog username must not be empty".into(),
            });
        }
        if self.catalog.password_env.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "catalog.password_env".into(),
                detail: "password environment variable name must not be empty".into(),
            });
        }
        if self.procedures.employee.is_empty() || self.procedures.student.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "procedures".into(),
                detail: "procedure names must not be empty".into(),
            });
        }
        if self.procedures.employee == self.procedures.student {
            warn!(
                procedure = %self.procedures.employee,
                "employee and student procedures are identical; accounts will be fetched twice"
            );
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Build connection credentials from the resolved catalog section.
    pub fn credentials(&self) -> Result<CatalogCredentials, ConfigError> {
        let password = self
            .catalog
            .password
            .clone()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.catalog.password_env.clone(),
                field: "catalog.password_env".into(),
            })?;
        Ok(CatalogCredentials::new(
            self.catalog.username.clone(),
            password,
            self.catalog.service.clone(),
        ))
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

fn require_env(env_name: &str, field: &str) -> Result<String, ConfigError> {
    resolve_optional_env(env_name, field).ok_or_else(|| ConfigError::EnvVarMissing {
        var: env_name.into(),
        field: field.into(),
    })
}
