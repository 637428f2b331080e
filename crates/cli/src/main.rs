//! idmsync command-line tool.
//!
//! Provides subcommands for running a catalog sync pass and printing the
//! resulting accounts or directory entries, generating / validating
//! configuration files, and maintaining SQLite account catalogs.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use idmsync_core::catalog::{CatalogAdmin, CatalogKind};
use idmsync_core::config::{
    AppConfig, CatalogCredentials, DirectoryConfig, Password, ProcedureConfig,
};
use idmsync_core::errors::ConfigError;
use idmsync_core::ldif::render_ldif;
use idmsync_core::{Account, AccountRow, CatalogSync, DirectoryEntry, SqliteConnector};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// idmsync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "idmsync",
    version,
    about = "Fetch employee and student accounts and project them onto directory entries"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "/etc/idmsync/config.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a sync pass and print the fetched accounts.
    Fetch {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Read credentials from IDM_USERNAME, IDM_PASSWORD and IDM_SID
        /// instead of the config file.
        #[arg(long)]
        from_env: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./idmsync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Maintain a SQLite account catalog.
    Catalog {
        /// Catalog database path (defaults to `catalog.service` from the config).
        #[arg(long, global = true)]
        path: Option<PathBuf>,

        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogAction {
    /// Create the catalog, or migrate an existing one.
    Init,

    /// Add a user allowed to connect (prompts for the password).
    AddUser {
        username: String,
    },

    /// Append an account row to the employee or student table.
    AddAccount {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        uid: Option<String>,
        #[arg(long)]
        firstname: Option<String>,
        #[arg(long)]
        lastname: Option<String>,
        #[arg(long)]
        mail: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Ldif,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Employee,
    Student,
}

impl From<KindArg> for CatalogKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Employee => CatalogKind::Employee,
            KindArg::Student => CatalogKind::Student,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    // --log-level, then the config file's [log] level, then warn.
    let level = cli.log_level.clone().or_else(|| {
        AppConfig::load_from_file(&cli.config)
            .ok()
            .map(|config| config.log.level)
    });
    let filter = level
        .as_deref()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Fetch { format, from_env } => cmd_fetch(&cli.config, format, from_env),
        Commands::Catalog { path, action } => {
            let path = match path {
                Some(path) => path,
                None => PathBuf::from(load_config(&cli.config)?.catalog.service),
            };
            cmd_catalog(&path, action)
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config =
        AppConfig::load_from_file(path).context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    Ok(config)
}

/// Load the config file if it exists. Only a missing file yields `None`.
fn optional_config(path: &Path) -> Result<Option<AppConfig>> {
    match AppConfig::load_from_file(path) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::FileNotFound(_)) => {
            debug!(path = %path.display(), "no config file, using default procedures and base DN");
            Ok(None)
        }
        Err(e) => Err(e).context("failed to load configuration file"),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# idmsync configuration

[log]
level = "info"

[catalog]
# Service identifier of the catalog backend (path of the SQLite catalog).
service = "/var/lib/idmsync/catalog.db"
username = "idm"
password_env = "IDM_PASSWORD"

[procedures]
employee = "mitarbeiter_account_pkg.accountList"
student = "student_account_pkg.accountList"

[directory]
base_dn = "ou=people,dc=example,dc=com"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your catalog details");
    println!("  2. Set the referenced environment variable (IDM_PASSWORD)");
    println!("  3. Validate with: idmsync validate --config {}", output.display());
    println!("  4. Run a sync pass: idmsync fetch --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  {}", style::success("Environment variable references processed"));

    match config.validate() {
        Ok(()) => println!("  {}", style::success("All required fields are valid")),
        Err(e) => {
            println!("  {}", style::error(&format!("Validation error: {}", e)));
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  Catalog service    : {}", config.catalog.service);
    println!("  Catalog user       : {}", config.catalog.username);
    println!(
        "  Catalog password   : {}",
        if config.catalog.password.is_some() {
            "set".to_string()
        } else {
            style::warn(&format!("NOT SET (${})", config.catalog.password_env))
        }
    );
    println!("  Employee procedure : {}", config.procedures.employee);
    println!("  Student procedure  : {}", config.procedures.student);
    println!("  Directory base DN  : {}", config.directory.base_dn);
    println!("  Log level          : {}", config.log.level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_fetch(config_path: &Path, format: OutputFormat, from_env: bool) -> Result<()> {
    let (credentials, procedures, base_dn) = if from_env {
        let credentials =
            CatalogCredentials::from_env().context("failed to read catalog credentials from environment")?;
        match optional_config(config_path)? {
            Some(config) => (credentials, config.procedures, config.directory.base_dn),
            None => (
                credentials,
                ProcedureConfig::default(),
                DirectoryConfig::default().base_dn,
            ),
        }
    } else {
        let config = load_config(config_path)?;
        config.validate().context("configuration validation failed")?;
        let credentials = config
            .credentials()
            .context("catalog credentials are incomplete")?;
        (credentials, config.procedures, config.directory.base_dn)
    };

    let mut sync = CatalogSync::new(SqliteConnector, credentials, procedures);
    let accounts = sync.fetch().context("catalog sync failed")?;

    match format {
        OutputFormat::Table => print_table(&accounts),
        OutputFormat::Json => {
            let entries: Vec<DirectoryEntry> =
                accounts.iter().map(Account::to_directory_entry).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("failed to serialize entries")?
            );
        }
        OutputFormat::Ldif => {
            let entries: Vec<DirectoryEntry> =
                accounts.iter().map(Account::to_directory_entry).collect();
            print!("{}", render_ldif(&entries, &base_dn));
        }
    }

    Ok(())
}

fn print_table(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("No accounts found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["UID", "DISPLAY NAME", "MAIL", "CHECKSUM"]);

    for account in accounts {
        table.add_row(vec![
            account.uid().unwrap_or("-").to_string(),
            account.displayname(),
            account.mail().unwrap_or("-").to_string(),
            account.checksum(),
        ]);
    }

    println!("{table}");
    println!();
    println!("{}", style::dim(&format!("{} account(s)", accounts.len())));
}

fn cmd_catalog(path: &Path, action: CatalogAction) -> Result<()> {
    let admin = CatalogAdmin::open(path).context("failed to open catalog database")?;
    admin.initialize().context("failed to initialize catalog schema")?;

    match action {
        CatalogAction::Init => {
            println!("{}", style::success(&format!("Catalog ready at {}", path.display())));
        }

        CatalogAction::AddUser { username } => {
            let password = dialoguer::Password::new()
                .with_prompt(format!("Password for '{}'", username))
                .with_confirmation("Confirm password", "Passwords do not match")
                .interact()
                .context("failed to read password")?;
            admin
                .add_user(&username, &Password::new(password))
                .context("failed to save catalog user")?;
            println!("{}", style::success(&format!("User '{}' saved", username)));
        }

        CatalogAction::AddAccount {
            kind,
            uid,
            firstname,
            lastname,
            mail,
        } => {
            let kind = CatalogKind::from(kind);
            let row = AccountRow {
                uid,
                firstname,
                lastname,
                mail,
            };
            admin
                .insert_account(kind, &row)
                .context("failed to insert catalog row")?;
            let total = admin.count(kind).context("failed to count catalog rows")?;
            println!(
                "{}",
                style::success(&format!("Added {} account ({} total)", kind, total))
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_fetch() {
        let cli = Cli::try_parse_from(["idmsync", "fetch", "--format", "ldif", "--from-env"]).unwrap();
        match cli.command {
            Commands::Fetch { format, from_env } => {
                assert_eq!(format, OutputFormat::Ldif);
                assert!(from_env);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("/etc/idmsync/config.toml"));
    }

    #[test]
    fn test_cli_parses_add_account() {
        let cli = Cli::try_parse_from([
            "idmsync",
            "catalog",
            "--path",
            "/tmp/c.db",
            "add-account",
            "--kind",
            "student",
            "--uid",
            "s1",
        ])
        .unwrap();
        match cli.command {
            Commands::Catalog { path, action } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/c.db")));
                match action {
                    CatalogAction::AddAccount { kind, uid, mail, .. } => {
                        assert_eq!(CatalogKind::from(kind), CatalogKind::Student);
                        assert_eq!(uid.as_deref(), Some("s1"));
                        assert!(mail.is_none());
                    }
                    other => panic!("unexpected action: {other:?}"),
                }
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_optional_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = optional_config(&dir.path().join("absent.toml")).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_optional_config_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[catalog").unwrap();

        let err = optional_config(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_optional_config_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idmsync.toml");
        std::fs::write(
            &path,
            "[catalog]\nservice = \"/tmp/c.db\"\nusername = \"idm\"\n\n[directory]\nbase_dn = \"ou=people,dc=uni\"\n",
        )
        .unwrap();

        let config = optional_config(&path).unwrap().unwrap();
        assert_eq!(config.directory.base_dn, "ou=people,dc=uni");
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
