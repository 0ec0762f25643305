//! Configuration catalogue and the typed settings handed to step actions.
//!
//! Questions are resolved in a fixed order through [`PromptSource`]; later
//! questions depend on earlier answers (the database choice decides which
//! database questions exist). Once resolved, the flat entries are parsed into
//! [`AppSettings`], which is all an action ever sees.
use crate::error::ProvisionError;
use crate::prompt::{PromptSource, Question};
use crate::session::{parse_yes_no, ConfigStore};
use anyhow::Result;
use regex::Regex;
use std::path::PathBuf;

pub mod keys {
    pub const APP_NAME: &str = "app_name";
    pub const REPO_URL: &str = "repo_url";
    pub const REPO_BRANCH: &str = "repo_branch";
    pub const GITHUB_TOKEN: &str = "github_token";
    pub const INSTALL_ROOT: &str = "install_root";
    pub const APP_PORT: &str = "app_port";
    pub const NODE_MAJOR: &str = "node_major";
    pub const DB_CHOICE: &str = "db_choice";
    pub const POCKETBASE_VERSION: &str = "pocketbase_version";
    pub const POCKETBASE_PORT: &str = "pocketbase_port";
    pub const DB_NAME: &str = "db_name";
    pub const DB_USER: &str = "db_user";
    pub const DB_PASSWORD: &str = "db_password";
    pub const ENABLE_CI: &str = "enable_ci";
}

pub const DEFAULT_POCKETBASE_VERSION: &str = "0.22.21";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Database {
    PocketBase { version: String, port: u16 },
    Postgres {
        name: String,
        user: String,
        password: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub app_name: String,
    pub repo_url: String,
    pub repo_branch: String,
    pub github_token: Option<String>,
    pub install_root: PathBuf,
    pub app_port: u16,
    pub node_major: u32,
    pub database: Database,
    pub enable_ci: bool,
}

impl AppSettings {
    /// Checkout directory for the application.
    pub fn app_dir(&self) -> PathBuf {
        self.install_root.join(&self.app_name)
    }

    /// PocketBase lives beside the checkout so the clone target stays empty.
    pub fn pocketbase_dir(&self) -> PathBuf {
        self.install_root.join(format!("{}-pocketbase", self.app_name))
    }

    pub fn uses_postgres(&self) -> bool {
        matches!(self.database, Database::Postgres { .. })
    }

    pub fn uses_pocketbase(&self) -> bool {
        matches!(self.database, Database::PocketBase { .. })
    }

    /// Parse resolved entries. A key the catalogue should already have
    /// resolved but did not is an ordering defect.
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let database = match required(store, keys::DB_CHOICE)? {
            "1" => Database::PocketBase {
                version: required(store, keys::POCKETBASE_VERSION)?.to_string(),
                port: parse_port(
                    keys::POCKETBASE_PORT,
                    required(store, keys::POCKETBASE_PORT)?,
                )?,
            },
            "2" => Database::Postgres {
                name: required(store, keys::DB_NAME)?.to_string(),
                user: required(store, keys::DB_USER)?.to_string(),
                password: required(store, keys::DB_PASSWORD)?.to_string(),
            },
            other => {
                return Err(invalid(
                    keys::DB_CHOICE,
                    format!("expected 1 or 2 (got {other:?})"),
                ));
            }
        };
        let node_major = required(store, keys::NODE_MAJOR)?;
        let node_major = node_major.parse::<u32>().map_err(|_| {
            invalid(
                keys::NODE_MAJOR,
                format!("expected a major version (got {node_major:?})"),
            )
        })?;
        let enable_ci = required(store, keys::ENABLE_CI)?;
        let enable_ci = parse_yes_no(enable_ci, false).ok_or_else(|| {
            invalid(
                keys::ENABLE_CI,
                format!("expected y or n (got {enable_ci:?})"),
            )
        })?;
        let github_token = required(store, keys::GITHUB_TOKEN)?;

        Ok(Self {
            app_name: required(store, keys::APP_NAME)?.to_string(),
            repo_url: required(store, keys::REPO_URL)?.to_string(),
            repo_branch: required(store, keys::REPO_BRANCH)?.to_string(),
            github_token: (!github_token.is_empty()).then(|| github_token.to_string()),
            install_root: PathBuf::from(required(store, keys::INSTALL_ROOT)?),
            app_port: parse_port(keys::APP_PORT, required(store, keys::APP_PORT)?)?,
            node_major,
            database,
            enable_ci,
        })
    }
}

/// Resolve every catalogue question, then parse the typed settings.
pub fn collect(prompts: &mut PromptSource<'_>) -> Result<AppSettings> {
    let app_name = prompts.resolve_checked(
        &Question::new(
            keys::APP_NAME,
            "Application name (lowercase, used for paths and process names)",
        ),
        check_app_name,
    )?;
    prompts.resolve(&Question::new(keys::REPO_URL, "Git repository URL (https)"))?;
    prompts.resolve(&Question::new(keys::REPO_BRANCH, "Branch to deploy").with_default("main"))?;
    prompts.resolve(
        &Question::new(
            keys::GITHUB_TOKEN,
            "GitHub access token (empty for a public repository)",
        )
        .secret()
        .optional(),
    )?;
    prompts.resolve(&Question::new(keys::INSTALL_ROOT, "Install root").with_default("/var/www"))?;
    prompts.resolve_checked(
        &Question::new(keys::APP_PORT, "Application port").with_default("3000"),
        check_port,
    )?;
    prompts.resolve_checked(
        &Question::new(keys::NODE_MAJOR, "Node.js major version").with_default("20"),
        |value| {
            value
                .parse::<u32>()
                .map(|_| ())
                .map_err(|_| "expected a major version such as 20".to_string())
        },
    )?;
    let db_choice = prompts.resolve_checked(
        &Question::new(keys::DB_CHOICE, "Database: 1) PocketBase 2) PostgreSQL").with_default("1"),
        |value| match value {
            "1" | "2" => Ok(()),
            _ => Err("expected 1 or 2".to_string()),
        },
    )?;
    if db_choice == "1" {
        prompts.resolve(
            &Question::new(keys::POCKETBASE_VERSION, "PocketBase version")
                .with_default(DEFAULT_POCKETBASE_VERSION),
        )?;
        prompts.resolve_checked(
            &Question::new(keys::POCKETBASE_PORT, "PocketBase port").with_default("8090"),
            check_port,
        )?;
    } else {
        let db_ident = app_name.replace('-', "_");
        prompts.resolve(
            &Question::new(keys::DB_NAME, "PostgreSQL database name").with_default(&db_ident),
        )?;
        prompts.resolve(&Question::new(keys::DB_USER, "PostgreSQL user").with_default(&db_ident))?;
        prompts.resolve(&Question::new(keys::DB_PASSWORD, "PostgreSQL password").secret())?;
    }
    prompts.resolve_checked(
        &Question::new(
            keys::ENABLE_CI,
            "Set up continuous deployment with GitHub Actions? (y/n)",
        )
        .with_default("n"),
        |value| {
            parse_yes_no(value, false)
                .map(|_| ())
                .ok_or_else(|| "expected y or n".to_string())
        },
    )?;

    AppSettings::from_store(prompts.store())
}

fn check_app_name(value: &str) -> std::result::Result<(), String> {
    let pattern = Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("regex for app names");
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err("use lowercase letters, digits, '-' or '_'".to_string())
    }
}

fn parse_port_reason(value: &str) -> std::result::Result<u16, String> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(format!("expected a TCP port (got {value:?})")),
    }
}

fn check_port(value: &str) -> std::result::Result<(), String> {
    parse_port_reason(value).map(|_| ())
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    parse_port_reason(value).map_err(|reason| invalid(key, reason))
}

fn required<'s>(store: &'s ConfigStore, key: &str) -> Result<&'s str> {
    store.get(key).ok_or_else(|| {
        ProvisionError::UnresolvedKey {
            key: key.to_string(),
        }
        .into()
    })
}

fn invalid(key: &str, reason: String) -> anyhow::Error {
    ProvisionError::InvalidValue {
        key: key.to_string(),
        reason,
    }
    .into()
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
