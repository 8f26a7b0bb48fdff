//! Command model and runner for the `keygate` binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keygate_license::{
    Credentials, FileStore, LicenseConfig, LicenseContent, LicenseHooks, LicenseValidator,
    Licensing,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(about = "Activate and validate a product license")]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding license state
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Licensing host, overrides the configuration
    #[arg(long)]
    pub host: Option<String>,

    /// Backup licensing host, overrides the configuration
    #[arg(long)]
    pub backup: Option<String>,

    /// Domain reported to the licensing service
    #[arg(long)]
    pub domain: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store credentials and validate them
    Activate {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Re-check the stored license
    Validate,
    /// Print the stored license state
    Status,
    /// Forget credentials and license state
    Reset,
    /// Import a token from the license file
    Load {
        #[arg(long)]
        force: bool,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Probe the licensing host
    Ping,
}

/// Timeout override and credential cleanup applied by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliHooks {
    pub timeout_secs: Option<u64>,
}

impl LicenseHooks for CliHooks {
    fn timeout_secs(&self, configured: u64) -> u64 {
        self.timeout_secs.unwrap_or(configured)
    }

    fn filter_credentials(&self, credentials: Credentials) -> Credentials {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Credentials {
            token: clean(credentials.token),
            user: clean(credentials.user),
            password: credentials.password.filter(|p| !p.is_empty()),
            key: clean(credentials.key),
            host: clean(credentials.host),
        }
    }
}

/// What `status` prints.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub content: LicenseContent,
    pub version: String,
    pub expire: i64,
    pub new: bool,
    pub expired: bool,
    pub licensed: bool,
    pub error: Option<String>,
}

impl Cli {
    /// Resolves the configuration: file first, then command-line overrides.
    pub fn license_config(&self) -> Result<LicenseConfig> {
        let mut config = match &self.config {
            Some(path) => LicenseConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => LicenseConfig::default(),
        };
        if let Some(host) = &self.host {
            config.client.host = Some(host.clone());
        }
        if let Some(backup) = &self.backup {
            config.client.backup = Some(backup.clone());
        }
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        Ok(config)
    }

    fn store_dir(&self) -> Result<PathBuf> {
        match &self.store {
            Some(dir) => Ok(dir.clone()),
            None => FileStore::default_dir().context("No data directory available, pass --store"),
        }
    }

    /// Builds the facade over a file-backed store.
    pub fn licensing(&self) -> Result<Licensing> {
        let config = self.license_config()?;
        let dir = self.store_dir()?;
        let store = Arc::new(
            FileStore::open(&dir)
                .with_context(|| format!("Failed to open store {}", dir.display()))?,
        );
        let hooks = Arc::new(CliHooks {
            timeout_secs: self.timeout,
        });
        let validator = LicenseValidator::new(config, store.clone(), store, hooks)
            .context("Failed to initialise license validator")?;
        Ok(Licensing::new(validator))
    }
}

/// Runs `command` and returns the text to print.
pub async fn run(licensing: &mut Licensing, command: Command) -> Result<String> {
    match command {
        Command::Activate {
            key,
            token,
            user,
            password,
        } => {
            let activation = licensing
                .activate_license(Credentials {
                    token,
                    user,
                    password,
                    key,
                    host: None,
                })
                .await?;
            verdict(licensing, activation.status(), "activated")
        }
        Command::Validate => {
            let valid = licensing.validate_license().await?;
            verdict(licensing, valid, "valid")
        }
        Command::Status => {
            let report = status_report(licensing)?;
            Ok(serde_json::to_string_pretty(&report)?)
        }
        Command::Reset => {
            licensing.reset_license()?;
            Ok("License reset".to_string())
        }
        Command::Load { force, file } => {
            let loaded = licensing.load_license(force, file.as_deref()).await?;
            if loaded {
                Ok("License file imported and valid".to_string())
            } else {
                verdict(licensing, false, "imported")
            }
        }
        Command::Ping => {
            let up = licensing.validator_mut().ping().await;
            Ok(if up {
                "Licensing service reachable".to_string()
            } else {
                "Licensing service unreachable".to_string()
            })
        }
    }
}

pub fn status_report(licensing: &Licensing) -> Result<StatusReport> {
    let validator = licensing.validator();
    Ok(StatusReport {
        content: validator.get_data()?,
        version: validator.get_version()?,
        expire: validator.get_expire()?,
        new: validator.is_new()?,
        expired: validator.is_expired()?,
        licensed: validator.is_licensed()?,
        error: validator.last_error()?,
    })
}

fn verdict(licensing: &Licensing, ok: bool, what: &str) -> Result<String> {
    if ok {
        return Ok(format!("License {what}"));
    }
    Ok(match licensing.last_error()? {
        Some(error) => format!("License not {what}: {error}"),
        None => format!("License not {what}"),
    })
}
