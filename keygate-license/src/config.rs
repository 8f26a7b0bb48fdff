//! Engine configuration and host hooks.
//!
//! Everything a product needs to tune (hosts, record names, default
//! version/pack, date format, message tables) lives in [`LicenseConfig`].
//! Behaviour the host wants to intercept goes through [`LicenseHooks`].

use crate::content::{Credentials, LicenseContent};
use crate::error::{LicenseError, LicenseResult};
use crate::store::RecordKey;
use crate::translator::{default_errors, default_messages, ErrorMap, ErrorTranslator, MessageMap};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for the licensing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Primary host. Takes precedence over the host stored in credentials.
    pub host: Option<String>,
    /// Host tried when the primary is down.
    pub backup: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// HTTP status treated as "service down".
    pub down_code: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            backup: None,
            timeout_secs: 30,
            down_code: 429,
        }
    }
}

/// Configuration of a [`LicenseValidator`](crate::LicenseValidator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    pub client: ClientConfig,
    /// Domain reported to the service with every check.
    pub domain: String,
    /// Site the records belong to when `multi_site` is on.
    pub site: Option<String>,
    pub multi_site: bool,
    /// Record holding the credentials.
    pub option_name: String,
    /// Record holding the license content.
    pub data_name: String,
    /// Transient slot holding the last error message.
    pub error_key: String,
    pub error_ttl_secs: u64,
    pub default_version: String,
    pub default_pack: String,
    /// `strftime` format of expiry dates, both on the wire and stored.
    pub date_format: String,
    pub content_defaults: LicenseContent,
    /// Name of the one-shot token file under `root_dir`.
    pub license_file: String,
    pub root_dir: PathBuf,
    pub messages: MessageMap,
    pub errors: ErrorMap,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            domain: default_domain(),
            site: None,
            multi_site: false,
            option_name: "activation".to_string(),
            data_name: "license".to_string(),
            error_key: "license-error".to_string(),
            error_ttl_secs: 3600,
            default_version: "lite".to_string(),
            default_pack: "1s".to_string(),
            date_format: "%d/%m/%Y %H:%M".to_string(),
            content_defaults: LicenseContent::default(),
            license_file: ".license".to_string(),
            root_dir: PathBuf::from("."),
            messages: default_messages(),
            errors: default_errors(),
        }
    }
}

impl LicenseConfig {
    /// Loads a configuration from a JSON file. Missing fields keep defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: &Path) -> LicenseResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.check()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] naming the offending field.
    pub fn check(&self) -> LicenseResult<()> {
        if self.multi_site && self.site.as_deref().is_none_or(str::is_empty) {
            return Err(LicenseError::Config(
                "multi_site requires a site name".to_string(),
            ));
        }
        if self.option_name.is_empty() || self.data_name.is_empty() {
            return Err(LicenseError::Config("record names must not be empty".to_string()));
        }
        Ok(())
    }

    /// Key of a record, scoped to the site when `multi_site` is on.
    #[must_use]
    pub fn record_key(&self, name: &str) -> RecordKey {
        match (&self.site, self.multi_site) {
            (Some(site), true) => RecordKey::scoped(name, site.as_str()),
            _ => RecordKey::new(name),
        }
    }

    #[must_use]
    pub fn license_file_path(&self) -> PathBuf {
        self.root_dir.join(&self.license_file)
    }

    #[must_use]
    pub fn error_ttl(&self) -> Duration {
        Duration::from_secs(self.error_ttl_secs)
    }

    #[must_use]
    pub fn translator(&self) -> ErrorTranslator {
        ErrorTranslator::new(self.messages.clone(), self.errors.clone())
    }
}

/// Interception points for the hosting application.
pub trait LicenseHooks: Send + Sync {
    /// Request timeout in seconds, given the configured one.
    fn timeout_secs(&self, configured: u64) -> u64 {
        configured
    }

    /// Sanitizes credentials before they are persisted.
    fn filter_credentials(&self, credentials: Credentials) -> Credentials {
        credentials
    }
}

/// Hooks that change nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl LicenseHooks for DefaultHooks {}

/// Machine hostname, used as the reported domain when none is configured.
fn default_domain() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}
