//! License validation protocol and state machine.
//!
//! The license state is derived from the stored `expire` field alone:
//!
//! | `expire`  | state    |
//! |-----------|----------|
//! | absent    | New      |
//! | `0`       | Disabled |
//! | `> 0`     | Licensed |
//!
//! Every [`LicenseValidator::is_valid`] run queries the check endpoint,
//! failing over to the backup host when the primary is down, and reconciles
//! the reply into the stored record. When neither host answers the license
//! is treated as valid and nothing is written.

use crate::config::{LicenseConfig, LicenseHooks};
use crate::content::{
    expire_days, format_date, is_blank, parse_expiry, ContentPatch, Credentials, LicenseContent,
    RemoteContent, ValidationResponse, EXPIRED,
};
use crate::error::LicenseResult;
use crate::store::{OptionStore, TransientStore};
use crate::translator::{ErrorKind, ErrorTranslator};
use crate::webservice::{Webservice, WebserviceClient, CHECK_PATH};
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// License class the product never accepts.
pub const API_VERSION: &str = "api";

/// How a validation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The service confirmed the license; content was refreshed.
    Licensed,
    /// Neither host could be reached; the license is assumed valid.
    ServiceUnavailable,
    /// The service refused the license; content was disabled.
    Rejected(ErrorKind),
    /// The reply matched no known shape; content was left as is.
    Unrecognized,
}

impl Outcome {
    /// Returns true if the caller should treat the license as valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Licensed | Self::ServiceUnavailable)
    }
}

/// Result of [`LicenseValidator::is_valid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub outcome: Outcome,
    /// Decoded service reply, when there was one to decode.
    pub response: Option<ValidationResponse>,
}

impl Validation {
    fn new(outcome: Outcome, response: Option<ValidationResponse>) -> Self {
        Self { outcome, response }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }
}

/// Result of [`LicenseValidator::activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub validation: Validation,
    /// License content after the validation run.
    pub content: LicenseContent,
}

impl Activation {
    #[must_use]
    pub fn status(&self) -> bool {
        self.validation.is_valid()
    }
}

/// Validates a license against the licensing service and owns its state.
pub struct LicenseValidator {
    config: LicenseConfig,
    translator: ErrorTranslator,
    webservice: Box<dyn Webservice>,
    store: Arc<dyn OptionStore>,
    transient: Arc<dyn TransientStore>,
    hooks: Arc<dyn LicenseHooks>,
    credentials: Credentials,
}

impl LicenseValidator {
    /// Creates a validator bound to the host from `config` or the stored
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the stored
    /// credentials cannot be read, or no host is known.
    pub fn new(
        config: LicenseConfig,
        store: Arc<dyn OptionStore>,
        transient: Arc<dyn TransientStore>,
        hooks: Arc<dyn LicenseHooks>,
    ) -> LicenseResult<Self> {
        config.check()?;
        let credentials = read_credentials(&config, store.as_ref())?;
        let webservice = WebserviceClient::new(&credentials, &config.client, hooks.as_ref())?;
        Self::with_webservice(config, Box::new(webservice), store, transient, hooks)
    }

    /// Creates a validator over an existing [`Webservice`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the stored
    /// credentials cannot be read.
    pub fn with_webservice(
        config: LicenseConfig,
        webservice: Box<dyn Webservice>,
        store: Arc<dyn OptionStore>,
        transient: Arc<dyn TransientStore>,
        hooks: Arc<dyn LicenseHooks>,
    ) -> LicenseResult<Self> {
        config.check()?;
        let credentials = read_credentials(&config, store.as_ref())?;
        Ok(Self {
            translator: config.translator(),
            config,
            webservice,
            store,
            transient,
            hooks,
            credentials,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    #[must_use]
    pub fn translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    /// Credentials the next check will use.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Imports a pre-issued token from the license file and validates it.
    ///
    /// Does nothing unless `force` is set or the license was never
    /// validated. `file` defaults to the configured license file. The file
    /// is deleted once its token is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read or written.
    pub async fn load(&mut self, force: bool, file: Option<&Path>) -> LicenseResult<bool> {
        if !force && !self.is_new()? {
            return Ok(false);
        }

        let path = file.map_or_else(|| self.config.license_file_path(), Path::to_path_buf);
        let token = match fs::read_to_string(&path) {
            Ok(raw) => raw.trim().to_string(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no license file to import");
                return Ok(false);
            }
        };

        let mut credentials = read_credentials(&self.config, self.store.as_ref())?;
        credentials.token = Some(token);
        self.set_credentials(credentials)?;

        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to remove imported license file");
        }
        info!(path = %path.display(), "imported license token");

        Ok(self.is_valid().await?.is_valid())
    }

    /// Stores freshly submitted credentials and validates them.
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read or written.
    pub async fn activate(&mut self, submitted: Credentials) -> LicenseResult<Activation> {
        self.set_credentials(submitted)?;
        let validation = self.is_valid().await?;
        let content = self.get_data()?;
        info!(status = validation.is_valid(), "license activation finished");
        Ok(Activation {
            validation,
            content,
        })
    }

    /// Re-checks the license with the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read or written.
    pub async fn validate(&mut self) -> LicenseResult<bool> {
        Ok(self.is_valid().await?.is_valid())
    }

    /// Runs the check protocol and reconciles the reply into stored state.
    ///
    /// # Errors
    ///
    /// Only storage failures are errors; every service-side failure is an
    /// [`Outcome`].
    pub async fn is_valid(&mut self) -> LicenseResult<Validation> {
        self.check().await;

        if self.webservice.is_down() {
            match self.config.client.backup.clone().filter(|b| !b.is_empty()) {
                Some(backup) => {
                    warn!(
                        primary = self.webservice.base_url(),
                        backup = %backup,
                        "licensing service down, switching to backup"
                    );
                    self.webservice.set_base_url(&backup);
                    self.check().await;
                }
                None => debug!("licensing service down and no backup configured"),
            }
        }

        if self.webservice.is_down() {
            warn!("licensing service unreachable, keeping current license state");
            return Ok(Validation::new(Outcome::ServiceUnavailable, None));
        }

        let value = match serde_json::from_str::<Value>(self.webservice.body()) {
            Ok(value) if !is_blank(&value) => value,
            _ => return self.reject(ErrorKind::EmptyResponse, None),
        };

        if self.webservice.has_error() {
            let response = serde_json::from_value::<ValidationResponse>(value.clone())
                .unwrap_or_else(|_| {
                    let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
                    ValidationResponse::with_message(message)
                });
            let kind = self
                .translator
                .classify(response.message.as_deref().unwrap_or_default());
            let message = self.translator.parse_error(&response);
            return self.reject_with(kind, &message, Some(response));
        }

        let response = match serde_json::from_value::<ValidationResponse>(value) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "malformed license service reply");
                return self.reject(ErrorKind::InvalidResponse, None);
            }
        };

        if !response.is_success() {
            debug!(
                code = ?response.code,
                status = ?response.status,
                "unrecognized license reply, state left unchanged"
            );
            return Ok(Validation::new(Outcome::Unrecognized, Some(response)));
        }

        let content = response
            .content
            .clone()
            .unwrap_or_default()
            .merged_over(&self.config.content_defaults);

        if content.version.as_deref() == Some(API_VERSION) {
            return self.reject(ErrorKind::InvalidVersion, Some(response));
        }

        match self.enable(&content)? {
            None => self.reject(ErrorKind::InvalidResponse, Some(response)),
            Some(EXPIRED) => self.reject(ErrorKind::ExpiredLicense, Some(response)),
            Some(_) => Ok(Validation::new(Outcome::Licensed, Some(response))),
        }
    }

    /// Stores validated content, clears the cached error and returns the
    /// days left. [`EXPIRED`] means the expiry date has already passed.
    ///
    /// Returns `None` without touching state when the expiry date cannot
    /// be read.
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be written.
    pub fn enable(&self, content: &RemoteContent) -> LicenseResult<Option<i64>> {
        let now = Utc::now().naive_utc();
        let expiry = match content.expire.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(raw) => match parse_expiry(raw, &self.config.date_format) {
                Some(expiry) => expiry,
                None => {
                    warn!(expire = raw, "unreadable license expiry date");
                    return Ok(None);
                }
            },
        };
        let expire = expire_days(expiry, now);

        self.transient.delete_transient(&self.config.error_key)?;
        self.set_data(ContentPatch {
            version: Some(
                content
                    .version
                    .clone()
                    .unwrap_or_else(|| self.config.default_version.clone()),
            ),
            pack: Some(
                content
                    .pack
                    .clone()
                    .unwrap_or_else(|| self.config.default_pack.clone()),
            ),
            date: Some(format_date(expiry, &self.config.date_format)),
            expire: Some(expire),
            quota: content.quota.clone(),
        })?;

        info!(expire, "license enabled");
        Ok(Some(expire))
    }

    /// Caches `error` for display and forces the license to disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be written.
    pub fn disable(&self, error: Option<&str>) -> LicenseResult<()> {
        if let Some(message) = error.filter(|m| !m.is_empty()) {
            self.transient
                .set_transient(&self.config.error_key, message, self.config.error_ttl())?;
        }
        self.set_data(ContentPatch {
            expire: Some(EXPIRED),
            ..ContentPatch::default()
        })
    }

    /// Forgets the credentials, the cached error and the license content.
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be written.
    pub fn reset(&mut self) -> LicenseResult<()> {
        self.transient.delete_transient(&self.config.error_key)?;
        self.store.delete(&self.config.record_key(&self.config.option_name))?;
        self.credentials = Credentials::default();
        self.write_data(&self.config.content_defaults)?;
        info!("license reset");
        Ok(())
    }

    /// Stored license content, or the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or decoded.
    pub fn get_data(&self) -> LicenseResult<LicenseContent> {
        let key = self.config.record_key(&self.config.data_name);
        match self.store.get(&key)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(self.config.content_defaults.clone()),
        }
    }

    /// Merges `patch` over the currently stored content.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or written.
    pub fn set_data(&self, patch: ContentPatch) -> LicenseResult<()> {
        let mut data = self.get_data()?;
        data.apply(patch);
        self.write_data(&data)
    }

    /// Stored license class, or the default version.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn get_version(&self) -> LicenseResult<String> {
        Ok(self
            .get_data()?
            .version
            .unwrap_or_else(|| self.config.default_version.clone()))
    }

    /// Remaining days, `0` when disabled or never validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn get_expire(&self) -> LicenseResult<i64> {
        Ok(self.get_data()?.expire.unwrap_or(EXPIRED))
    }

    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn is_expired(&self) -> LicenseResult<bool> {
        Ok(self.get_expire()? == EXPIRED)
    }

    /// True when the license was never validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn is_new(&self) -> LicenseResult<bool> {
        Ok(self.get_data()?.expire.is_none())
    }

    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn is_activated(&self) -> LicenseResult<bool> {
        Ok(!self.is_expired()?)
    }

    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn is_disabled(&self) -> LicenseResult<bool> {
        self.is_expired()
    }

    /// True when validated at least once and not disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn is_licensed(&self) -> LicenseResult<bool> {
        let data = self.get_data()?;
        Ok(data.expire.is_some_and(|days| days != EXPIRED))
    }

    /// Message cached by the last failed validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the transient store cannot be read.
    pub fn last_error(&self) -> LicenseResult<Option<String>> {
        self.transient.get_transient(&self.config.error_key)
    }

    /// Health probe against the active host. Returns true if it answered.
    pub async fn ping(&mut self) -> bool {
        self.webservice.index().await;
        !self.webservice.is_down()
    }

    async fn check(&mut self) {
        let key = self.credentials.key.clone().unwrap_or_default();
        let query = [("domain", self.config.domain.as_str()), ("key", key.as_str())];
        self.webservice.send(CHECK_PATH, &query).await;
    }

    fn set_credentials(&mut self, credentials: Credentials) -> LicenseResult<()> {
        let credentials = self.hooks.filter_credentials(credentials);
        self.store.set(
            &self.config.record_key(&self.config.option_name),
            serde_json::to_value(&credentials)?,
        )?;
        if self.config.client.host.is_none() {
            if let Some(host) = credentials.host.as_deref().filter(|h| !h.is_empty()) {
                self.webservice.set_base_url(host);
            }
        }
        self.credentials = credentials;
        Ok(())
    }

    fn write_data(&self, data: &LicenseContent) -> LicenseResult<()> {
        self.store.set(
            &self.config.record_key(&self.config.data_name),
            serde_json::to_value(data)?,
        )
    }

    fn reject(
        &self,
        kind: ErrorKind,
        response: Option<ValidationResponse>,
    ) -> LicenseResult<Validation> {
        let message = self.translator.message(kind).to_string();
        self.reject_with(kind, &message, response)
    }

    fn reject_with(
        &self,
        kind: ErrorKind,
        message: &str,
        response: Option<ValidationResponse>,
    ) -> LicenseResult<Validation> {
        warn!(error = %kind, "license rejected");
        self.disable(Some(message))?;
        Ok(Validation::new(Outcome::Rejected(kind), response))
    }
}

fn read_credentials(config: &LicenseConfig, store: &dyn OptionStore) -> LicenseResult<Credentials> {
    match store.get(&config.record_key(&config.option_name))? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Credentials::default()),
    }
}
