//! Convenience surface for hosting applications.

use crate::content::{Credentials, LicenseContent};
use crate::error::LicenseResult;
use crate::validator::{Activation, LicenseValidator};
use std::path::Path;

/// Owns one [`LicenseValidator`] and forwards to it.
pub struct Licensing {
    validator: LicenseValidator,
}

impl Licensing {
    #[must_use]
    pub fn new(validator: LicenseValidator) -> Self {
        Self { validator }
    }

    /// See [`LicenseValidator::activate`].
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read or written.
    pub async fn activate_license(&mut self, credentials: Credentials) -> LicenseResult<Activation> {
        self.validator.activate(credentials).await
    }

    /// See [`LicenseValidator::validate`].
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read or written.
    pub async fn validate_license(&mut self) -> LicenseResult<bool> {
        self.validator.validate().await
    }

    /// See [`LicenseValidator::is_licensed`].
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read.
    pub fn is_licensed(&self) -> LicenseResult<bool> {
        self.validator.is_licensed()
    }

    /// See [`LicenseValidator::get_data`].
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read.
    pub fn get_license(&self) -> LicenseResult<LicenseContent> {
        self.validator.get_data()
    }

    /// See [`LicenseValidator::load`].
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be read or written.
    pub async fn load_license(&mut self, force: bool, file: Option<&Path>) -> LicenseResult<bool> {
        self.validator.load(force, file).await
    }

    /// See [`LicenseValidator::reset`].
    ///
    /// # Errors
    ///
    /// Returns an error if license state cannot be written.
    pub fn reset_license(&mut self) -> LicenseResult<()> {
        self.validator.reset()
    }

    /// See [`LicenseValidator::last_error`].
    ///
    /// # Errors
    ///
    /// Returns an error if the transient store cannot be read.
    pub fn last_error(&self) -> LicenseResult<Option<String>> {
        self.validator.last_error()
    }

    #[must_use]
    pub fn validator(&self) -> &LicenseValidator {
        &self.validator
    }

    pub fn validator_mut(&mut self) -> &mut LicenseValidator {
        &mut self.validator
    }
}

impl From<LicenseValidator> for Licensing {
    fn from(validator: LicenseValidator) -> Self {
        Self::new(validator)
    }
}
