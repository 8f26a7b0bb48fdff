//! Classification of licensing-service error replies.
//!
//! The service reports failures as free-form `message` strings. The
//! translator maps them back to an [`ErrorKind`] through an error table
//! (kind → exact server string) and then to a user-facing message through a
//! message table (kind → message).

use crate::content::ValidationResponse;
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Known error kinds.
///
/// Declaration order is also lookup order when classifying server messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Neither the primary nor the backup host answered.
    ServerDown,
    /// Empty or undecodable body.
    EmptyResponse,
    /// Body decoded but did not have the expected shape.
    InvalidResponse,
    /// License period is over.
    ExpiredLicense,
    /// License class is not accepted by this product.
    InvalidVersion,
    /// Unknown license key.
    InvalidKey,
    /// Malformed license key.
    InvalidFormat,
    /// Bad user/password.
    InvalidAuth,
    /// Domain quota of the license exhausted.
    InvalidQuota,
    /// Request carried no domain.
    MissingDomain,
    /// Request carried no key.
    MissingKey,
    /// Anything not listed in the error table.
    UnknownError,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 12] = [
        Self::ServerDown,
        Self::EmptyResponse,
        Self::InvalidResponse,
        Self::ExpiredLicense,
        Self::InvalidVersion,
        Self::InvalidKey,
        Self::InvalidFormat,
        Self::InvalidAuth,
        Self::InvalidQuota,
        Self::MissingDomain,
        Self::MissingKey,
        Self::UnknownError,
    ];

    /// Returns the kebab-case key of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerDown => "server-down",
            Self::EmptyResponse => "empty-response",
            Self::InvalidResponse => "invalid-response",
            Self::ExpiredLicense => "expired-license",
            Self::InvalidVersion => "invalid-version",
            Self::InvalidKey => "invalid-key",
            Self::InvalidFormat => "invalid-format",
            Self::InvalidAuth => "invalid-auth",
            Self::InvalidQuota => "invalid-quota",
            Self::MissingDomain => "missing-domain",
            Self::MissingKey => "missing-key",
            Self::UnknownError => "unknown-error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown error kind: {s}"))
    }
}

/// Kind → user-facing message.
pub type MessageMap = BTreeMap<ErrorKind, String>;

/// Kind → exact server error string, kept in table order.
pub type ErrorMap = IndexMap<ErrorKind, String>;

/// Stock user-facing messages.
#[must_use]
pub fn default_messages() -> MessageMap {
    [
        (ErrorKind::UnknownError, "Unknown error, please contact support"),
        (ErrorKind::ServerDown, "Unable to connect to server, please try again"),
        (ErrorKind::EmptyResponse, "No response, please try again"),
        (ErrorKind::ExpiredLicense, "Your license is expired, please renew it"),
        (ErrorKind::InvalidResponse, "Invalid response, please try again"),
        (
            ErrorKind::InvalidVersion,
            "Invalid license version, please upgrade your license",
        ),
        (
            ErrorKind::InvalidKey,
            "Your license key is invalid, please buy new license",
        ),
        (
            ErrorKind::InvalidFormat,
            "Your license key is invalid, please check your entry",
        ),
        (ErrorKind::InvalidAuth, "Please verify your email and password"),
        (
            ErrorKind::InvalidQuota,
            "Your quota domain limit reached! please upgrade your license",
        ),
        (
            ErrorKind::MissingDomain,
            "Your website is not authorized, please contact support",
        ),
        (
            ErrorKind::MissingKey,
            "Your license key is invalid, please contact support",
        ),
    ]
    .into_iter()
    .map(|(kind, msg)| (kind, msg.to_string()))
    .collect()
}

/// Stock server error strings.
#[must_use]
pub fn default_errors() -> ErrorMap {
    [
        (ErrorKind::InvalidAuth, "Unauthorized"),
        (ErrorKind::InvalidKey, "Invalid license key"),
        (ErrorKind::InvalidFormat, "Invalid license key format"),
        (ErrorKind::InvalidVersion, "Invalid license version"),
        (ErrorKind::InvalidQuota, "Quota domain limit reached"),
        (ErrorKind::ExpiredLicense, "Expired license"),
        (ErrorKind::MissingDomain, "Domain not provided"),
        (ErrorKind::MissingKey, "License key not provided"),
    ]
    .into_iter()
    .map(|(kind, msg)| (kind, msg.to_string()))
    .collect()
}

/// Last-resort text when even the `unknown-error` entry is missing.
const FALLBACK_MESSAGE: &str = "Unknown error";

/// Maps server error strings to kinds and kinds to messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTranslator {
    messages: MessageMap,
    errors: ErrorMap,
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new(default_messages(), default_errors())
    }
}

impl ErrorTranslator {
    /// Creates a translator over the given tables.
    #[must_use]
    pub fn new(messages: MessageMap, errors: ErrorMap) -> Self {
        Self { messages, errors }
    }

    /// Finds the kind whose server string equals `server_message` exactly.
    /// When several kinds share a string, the one listed first wins.
    #[must_use]
    pub fn classify(&self, server_message: &str) -> ErrorKind {
        self.errors
            .iter()
            .find(|(_, known)| known.as_str() == server_message)
            .map(|(kind, _)| *kind)
            .unwrap_or(ErrorKind::UnknownError)
    }

    /// Returns the message for `kind`, or the `unknown-error` message.
    #[must_use]
    pub fn message(&self, kind: ErrorKind) -> &str {
        self.messages
            .get(&kind)
            .or_else(|| self.messages.get(&ErrorKind::UnknownError))
            .map_or(FALLBACK_MESSAGE, String::as_str)
    }

    /// Translates the `message` of a service reply into a user-facing message.
    #[must_use]
    pub fn parse_error(&self, response: &ValidationResponse) -> String {
        let kind = response
            .message
            .as_deref()
            .map_or(ErrorKind::UnknownError, |m| self.classify(m));
        self.message(kind).to_string()
    }
}
