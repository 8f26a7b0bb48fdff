//! License records and service payloads.
//!
//! Two records are persisted: the holder's [`Credentials`] and the last
//! validated [`LicenseContent`]. The service reply is decoded into a
//! transient [`ValidationResponse`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Write as _;

/// Expiry value meaning "not entitled".
pub const EXPIRED: i64 = 0;

/// Service status code meaning the service is up.
pub const CODE_UP: i64 = 200;

/// Service status string of a successful check.
pub const STATUS_SUCCESS: &str = "success";

/// Identifies the license holder.
///
/// Usually either `token` or the `user`/`password`/`key` triple is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Pre-issued token, imported from the license file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Account login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Account password.
    #[serde(alias = "pswd", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// License key sent with every check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Licensing host, used when no host is configured explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Last validated entitlement snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseContent {
    /// License class, e.g. `pro`.
    pub version: Option<String>,
    /// Purchased pack, e.g. `1y`.
    pub pack: Option<String>,
    /// Formatted expiry date.
    pub date: Option<String>,
    /// Remaining days; `Some(0)` is disabled, `None` is never validated.
    pub expire: Option<i64>,
    /// Domains covered by the license.
    pub quota: Vec<String>,
}

impl LicenseContent {
    /// Overwrites every field that is set in `patch`.
    pub fn apply(&mut self, patch: ContentPatch) {
        if let Some(version) = patch.version {
            self.version = Some(version);
        }
        if let Some(pack) = patch.pack {
            self.pack = Some(pack);
        }
        if let Some(date) = patch.date {
            self.date = Some(date);
        }
        if let Some(expire) = patch.expire {
            self.expire = Some(expire);
        }
        if let Some(quota) = patch.quota {
            self.quota = quota;
        }
    }
}

/// Partial update of [`LicenseContent`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentPatch {
    pub version: Option<String>,
    pub pack: Option<String>,
    pub date: Option<String>,
    pub expire: Option<i64>,
    pub quota: Option<Vec<String>>,
}

/// The `content` object of a successful check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteContent {
    pub version: Option<String>,
    pub pack: Option<String>,
    pub date: Option<String>,
    /// Expiry date, in the configured date format.
    pub expire: Option<String>,
    pub quota: Option<Vec<String>>,
}

impl RemoteContent {
    /// Fills every field the service left out from `defaults`.
    #[must_use]
    pub fn merged_over(self, defaults: &LicenseContent) -> Self {
        Self {
            version: self.version.or_else(|| defaults.version.clone()),
            pack: self.pack.or_else(|| defaults.pack.clone()),
            date: self.date.or_else(|| defaults.date.clone()),
            expire: self.expire,
            quota: self.quota.or_else(|| Some(defaults.quota.clone())),
        }
    }
}

/// Decoded reply of the check endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationResponse {
    #[serde(deserialize_with = "lenient_code")]
    pub code: Option<i64>,
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<RemoteContent>,
}

impl ValidationResponse {
    /// A reply carrying nothing but an error message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns true for `code == 200` and `status == "success"`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == Some(CODE_UP) && self.status.as_deref() == Some(STATUS_SUCCESS)
    }
}

/// Accepts the status code as a JSON number, an integral float or a
/// numeric string.
fn lenient_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Code>::deserialize(deserializer)? {
        Some(Code::Int(code)) => Some(code),
        Some(Code::Float(code)) => integral(code),
        Some(Code::Text(text)) => {
            let text = text.trim();
            text.parse()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral))
        }
        None => None,
    })
}

fn integral(code: f64) -> Option<i64> {
    (code.is_finite() && code.fract() == 0.0).then_some(code as i64)
}

/// Returns true for JSON values that carry no data at all.
#[must_use]
pub fn is_blank(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Days of entitlement left between `now` and `expiry`.
///
/// The signed day difference is truncated toward zero and offset by one, so
/// an expiry later today still counts as one day. Results below zero clamp
/// to [`EXPIRED`].
#[must_use]
pub fn expire_days(expiry: NaiveDateTime, now: NaiveDateTime) -> i64 {
    ((expiry - now).num_days() + 1).max(EXPIRED)
}

/// Parses an expiry date in `format`, falling back to RFC 3339 and ISO forms.
#[must_use]
pub fn parse_expiry(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_utc()))
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok())
}

/// Formats `date` with `format`, falling back to RFC 3339 on a bad format.
#[must_use]
pub fn format_date(date: NaiveDateTime, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(format)).is_err() {
        return date.and_utc().to_rfc3339();
    }
    out
}
