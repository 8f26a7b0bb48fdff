//! Shared test helpers for validator tests.

#![allow(dead_code)]

use chrono::{TimeDelta, Utc};
use keygate_license::{
    ClientConfig, DefaultHooks, LicenseConfig, LicenseHooks, LicenseValidator, MemoryStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Address nothing listens on.
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

pub const DOMAIN: &str = "shop.example.com";

/// Configuration pointing at `primary`, with an optional backup.
pub fn config_for(primary: &str, backup: Option<&str>) -> LicenseConfig {
    LicenseConfig {
        client: ClientConfig {
            host: Some(primary.to_string()),
            backup: backup.map(str::to_string),
            timeout_secs: 5,
            ..ClientConfig::default()
        },
        domain: DOMAIN.to_string(),
        ..LicenseConfig::default()
    }
}

pub fn validator(config: LicenseConfig, store: &Arc<MemoryStore>) -> LicenseValidator {
    validator_with_hooks(config, store, Arc::new(DefaultHooks))
}

pub fn validator_with_hooks(
    config: LicenseConfig,
    store: &Arc<MemoryStore>,
    hooks: Arc<dyn LicenseHooks>,
) -> LicenseValidator {
    LicenseValidator::new(config, store.clone(), store.clone(), hooks).unwrap()
}

/// Mounts a check endpoint answering with `template`.
pub async fn mount_check(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/license/check/"))
        .respond_with(template)
        .mount(server)
        .await;
}

/// A successful check reply carrying `content`.
pub fn success(content: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 200,
        "status": "success",
        "content": content,
    }))
}

/// The "service down" reply.
pub fn down() -> ResponseTemplate {
    ResponseTemplate::new(429).set_body_string("Too Many Requests")
}

/// Expiry `days` days and `hours` hours from now, in the default date format.
pub fn expiry_in(days: i64, hours: i64) -> String {
    (Utc::now() + TimeDelta::days(days) + TimeDelta::hours(hours))
        .format("%d/%m/%Y %H:%M")
        .to_string()
}
