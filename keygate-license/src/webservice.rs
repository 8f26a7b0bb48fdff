//! HTTP client for the licensing service.
//!
//! All requests are `GET`s against the active base URL. Failures never
//! surface as errors: a request that could not complete leaves the client in
//! the "down" state, which is what the failover protocol keys on.

use crate::config::{ClientConfig, LicenseHooks};
use crate::content::Credentials;
use crate::error::{LicenseError, LicenseResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Path of the health probe.
pub const INDEX_PATH: &str = "/";

/// Path of the license check endpoint.
pub const CHECK_PATH: &str = "/license/check/";

/// Narrow interface of a licensing-service client.
#[async_trait]
pub trait Webservice: Send + Sync {
    /// Issues a `GET` to `path` on the active host and records the response.
    async fn send(&mut self, path: &str, query: &[(&str, &str)]);

    /// Health probe.
    async fn index(&mut self) {
        self.send(INDEX_PATH, &[]).await;
    }

    /// Switches the active host.
    fn set_base_url(&mut self, url: &str);

    /// Returns the active host.
    fn base_url(&self) -> &str;

    /// Status code of the last response, if one arrived.
    fn status(&self) -> Option<u16>;

    /// True when the last request failed or hit the "down" status code.
    fn is_down(&self) -> bool;

    /// Body of the last response (empty after a failure).
    fn body(&self) -> &str;

    /// True when the last body carries a non-empty `message`.
    fn has_error(&self) -> bool {
        serde_json::from_str::<Value>(self.body())
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
            .is_some_and(|m| !m.is_empty())
    }
}

/// [`Webservice`] over `reqwest`.
#[derive(Debug)]
pub struct WebserviceClient {
    client: Client,
    base_url: String,
    down_code: u16,
    status: Option<u16>,
    body: String,
    failed: bool,
}

impl WebserviceClient {
    /// Binds a client to the configured host, or to the host in `auth`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] when no host is known and
    /// [`LicenseError::Client`] when the HTTP client cannot be built.
    pub fn new(
        auth: &Credentials,
        config: &ClientConfig,
        hooks: &dyn LicenseHooks,
    ) -> LicenseResult<Self> {
        let base_url = config
            .host
            .clone()
            .or_else(|| auth.host.clone())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LicenseError::Config("no licensing host configured".to_string()))?;

        let timeout = Duration::from_secs(hooks.timeout_secs(config.timeout_secs));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LicenseError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            down_code: config.down_code,
            status: None,
            body: String::new(),
            failed: false,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn record_failure(&mut self) {
        self.status = None;
        self.body.clear();
        self.failed = true;
    }
}

#[async_trait]
impl Webservice for WebserviceClient {
    async fn send(&mut self, path: &str, query: &[(&str, &str)]) {
        let url = self.url(path);
        debug!(%url, "license service request");

        let response = match self.client.get(&url).query(query).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "license service request failed");
                self.record_failure();
                return;
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                debug!(%url, status, "license service responded");
                self.status = Some(status);
                self.body = body;
                self.failed = false;
            }
            Err(e) => {
                warn!(%url, status, error = %e, "unreadable license service response");
                self.record_failure();
            }
        }
    }

    fn set_base_url(&mut self, url: &str) {
        self.base_url = url.to_string();
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn status(&self) -> Option<u16> {
        self.status
    }

    fn is_down(&self) -> bool {
        self.failed || self.status == Some(self.down_code)
    }

    fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultHooks;

    #[test]
    fn explicit_host_wins_over_credentials() {
        let auth = Credentials {
            host: Some("https://from-auth.example".into()),
            ..Credentials::default()
        };
        let config = ClientConfig {
            host: Some("https://configured.example/".into()),
            ..ClientConfig::default()
        };
        let client = WebserviceClient::new(&auth, &config, &DefaultHooks).unwrap();
        assert_eq!(client.base_url(), "https://configured.example/");
        assert_eq!(client.url(CHECK_PATH), "https://configured.example/license/check/");
    }

    #[test]
    fn falls_back_to_credentials_host() {
        let auth = Credentials {
            host: Some("https://from-auth.example".into()),
            ..Credentials::default()
        };
        let client = WebserviceClient::new(&auth, &ClientConfig::default(), &DefaultHooks).unwrap();
        assert_eq!(client.base_url(), "https://from-auth.example");
    }

    #[test]
    fn missing_host_is_config_error() {
        let err = WebserviceClient::new(
            &Credentials::default(),
            &ClientConfig::default(),
            &DefaultHooks,
        )
        .unwrap_err();
        assert!(matches!(err, LicenseError::Config(_)));
    }

    #[test]
    fn fresh_client_is_not_down() {
        let config = ClientConfig {
            host: Some("http://127.0.0.1:9".into()),
            ..ClientConfig::default()
        };
        let client = WebserviceClient::new(&Credentials::default(), &config, &DefaultHooks).unwrap();
        assert!(!client.is_down());
        assert!(!client.has_error());
        assert_eq!(client.status(), None);
    }
}
