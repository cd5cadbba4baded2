//! Provider configuration and client construction.
//!
//! The provider block carries the API token and regional endpoint
//! selection; [`Config::build_client`] turns it into an authenticated
//! [`Client`], optionally probing `/abilities` to fail fast on bad
//! credentials.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::client::{ApiError, Client};
use crate::error::ProviderError;
use crate::util::default_getenv;

/// Default API endpoint for the `us` service region.
const API_URL_US: &str = "https://api.pagerduty.com";

/// Default API endpoint for the `eu` service region.
const API_URL_EU: &str = "https://api.eu.pagerduty.com";

/// Per-request timeout on outbound API calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Provider configuration, decoded from the provider block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// REST API token. Falls back to `PAGERDUTY_TOKEN`.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Overrides the regional API endpoint entirely.
    #[serde(default)]
    pub api_url_override: Option<String>,
    /// Service region, `us` (default) or `eu`.
    #[serde(default)]
    pub service_region: Option<String>,
    /// Skip the `/abilities` credential probe during configure.
    #[serde(default)]
    pub skip_credentials_validation: bool,
    /// Disable TLS certificate verification. For test endpoints only.
    #[serde(default)]
    pub insecure_tls: bool,
}

impl Config {
    /// Decode a provider-block value into a `Config`, applying
    /// environment-variable defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        let mut config: Config = if value.is_null() {
            Config::default()
        } else {
            serde_json::from_value(value)?
        };

        if config.api_token.as_deref().unwrap_or("").is_empty() {
            config.api_token = default_getenv("PAGERDUTY_TOKEN");
        }
        if config.api_url_override.as_deref().unwrap_or("").is_empty() {
            config.api_url_override = default_getenv("PAGERDUTY_API_URL");
        }
        Ok(config)
    }

    /// The API endpoint this configuration resolves to.
    pub fn api_url(&self) -> Result<Url, ProviderError> {
        let raw = match self.api_url_override.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => match self.service_region.as_deref().unwrap_or("us") {
                "eu" => API_URL_EU,
                "us" | "" => API_URL_US,
                other => {
                    return Err(ProviderError::Configuration(format!(
                        "invalid service_region {:?}: expected \"us\" or \"eu\"",
                        other
                    )))
                }
            },
        };
        // A trailing slash makes Url::join treat the path as a directory.
        let normalized = format!("{}/", raw.trim_end_matches('/'));
        Url::parse(&normalized)
            .map_err(|e| ProviderError::Configuration(format!("invalid API URL {:?}: {}", raw, e)))
    }

    /// Build an authenticated [`Client`], validating credentials against
    /// `/abilities` unless that is skipped.
    pub async fn build_client(&self) -> Result<Client, ProviderError> {
        let token = match self.api_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                return Err(ProviderError::Configuration(
                    "no API token configured: set api_token or the PAGERDUTY_TOKEN environment variable"
                        .to_string(),
                ))
            }
        };

        let base_url = self.api_url()?;
        debug!(api_url = %base_url, "building API client");

        let mut builder = reqwest::Client::builder().timeout(HTTP_TIMEOUT);
        if self.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let client = Client::new(http, base_url, token);

        if self.skip_credentials_validation {
            debug!("skipping credential validation");
            return Ok(client);
        }

        match client.get("/abilities").await {
            Ok(_) => {
                info!("API credentials validated");
                Ok(client)
            }
            Err(err @ ApiError::Status { code: 401, .. }) => Err(ProviderError::Configuration(
                format!("invalid API credentials: {}", err),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use serde_json::json;

    #[test]
    fn test_endpoint_selection() {
        let config = Config::default();
        assert_eq!(config.api_url().unwrap().as_str(), "https://api.pagerduty.com/");

        let config = Config {
            service_region: Some("eu".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.api_url().unwrap().as_str(),
            "https://api.eu.pagerduty.com/"
        );

        let config = Config {
            api_url_override: Some("https://pagerduty.example.com".to_string()),
            service_region: Some("eu".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.api_url().unwrap().as_str(),
            "https://pagerduty.example.com/"
        );

        let config = Config {
            service_region: Some("apac".to_string()),
            ..Default::default()
        };
        assert!(config.api_url().is_err());
    }

    #[test]
    fn test_from_value_decodes_provider_block() {
        let config = Config::from_value(json!({
            "api_token": "secret",
            "service_region": "eu",
            "skip_credentials_validation": true,
        }))
        .unwrap();
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.service_region.as_deref(), Some("eu"));
        assert!(config.skip_credentials_validation);
        assert!(!config.insecure_tls);
    }

    #[tokio::test]
    async fn test_build_client_requires_token() {
        let config = Config {
            api_token: Some(String::new()),
            skip_credentials_validation: true,
            ..Default::default()
        };
        // The environment fallback may be unset; only assert when it is.
        if std::env::var("PAGERDUTY_TOKEN").is_err() {
            let err = config.build_client().await.unwrap_err();
            assert!(matches!(err, ProviderError::Configuration(_)));
        }
    }

    #[tokio::test]
    async fn test_build_client_validates_credentials() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/abilities"))
                .respond_with(json_encoded(json!({"abilities": ["teams"]}))),
        );

        let config = Config {
            api_token: Some("secret".to_string()),
            api_url_override: Some(server.url_str("")),
            ..Default::default()
        };
        let client = config.build_client().await.unwrap();
        assert!(client.base_url().as_str().starts_with("http://"));
    }

    #[tokio::test]
    async fn test_build_client_rejects_bad_credentials() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/abilities")).respond_with(
                status_code(401).body(r#"{"error":{"message":"Unauthorized"}}"#),
            ),
        );

        let config = Config {
            api_token: Some("wrong".to_string()),
            api_url_override: Some(server.url_str("")),
            ..Default::default()
        };
        let err = config.build_client().await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
