//! HTTP client for the PagerDuty REST API.
//!
//! Wraps `reqwest` with the PagerDuty auth scheme, response envelope
//! handling, offset pagination, and the retry policy shared by all
//! resource handlers: bad requests fail immediately, missing resources
//! are handled per operation, and everything else is retried at a fixed
//! interval until a wall-clock budget runs out.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::error::ProviderError;

/// Wall-clock retry budget for most API operations.
pub const RETRY_TIME: Duration = Duration::from_secs(2 * 60);

/// Wall-clock retry budget for operations known to lag behind writes.
pub const RETRY_TIME_LONG: Duration = Duration::from_secs(5 * 60);

/// Default polling interval between retry attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// An error from the PagerDuty API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API returned a non-success HTTP status.
    #[error("API error (status {code}): {message}")]
    Status {
        /// The HTTP status code.
        code: u16,
        /// The error message from the response body, if any.
        message: String,
    },

    /// The request could not be sent or the response not received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// The HTTP status code, if this error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// HTTP 400. Never retried: the request itself is malformed.
    pub fn is_bad_request(&self) -> bool {
        self.status_code() == Some(400)
    }

    /// HTTP 404. Terminal; read operations translate this into state removal.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Whether this error is worth retrying: rate limits, server errors,
    /// and transport failures. Client errors (4xx) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { code, .. } => *code == 429 || *code >= 500,
            ApiError::Transport(_) => true,
            ApiError::Decode(_) => false,
        }
    }

    /// Classify this error for the retry loop using the default policy.
    pub fn into_retry(self) -> Retry {
        if self.is_retryable() {
            Retry::Transient(self)
        } else {
            Retry::Permanent(self)
        }
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        match &err {
            ApiError::Status { code: 400, message } => {
                ProviderError::InvalidRequest(message.clone())
            }
            ApiError::Status { code: 401, message } | ApiError::Status { code: 403, message } => {
                ProviderError::PermissionDenied(message.clone())
            }
            ApiError::Status { code: 404, message } => ProviderError::NotFound(message.clone()),
            ApiError::Status { code: 429, message } => {
                ProviderError::ResourceExhausted(message.clone())
            }
            ApiError::Status { .. } | ApiError::Transport(_) => {
                ProviderError::Unavailable(err.to_string())
            }
            ApiError::Decode(_) => ProviderError::Internal(err.to_string()),
        }
    }
}

/// A retry-loop classification of an [`ApiError`].
#[derive(Debug)]
pub enum Retry {
    /// Try again until the budget is exhausted.
    Transient(ApiError),
    /// Stop immediately.
    Permanent(ApiError),
}

/// Re-invoke `op` at `interval` until it succeeds, fails permanently, or
/// the wall-clock `budget` elapses. On budget exhaustion the last
/// transient error is returned.
pub async fn retry_with_interval<T, F, Fut>(
    budget: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Retry>>,
{
    let deadline = Instant::now() + budget;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Retry::Permanent(err)) => return Err(err),
            Err(Retry::Transient(err)) => {
                if Instant::now() + interval >= deadline {
                    warn!(error = %err, "retry budget exhausted");
                    return Err(err);
                }
                debug!(error = %err, interval = ?interval, "retrying after transient error");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// [`retry_with_interval`] with the default polling interval.
pub async fn retry<T, F, Fut>(budget: Duration, op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Retry>>,
{
    retry_with_interval(budget, RETRY_INTERVAL, op).await
}

/// An authenticated PagerDuty REST API client.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl Client {
    /// Create a client against the given base URL with a REST API token.
    ///
    /// `http` should already carry the transport policy (timeout, TLS).
    pub fn new(http: reqwest::Client, base_url: Url, token: String) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// The base URL this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Status {
                code: 400,
                message: format!("invalid request path {:?}: {}", path, e),
            })?;
        Ok(self
            .http
            .request(method, url)
            .header("Authorization", format!("Token token={}", self.token))
            .header("Accept", "application/vnd.pagerduty+json;version=2"))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                message: error_message(&body, status.as_u16()),
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET` a path, returning the decoded JSON body.
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.send(self.request(reqwest::Method::GET, path)?).await
    }

    /// `GET` a path with query parameters.
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        self.send(self.request(reqwest::Method::GET, path)?.query(query))
            .await
    }

    /// `POST` a JSON body to a path.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        self.send(self.request(reqwest::Method::POST, path)?.json(body))
            .await
    }

    /// `PUT` a JSON body to a path.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        self.send(self.request(reqwest::Method::PUT, path)?.json(body))
            .await
    }

    /// `DELETE` a path.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(reqwest::Method::DELETE, path)?)
            .await
            .map(|_| ())
    }

    /// Fetch every page of a list endpoint using classic offset pagination.
    ///
    /// `array_key` names the envelope field holding the page's items; extra
    /// query parameters are applied to every page request.
    pub async fn list_all(
        &self,
        path: &str,
        query: &[(&str, &str)],
        array_key: &str,
    ) -> Result<Vec<Value>, ApiError> {
        const PAGE_LIMIT: usize = 25;

        let mut items = Vec::new();
        let mut offset = 0usize;
        loop {
            let limit = PAGE_LIMIT.to_string();
            let offset_str = offset.to_string();
            let mut page_query: Vec<(&str, &str)> =
                vec![("limit", &limit), ("offset", &offset_str)];
            page_query.extend_from_slice(query);

            let page = self.get_with_query(path, &page_query).await?;
            let batch = page
                .get(array_key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let count = batch.len();
            items.extend(batch);

            let more = page.get("more").and_then(Value::as_bool).unwrap_or(false);
            if !more || count == 0 {
                return Ok(items);
            }
            offset += count;
        }
    }
}

/// Pull a human-readable message out of a PagerDuty error body.
///
/// Error responses look like `{"error": {"message": "...", "errors": [...]}}`,
/// but not every endpoint is consistent about it.
fn error_message(body: &[u8], code: u16) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            let details: Vec<String> = value
                .get("error")
                .and_then(|e| e.get("errors"))
                .and_then(Value::as_array)
                .map(|errs| {
                    errs.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            if details.is_empty() {
                return message.to_string();
            }
            return format!("{}: {}", message, details.join("; "));
        }
    }
    format!("HTTP status {}", code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn test_client(server: &Server) -> Client {
        let base = Url::parse(&server.url_str("/")).unwrap();
        Client::new(reqwest::Client::new(), base, "test-token".to_string())
    }

    #[tokio::test]
    async fn test_get_sends_token_auth_header() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/abilities"),
                request::headers(contains(("authorization", "Token token=test-token"))),
            ])
            .respond_with(json_encoded(serde_json::json!({"abilities": []}))),
        );

        let client = test_client(&server);
        let body = client.get("/abilities").await.unwrap();
        assert_eq!(body["abilities"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/business_services/X")).respond_with(
                status_code(404).body(r#"{"error":{"message":"Not Found","errors":[]}}"#),
            ),
        );

        let client = test_client(&server);
        let err = client.get("/business_services/X").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Not Found"));
    }

    #[tokio::test]
    async fn test_bad_request_is_terminal() {
        let server = Server::run();
        // Exactly one request: 400 must not be retried.
        server.expect(
            Expectation::matching(request::method_path("POST", "/maintenance_windows"))
                .times(1)
                .respond_with(
                    status_code(400).body(r#"{"error":{"message":"Invalid Input Provided"}}"#),
                ),
        );

        let client = test_client(&server);
        let result = retry_with_interval(Duration::from_secs(5), Duration::from_millis(10), || {
            let client = &client;
            async move {
                client
                    .post("/maintenance_windows", &serde_json::json!({}))
                    .await
                    .map_err(ApiError::into_retry)
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_bad_request());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/business_services/PT4KHLK"))
                .times(3)
                .respond_with(cycle![
                    status_code(503),
                    status_code(503),
                    json_encoded(serde_json::json!({
                        "business_service": {"id": "PT4KHLK", "name": "Checkout"}
                    })),
                ]),
        );

        let client = test_client(&server);
        let body = retry_with_interval(Duration::from_secs(5), Duration::from_millis(10), || {
            let client = &client;
            async move {
                client
                    .get("/business_services/PT4KHLK")
                    .await
                    .map_err(ApiError::into_retry)
            }
        })
        .await
        .unwrap();

        assert_eq!(body["business_service"]["id"], "PT4KHLK");
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_returns_last_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/services"))
                .times(1..)
                .respond_with(status_code(502)),
        );

        let client = test_client(&server);
        let err = retry_with_interval(Duration::from_millis(50), Duration::from_millis(20), || {
            let client = &client;
            async move { client.get("/services").await.map_err(ApiError::into_retry) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), Some(502));
    }

    #[tokio::test]
    async fn test_list_all_follows_pagination() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/services"),
                request::query(url_decoded(contains(("offset", "0")))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "services": [{"id": "P1"}, {"id": "P2"}],
                "more": true,
            }))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/services"),
                request::query(url_decoded(contains(("offset", "2")))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "services": [{"id": "P3"}],
                "more": false,
            }))),
        );

        let client = test_client(&server);
        let items = client
            .list_all("/services", &[("query", "web")], "services")
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["id"], "P3");
    }

    #[test]
    fn test_error_classification() {
        let bad_request = ApiError::Status {
            code: 400,
            message: "bad".into(),
        };
        assert!(bad_request.is_bad_request());
        assert!(!bad_request.is_retryable());

        let rate_limited = ApiError::Status {
            code: 429,
            message: "slow down".into(),
        };
        assert!(rate_limited.is_retryable());

        let server_error = ApiError::Status {
            code: 500,
            message: "boom".into(),
        };
        assert!(server_error.is_retryable());

        let not_found = ApiError::Status {
            code: 404,
            message: "gone".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_api_error_to_provider_error() {
        let err: ProviderError = ApiError::Status {
            code: 404,
            message: "gone".into(),
        }
        .into();
        assert!(matches!(err, ProviderError::NotFound(_)));

        let err: ProviderError = ApiError::Status {
            code: 400,
            message: "bad".into(),
        }
        .into();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        let err: ProviderError = ApiError::Status {
            code: 401,
            message: "no".into(),
        }
        .into();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));

        let err: ProviderError = ApiError::Status {
            code: 503,
            message: "down".into(),
        }
        .into();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
