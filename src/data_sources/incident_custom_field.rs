//! The `pagerduty_incident_custom_field` data source.
//!
//! Looks up an incident custom field by exact name over the
//! `/incidents/custom_fields` listing.

use serde_json::{json, Value};
use tracing::info;

use crate::client::{retry, Client, Retry, RETRY_TIME};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::util::require_attr_str;

/// Data source type name.
pub const TYPE_NAME: &str = "pagerduty_incident_custom_field";

/// Schema for the incident custom field data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("display_name", Attribute::computed_string())
        .with_attribute("description", Attribute::computed_string())
        .with_attribute("data_type", Attribute::computed_string())
        .with_attribute("field_type", Attribute::computed_string())
}

/// Find a custom field by exact name.
pub async fn read(client: &Client, config: &Value) -> Result<Value, ProviderError> {
    let name = require_attr_str(config, "name")?;
    info!(name, "reading incident custom field");

    let fields = retry(RETRY_TIME, || async move {
        client
            .list_all("/incidents/custom_fields", &[], "fields")
            .await
            .map_err(|err| {
                if err.is_bad_request() {
                    Retry::Permanent(err)
                } else {
                    err.into_retry()
                }
            })
    })
    .await
    .map_err(ProviderError::from)?;

    let found = fields
        .iter()
        .find(|field| field.get("name").and_then(Value::as_str) == Some(name))
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Unable to locate any incident custom field with the name: {}",
                name
            ))
        })?;

    Ok(json!({
        "id": found.get("id").cloned().unwrap_or(Value::Null),
        "name": found.get("name").cloned().unwrap_or(Value::Null),
        "display_name": found.get("display_name").cloned().unwrap_or(Value::Null),
        "description": found.get("description").cloned().unwrap_or(Value::Null),
        "data_type": found.get("data_type").cloned().unwrap_or(Value::Null),
        "field_type": found.get("field_type").cloned().unwrap_or(Value::Null),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use serde_json::json;
    use url::Url;

    fn test_client(server: &Server) -> Client {
        let base = Url::parse(&server.url_str("/")).unwrap();
        Client::new(reqwest::Client::new(), base, "test-token".to_string())
    }

    #[tokio::test]
    async fn test_read_matches_exact_name() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/incidents/custom_fields"))
                .respond_with(json_encoded(json!({
                    "fields": [
                        {"id": "PF2ELD", "name": "environment_legacy", "display_name": "Environment (legacy)",
                         "data_type": "string", "field_type": "single_value"},
                        {"id": "PF1ELD", "name": "environment", "display_name": "Environment",
                         "description": "Deployment environment", "data_type": "string",
                         "field_type": "single_value_fixed"},
                    ],
                    "more": false,
                }))),
        );

        let client = test_client(&server);
        let state = read(&client, &json!({"name": "environment"})).await.unwrap();
        assert_eq!(state["id"], "PF1ELD");
        assert_eq!(state["display_name"], "Environment");
        assert_eq!(state["field_type"], "single_value_fixed");
    }

    #[tokio::test]
    async fn test_read_errors_when_missing() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/incidents/custom_fields"))
                .respond_with(json_encoded(json!({"fields": [], "more": false}))),
        );

        let client = test_client(&server);
        let err = read(&client, &json!({"name": "missing_field"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
