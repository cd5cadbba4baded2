//! The `pagerduty_user_contact_method` data source.
//!
//! Looks up one of a user's contact methods by label or type through
//! `/users/{id}/contact_methods`.

use serde_json::{json, Value};
use tracing::info;

use crate::client::{retry, Client, Retry, RETRY_TIME_LONG};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::util::require_attr_str;

/// Data source type name.
pub const TYPE_NAME: &str = "pagerduty_user_contact_method";

/// Schema for the user contact method data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("user_id", Attribute::required_string())
        .with_attribute("label", Attribute::required_string())
        .with_attribute("type", Attribute::required_string())
        .with_attribute("address", Attribute::computed_string())
        .with_attribute("blacklisted", Attribute::computed_bool())
        .with_attribute("country_code", Attribute::computed_int64())
        .with_attribute("device_type", Attribute::computed_string())
        .with_attribute("enabled", Attribute::computed_bool())
        .with_attribute("send_short_email", Attribute::computed_bool())
}

/// Flatten a contact method into attribute state.
fn flatten(user_id: &str, method: &Value) -> Value {
    let kind = method.get("type").and_then(Value::as_str).unwrap_or_default();
    let mut state = json!({
        "id": method.get("id").cloned().unwrap_or(Value::Null),
        "user_id": user_id,
        "label": method.get("label").cloned().unwrap_or(Value::Null),
        "type": kind,
        "address": method.get("address").cloned().unwrap_or(Value::Null),
        "blacklisted": method.get("blacklisted").cloned().unwrap_or(json!(false)),
        "country_code": method.get("country_code").cloned().unwrap_or(Value::Null),
        "device_type": Value::Null,
        "enabled": method.get("enabled").cloned().unwrap_or(json!(false)),
        "send_short_email": method.get("send_short_email").cloned().unwrap_or(json!(false)),
    });
    if kind == "push_notification_contact_method" {
        state["device_type"] = method.get("device_type").cloned().unwrap_or(Value::Null);
    }
    state
}

/// Find a user's contact method by label or type.
pub async fn read(client: &Client, config: &Value) -> Result<Value, ProviderError> {
    let user_id = require_attr_str(config, "user_id")?;
    let label = require_attr_str(config, "label")?;
    let kind = require_attr_str(config, "type")?;
    info!(user_id, label, "reading user contact method");

    let path = format!("/users/{}/contact_methods", user_id);
    let result = retry(RETRY_TIME_LONG, || {
        let path = &path;
        async move {
            client
                .list_all(path, &[], "contact_methods")
                .await
                .map_err(|err| {
                    if err.is_bad_request() || err.is_not_found() {
                        Retry::Permanent(err)
                    } else {
                        err.into_retry()
                    }
                })
        }
    })
    .await;

    let methods = match result {
        Ok(methods) => methods,
        // A missing user has no contact methods to offer.
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err.into()),
    };

    let found = methods
        .iter()
        .find(|method| {
            method.get("label").and_then(Value::as_str) == Some(label)
                || method.get("type").and_then(Value::as_str) == Some(kind)
        })
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Unable to locate any user contact method with label: {}",
                label
            ))
        })?;
    Ok(flatten(user_id, found))
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

    #[test]
    fn test_flatten_only_exposes_device_type_for_push() {
        let state = flatten(
            "PUSER1",
            &json!({
                "id": "PCM1",
                "type": "email_contact_method",
                "label": "Work",
                "address": "user@example.com",
                "device_type": "ios",
                "enabled": true,
            }),
        );
        assert_eq!(state["device_type"], Value::Null);

        let state = flatten(
            "PUSER1",
            &json!({
                "id": "PCM2",
                "type": "push_notification_contact_method",
                "label": "Phone",
                "device_type": "ios",
            }),
        );
        assert_eq!(state["device_type"], "ios");
    }

    #[tokio::test]
    async fn test_read_matches_label() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/users/PUSER1/contact_methods",
            ))
            .respond_with(json_encoded(json!({
                "contact_methods": [
                    {"id": "PCM1", "type": "email_contact_method", "label": "Work",
                     "address": "user@example.com", "enabled": true},
                    {"id": "PCM2", "type": "phone_contact_method", "label": "Mobile",
                     "address": "5550100", "country_code": 1},
                ],
                "more": false,
            }))),
        );

        let client = test_client(&server);
        let state = read(
            &client,
            &json!({"user_id": "PUSER1", "label": "Mobile", "type": "sms_contact_method"}),
        )
        .await
        .unwrap();
        assert_eq!(state["id"], "PCM2");
        assert_eq!(state["country_code"], 1);
    }

    #[tokio::test]
    async fn test_read_errors_when_missing() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/users/PUSER1/contact_methods",
            ))
            .respond_with(json_encoded(json!({"contact_methods": [], "more": false}))),
        );

        let client = test_client(&server);
        let err = read(
            &client,
            &json!({"user_id": "PUSER1", "label": "Pager", "type": "sms_contact_method"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
