//! The `pagerduty_maintenance_window` resource.
//!
//! Maintenance windows suppress alerting on a set of services between
//! two RFC 3339 timestamps, managed through `/maintenance_windows`.

use chrono::DateTime;
use serde_json::{json, Value};
use tracing::info;

use crate::client::{retry, ApiError, Client, Retry, RETRY_TIME};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::util::{attr_str, attr_string_list, require_attr_str};

/// Resource type name.
pub const TYPE_NAME: &str = "pagerduty_maintenance_window";

/// Schema for the maintenance window resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("start_time", Attribute::required_string())
        .with_attribute("end_time", Attribute::required_string())
        .with_attribute(
            "description",
            Attribute::optional_computed_string().with_default(json!("Managed by Hemmer")),
        )
        .with_attribute(
            "services",
            Attribute::required(AttributeType::set(AttributeType::String)),
        )
}

/// Validate the RFC 3339 timestamp attributes.
pub fn validate(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for name in ["start_time", "end_time"] {
        if let Some(value) = attr_str(config, name) {
            if DateTime::parse_from_rfc3339(value).is_err() {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid RFC 3339 timestamp: {}", value))
                        .with_attribute(name),
                );
            }
        }
    }
    diagnostics
}

/// Build the API request body from attribute state.
fn build(state: &Value) -> Value {
    let services: Vec<Value> = attr_string_list(state, "services")
        .into_iter()
        .map(|id| json!({"id": id, "type": "service_reference"}))
        .collect();
    json!({
        "type": "maintenance_window",
        "start_time": attr_str(state, "start_time").unwrap_or_default(),
        "end_time": attr_str(state, "end_time").unwrap_or_default(),
        "description": attr_str(state, "description").unwrap_or("Managed by Hemmer"),
        "services": services,
    })
}

/// Flatten an API response object into attribute state.
fn flatten(remote: &Value) -> Value {
    let services: Vec<Value> = remote
        .get("services")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|s| s.get("id"))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    json!({
        "id": remote.get("id").cloned().unwrap_or(Value::Null),
        "start_time": remote.get("start_time").cloned().unwrap_or(Value::Null),
        "end_time": remote.get("end_time").cloned().unwrap_or(Value::Null),
        "description": remote.get("description").cloned().unwrap_or(Value::Null),
        "services": services,
    })
}

/// Create a maintenance window.
pub async fn create(client: &Client, planned: &Value) -> Result<Value, ProviderError> {
    info!("creating maintenance window");
    let body = json!({"maintenance_window": build(planned)});
    let created = client
        .post("/maintenance_windows", &body)
        .await
        .map_err(ProviderError::from)?;
    Ok(flatten(created.get("maintenance_window").unwrap_or(&created)))
}

/// Read a maintenance window, returning `Null` when it no longer exists.
pub async fn read(client: &Client, state: &Value) -> Result<Value, ProviderError> {
    let id = require_attr_str(state, "id")?;
    info!(id, "reading maintenance window");

    let path = format!("/maintenance_windows/{}", id);
    let result = retry(RETRY_TIME, || {
        let path = &path;
        async move {
            client.get(path).await.map_err(|err| {
                if err.is_bad_request() || err.is_not_found() {
                    Retry::Permanent(err)
                } else {
                    err.into_retry()
                }
            })
        }
    })
    .await;

    match result {
        Ok(body) => Ok(flatten(body.get("maintenance_window").unwrap_or(&body))),
        Err(err) if err.is_not_found() => Ok(Value::Null),
        Err(err) => Err(err.into()),
    }
}

/// Update a maintenance window in place.
pub async fn update(client: &Client, prior: &Value, planned: &Value) -> Result<Value, ProviderError> {
    let id = attr_str(planned, "id")
        .filter(|id| !id.is_empty())
        .map(Ok)
        .unwrap_or_else(|| require_attr_str(prior, "id"))?;
    info!(id, "updating maintenance window");

    let body = json!({"maintenance_window": build(planned)});
    let updated = client
        .put(&format!("/maintenance_windows/{}", id), &body)
        .await
        .map_err(ProviderError::from)?;
    Ok(flatten(updated.get("maintenance_window").unwrap_or(&updated)))
}

/// Delete a maintenance window.
///
/// The API answers 405 for windows that have already ended and 404 for
/// windows that are already gone; both leave nothing to manage.
pub async fn delete(client: &Client, state: &Value) -> Result<(), ProviderError> {
    let id = require_attr_str(state, "id")?;
    info!(id, "deleting maintenance window");
    match client.delete(&format!("/maintenance_windows/{}", id)).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() || err.status_code() == Some(405) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Import a maintenance window by its id.
pub async fn import(client: &Client, id: &str) -> Result<Value, ProviderError> {
    let body = retry(RETRY_TIME, || async move {
        client
            .get(&format!("/maintenance_windows/{}", id))
            .await
            .map_err(ApiError::into_retry)
    })
    .await?;
    Ok(flatten(body.get("maintenance_window").unwrap_or(&body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_rfc3339() {
        let config = json!({
            "start_time": "2026-09-01T18:00:00-05:00",
            "end_time": "2026-09-01T20:00:00-05:00",
            "services": ["P1SVC"],
        });
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_timestamps() {
        let config = json!({
            "start_time": "next tuesday",
            "end_time": "2026-09-01T20:00:00Z",
            "services": ["P1SVC"],
        });
        let diagnostics = validate(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("start_time"));
    }

    #[test]
    fn test_build_wraps_services_as_references() {
        let state = json!({
            "start_time": "2026-09-01T18:00:00Z",
            "end_time": "2026-09-01T20:00:00Z",
            "services": ["P1SVC", "P2SVC"],
        });
        let body = build(&state);
        assert_eq!(body["services"][0]["id"], "P1SVC");
        assert_eq!(body["services"][0]["type"], "service_reference");
        assert_eq!(body["services"][1]["id"], "P2SVC");
        assert_eq!(body["description"], "Managed by Hemmer");
    }

    #[test]
    fn test_flatten_unwraps_service_references() {
        let remote = json!({
            "id": "PW1MWIN",
            "start_time": "2026-09-01T18:00:00Z",
            "end_time": "2026-09-01T20:00:00Z",
            "description": "Managed by Hemmer",
            "services": [
                {"id": "P1SVC", "type": "service_reference"},
                {"id": "P2SVC", "type": "service_reference"},
            ],
        });
        let state = flatten(&remote);
        assert_eq!(state["id"], "PW1MWIN");
        assert_eq!(state["services"], json!(["P1SVC", "P2SVC"]));
    }
}
