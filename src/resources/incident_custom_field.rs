//! The `pagerduty_incident_custom_field` resource.
//!
//! Custom fields attach typed metadata to incidents, managed through
//! the `/incidents/custom_fields` endpoints.

use serde_json::{json, Value};
use tracing::info;

use crate::client::{retry, Client, Retry, RETRY_TIME};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::util::{attr_str, require_attr_str};

/// Resource type name.
pub const TYPE_NAME: &str = "pagerduty_incident_custom_field";

/// Data types the API accepts for a custom field.
const DATA_TYPES: &[&str] = &["string", "integer", "float", "boolean", "url", "datetime"];

/// Field types the API accepts for a custom field.
const FIELD_TYPES: &[&str] = &[
    "single_value",
    "single_value_fixed",
    "multi_value",
    "multi_value_fixed",
];

/// Schema for the incident custom field resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("display_name", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("default_value", Attribute::optional_string())
        .with_attribute("data_type", Attribute::required_string())
        .with_attribute("field_type", Attribute::required_string())
}

/// Validate the `data_type` and `field_type` enumerations.
pub fn validate(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if let Some(data_type) = attr_str(config, "data_type") {
        if !DATA_TYPES.contains(&data_type) {
            diagnostics.push(
                Diagnostic::error(format!("Unknown data_type {}", data_type))
                    .with_attribute("data_type"),
            );
        }
    }
    if let Some(field_type) = attr_str(config, "field_type") {
        if !FIELD_TYPES.contains(&field_type) {
            diagnostics.push(
                Diagnostic::error(format!("Unknown field_type {}", field_type))
                    .with_attribute("field_type"),
            );
        }
    }
    diagnostics
}

/// Build the API request body from attribute state.
fn build(state: &Value) -> Value {
    let mut body = json!({
        "name": attr_str(state, "name").unwrap_or_default(),
        "display_name": attr_str(state, "display_name").unwrap_or_default(),
        "data_type": attr_str(state, "data_type").unwrap_or_default(),
        "field_type": attr_str(state, "field_type").unwrap_or_default(),
    });
    if let Some(description) = attr_str(state, "description") {
        body["description"] = json!(description);
    }
    // The API only accepts defaults on string fields.
    if attr_str(state, "data_type") == Some("string") {
        if let Some(default_value) = attr_str(state, "default_value") {
            body["default_value"] = json!(default_value);
        }
    }
    body
}

/// Flatten an API response object into attribute state.
///
/// Defaults come back typed; the string attribute holds scalar defaults
/// verbatim and multi-value defaults as their JSON encoding.
fn flatten(remote: &Value) -> Value {
    let mut state = json!({
        "id": remote.get("id").cloned().unwrap_or(Value::Null),
        "name": remote.get("name").cloned().unwrap_or(Value::Null),
        "display_name": remote.get("display_name").cloned().unwrap_or(Value::Null),
        "description": remote.get("description").cloned().unwrap_or(Value::Null),
        "data_type": remote.get("data_type").cloned().unwrap_or(Value::Null),
        "field_type": remote.get("field_type").cloned().unwrap_or(Value::Null),
        "default_value": Value::Null,
    });
    if let Some(default_value) = remote.get("default_value").filter(|v| !v.is_null()) {
        state["default_value"] = match default_value {
            Value::String(s) => json!(s),
            Value::Array(_) => json!(default_value.to_string()),
            other => json!(other.to_string()),
        };
    }
    state
}

/// Fetch a custom field by id.
///
/// `retry_not_found` covers the read-after-write lag right after create,
/// when the new field can 404 for a while.
async fn get(client: &Client, id: &str, retry_not_found: bool) -> Result<Value, ProviderError> {
    let path = format!("/incidents/custom_fields/{}", id);
    let body = retry(RETRY_TIME, || {
        let path = &path;
        async move {
            client.get(path).await.map_err(|err| {
                if err.is_bad_request() {
                    Retry::Permanent(err)
                } else if err.is_not_found() {
                    if retry_not_found {
                        Retry::Transient(err)
                    } else {
                        Retry::Permanent(err)
                    }
                } else {
                    err.into_retry()
                }
            })
        }
    })
    .await?;
    Ok(flatten(body.get("field").unwrap_or(&body)))
}

/// Create a custom field and return the state read back from the API.
pub async fn create(client: &Client, planned: &Value) -> Result<Value, ProviderError> {
    let name = require_attr_str(planned, "name")?;
    info!(name, "creating incident custom field");

    let body = json!({"field": build(planned)});
    let created = retry(RETRY_TIME, || {
        let body = &body;
        async move {
            client.post("/incidents/custom_fields", body).await.map_err(|err| {
                if err.is_bad_request() {
                    Retry::Permanent(err)
                } else {
                    err.into_retry()
                }
            })
        }
    })
    .await?;

    let id = created
        .get("field")
        .and_then(|f| f.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Internal("create response missing field id".to_string()))?;
    get(client, id, true).await
}

/// Read a custom field, returning `Null` when it no longer exists.
pub async fn read(client: &Client, state: &Value) -> Result<Value, ProviderError> {
    let id = require_attr_str(state, "id")?;
    info!(id, "reading incident custom field");
    match get(client, id, false).await {
        Ok(state) => Ok(state),
        Err(ProviderError::NotFound(_)) => Ok(Value::Null),
        Err(err) => Err(err),
    }
}

/// Update a custom field, returning `Null` when it no longer exists.
pub async fn update(client: &Client, prior: &Value, planned: &Value) -> Result<Value, ProviderError> {
    let id = attr_str(planned, "id")
        .filter(|id| !id.is_empty())
        .map(Ok)
        .unwrap_or_else(|| require_attr_str(prior, "id"))?;
    info!(id, "updating incident custom field");

    let body = json!({"field": build(planned)});
    match client
        .put(&format!("/incidents/custom_fields/{}", id), &body)
        .await
    {
        Ok(updated) => Ok(flatten(updated.get("field").unwrap_or(&updated))),
        Err(err) if err.is_not_found() => Ok(Value::Null),
        Err(err) => Err(err.into()),
    }
}

/// Delete a custom field, tolerating one that is already gone.
pub async fn delete(client: &Client, state: &Value) -> Result<(), ProviderError> {
    let id = require_attr_str(state, "id")?;
    info!(id, "deleting incident custom field");
    match client
        .delete(&format!("/incidents/custom_fields/{}", id))
        .await
    {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Import a custom field by its id.
pub async fn import(client: &Client, id: &str) -> Result<Value, ProviderError> {
    get(client, id, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_known_types() {
        let config = json!({
            "name": "environment",
            "display_name": "Environment",
            "data_type": "string",
            "field_type": "single_value",
        });
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_types() {
        let config = json!({
            "data_type": "uuid",
            "field_type": "many_values",
        });
        let diagnostics = validate(&config);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].summary.contains("Unknown data_type uuid"));
        assert!(diagnostics[1].summary.contains("Unknown field_type many_values"));
    }

    #[test]
    fn test_build_only_defaults_strings() {
        let body = build(&json!({
            "name": "environment",
            "display_name": "Environment",
            "data_type": "string",
            "field_type": "single_value",
            "default_value": "production",
        }));
        assert_eq!(body["default_value"], "production");

        let body = build(&json!({
            "name": "severity_score",
            "display_name": "Severity Score",
            "data_type": "integer",
            "field_type": "single_value",
            "default_value": "5",
        }));
        assert!(body.get("default_value").is_none());
    }

    #[test]
    fn test_flatten_stringifies_typed_defaults() {
        let state = flatten(&json!({
            "id": "PF1ELD",
            "name": "severity_score",
            "display_name": "Severity Score",
            "data_type": "integer",
            "field_type": "single_value",
            "default_value": 5,
        }));
        assert_eq!(state["default_value"], "5");

        let state = flatten(&json!({
            "id": "PF1ELD",
            "name": "regions",
            "display_name": "Regions",
            "data_type": "string",
            "field_type": "multi_value",
            "default_value": ["us", "eu"],
        }));
        assert_eq!(state["default_value"], r#"["us","eu"]"#);
    }
}
