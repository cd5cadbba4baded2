//! The `pagerduty_incident_custom_field_option` resource.
//!
//! Fixed-option custom fields enumerate their allowed values through
//! the `/incidents/custom_fields/{field}/field_options` endpoints. The
//! API has no per-option read, so reads list the field's options and
//! search by id.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::{retry, Client, Retry, RETRY_TIME};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::util::{attr_str, require_attr_str};

/// Resource type name.
pub const TYPE_NAME: &str = "pagerduty_incident_custom_field_option";

/// Schema for the custom field option resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("data_type", Attribute::required_string())
        .with_attribute("field", Attribute::required_string())
        .with_attribute("value", Attribute::required_string())
}

/// Validate the `data_type` attribute. Options only exist on string fields.
pub fn validate(config: &Value) -> Vec<Diagnostic> {
    match attr_str(config, "data_type") {
        Some("string") | None => Vec::new(),
        Some(other) => vec![
            Diagnostic::error(format!("Unknown data_type {}", other))
                .with_detail("Field options are only supported for string fields")
                .with_attribute("data_type"),
        ],
    }
}

/// Build the API request body from attribute state.
fn build(state: &Value) -> Value {
    json!({
        "data": {
            "data_type": attr_str(state, "data_type").unwrap_or_default(),
            "value": attr_str(state, "value").unwrap_or_default(),
        }
    })
}

/// Flatten an API response object into attribute state.
fn flatten(field_id: &str, remote: &Value) -> Value {
    json!({
        "id": remote.get("id").cloned().unwrap_or(Value::Null),
        "field": field_id,
        "data_type": remote
            .get("data")
            .and_then(|d| d.get("data_type"))
            .cloned()
            .unwrap_or(Value::Null),
        "value": remote
            .get("data")
            .and_then(|d| d.get("value"))
            .cloned()
            .unwrap_or(Value::Null),
    })
}

/// List a field's options and return the one with the given id, if any.
async fn find_option(
    client: &Client,
    field_id: &str,
    id: &str,
) -> Result<Option<Value>, ProviderError> {
    let path = format!("/incidents/custom_fields/{}/field_options", field_id);
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
        Ok(body) => {
            let found = body
                .get("field_options")
                .and_then(Value::as_array)
                .and_then(|options| {
                    options
                        .iter()
                        .find(|o| o.get("id").and_then(Value::as_str) == Some(id))
                })
                .cloned();
            Ok(found)
        }
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Create a field option.
pub async fn create(client: &Client, planned: &Value) -> Result<Value, ProviderError> {
    let field_id = require_attr_str(planned, "field")?;
    info!(field_id, "creating incident custom field option");

    let path = format!("/incidents/custom_fields/{}/field_options", field_id);
    let body = json!({"field_option": build(planned)});
    let created = retry(RETRY_TIME, || {
        let path = &path;
        let body = &body;
        async move {
            client.post(path, body).await.map_err(|err| {
                if err.is_bad_request() {
                    Retry::Permanent(err)
                } else {
                    err.into_retry()
                }
            })
        }
    })
    .await?;

    Ok(flatten(
        field_id,
        created.get("field_option").unwrap_or(&created),
    ))
}

/// Read a field option, returning `Null` when it or its field is gone.
pub async fn read(client: &Client, state: &Value) -> Result<Value, ProviderError> {
    let field_id = require_attr_str(state, "field")?;
    let id = require_attr_str(state, "id")?;
    info!(id, field_id, "reading incident custom field option");

    match find_option(client, field_id, id).await? {
        Some(option) => Ok(flatten(field_id, &option)),
        None => {
            warn!(id, "unable to locate any field option with this id");
            Ok(Value::Null)
        }
    }
}

/// Update a field option, returning `Null` when it no longer exists.
pub async fn update(client: &Client, prior: &Value, planned: &Value) -> Result<Value, ProviderError> {
    let field_id = require_attr_str(planned, "field")?;
    let id = attr_str(planned, "id")
        .filter(|id| !id.is_empty())
        .map(Ok)
        .unwrap_or_else(|| require_attr_str(prior, "id"))?;
    info!(id, field_id, "updating incident custom field option");

    let mut option = build(planned);
    option["id"] = json!(id);
    let body = json!({"field_option": option});
    match client
        .put(
            &format!("/incidents/custom_fields/{}/field_options/{}", field_id, id),
            &body,
        )
        .await
    {
        Ok(updated) => Ok(flatten(field_id, updated.get("field_option").unwrap_or(&updated))),
        Err(err) if err.is_not_found() => Ok(Value::Null),
        Err(err) => Err(err.into()),
    }
}

/// Delete a field option, tolerating one that is already gone.
pub async fn delete(client: &Client, state: &Value) -> Result<(), ProviderError> {
    let field_id = require_attr_str(state, "field")?;
    let id = require_attr_str(state, "id")?;
    info!(id, field_id, "deleting incident custom field option");

    match client
        .delete(&format!(
            "/incidents/custom_fields/{}/field_options/{}",
            field_id, id
        ))
        .await
    {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_restricts_data_type() {
        assert!(validate(&json!({"data_type": "string"})).is_empty());
        let diagnostics = validate(&json!({"data_type": "integer"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Unknown data_type integer"));
    }

    #[test]
    fn test_build_request_body() {
        let body = build(&json!({
            "field": "PF1ELD",
            "data_type": "string",
            "value": "production",
        }));
        assert_eq!(body["data"]["data_type"], "string");
        assert_eq!(body["data"]["value"], "production");
    }

    #[test]
    fn test_flatten_response() {
        let state = flatten(
            "PF1ELD",
            &json!({
                "id": "POPT1",
                "type": "field_option",
                "data": {"data_type": "string", "value": "production"},
            }),
        );
        assert_eq!(state["id"], "POPT1");
        assert_eq!(state["field"], "PF1ELD");
        assert_eq!(state["data_type"], "string");
        assert_eq!(state["value"], "production");
    }
}
