//! The `pagerduty_business_service` resource.
//!
//! Business services model top-level services that depend on technical
//! services, managed through the `/business_services` endpoints.

use serde_json::{json, Value};
use tracing::info;

use crate::client::{retry, ApiError, Client, Retry, RETRY_TIME_LONG};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::util::{attr_str, require_attr_str};

/// Resource type name.
pub const TYPE_NAME: &str = "pagerduty_business_service";

/// Schema for the business service resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("html_url", Attribute::computed_string())
        .with_attribute("self", Attribute::computed_string())
        .with_attribute("summary", Attribute::computed_string())
        .with_attribute(
            "description",
            Attribute::optional_computed_string().with_default(json!("Managed by Hemmer")),
        )
        .with_attribute(
            "type",
            Attribute::optional_computed_string().with_default(json!("business_service")),
        )
        .with_attribute("point_of_contact", Attribute::optional_string())
        .with_attribute("team", Attribute::optional_string())
}

/// Build the API request body from attribute state.
fn build(state: &Value) -> Value {
    let mut body = json!({
        "name": attr_str(state, "name").unwrap_or_default(),
        "description": attr_str(state, "description").unwrap_or("Managed by Hemmer"),
        "type": attr_str(state, "type").unwrap_or("business_service"),
    });
    if let Some(poc) = attr_str(state, "point_of_contact") {
        body["point_of_contact"] = json!(poc);
    }
    if let Some(team) = attr_str(state, "team") {
        body["team"] = json!({"id": team});
    }
    body
}

/// Flatten an API response object into attribute state.
fn flatten(remote: &Value) -> Value {
    let mut state = json!({
        "id": remote.get("id").cloned().unwrap_or(Value::Null),
        "name": remote.get("name").cloned().unwrap_or(Value::Null),
        "html_url": remote.get("html_url").cloned().unwrap_or(Value::Null),
        "self": remote.get("self").cloned().unwrap_or(Value::Null),
        "summary": remote.get("summary").cloned().unwrap_or(Value::Null),
        "description": remote.get("description").cloned().unwrap_or(Value::Null),
        "type": remote.get("type").cloned().unwrap_or(Value::Null),
        "point_of_contact": Value::Null,
        "team": Value::Null,
    });
    if let Some(poc) = attr_str(remote, "point_of_contact") {
        if !poc.is_empty() {
            state["point_of_contact"] = json!(poc);
        }
    }
    if let Some(team_id) = remote.get("team").and_then(|t| t.get("id")) {
        state["team"] = team_id.clone();
    }
    state
}

/// Fetch a business service by id, retrying while the API catches up
/// with a recent write.
async fn get(client: &Client, id: &str) -> Result<Value, ProviderError> {
    let path = format!("/business_services/{}", id);
    let body = retry(RETRY_TIME_LONG, || {
        let path = &path;
        async move {
            // Reads right after create can 404 until replication settles,
            // so only a bad request is terminal here.
            client.get(path).await.map_err(|err| {
                if err.is_bad_request() {
                    Retry::Permanent(err)
                } else {
                    Retry::Transient(err)
                }
            })
        }
    })
    .await?;
    Ok(flatten(body.get("business_service").unwrap_or(&body)))
}

/// Create a business service and return the state read back from the API.
pub async fn create(client: &Client, planned: &Value) -> Result<Value, ProviderError> {
    let name = require_attr_str(planned, "name")?;
    info!(name, "creating business service");

    let body = json!({"business_service": build(planned)});
    let created = retry(RETRY_TIME_LONG, || {
        let body = &body;
        async move {
            client
                .post("/business_services", body)
                .await
                .map_err(ApiError::into_retry)
        }
    })
    .await?;

    let id = created
        .get("business_service")
        .and_then(|bs| bs.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderError::Internal("create response missing business service id".to_string())
        })?;
    get(client, id).await
}

/// Read a business service, returning `Null` when it no longer exists.
pub async fn read(client: &Client, state: &Value) -> Result<Value, ProviderError> {
    let id = require_attr_str(state, "id")?;
    info!(id, "reading business service");
    match get(client, id).await {
        Ok(state) => Ok(state),
        Err(ProviderError::NotFound(_)) => Ok(Value::Null),
        Err(err) => Err(err),
    }
}

/// Update a business service in place.
pub async fn update(client: &Client, prior: &Value, planned: &Value) -> Result<Value, ProviderError> {
    let id = attr_str(planned, "id")
        .filter(|id| !id.is_empty())
        .map(Ok)
        .unwrap_or_else(|| require_attr_str(prior, "id"))?;
    info!(id, "updating business service");

    let body = json!({"business_service": build(planned)});
    let updated = client
        .put(&format!("/business_services/{}", id), &body)
        .await
        .map_err(ProviderError::from)?;
    Ok(flatten(updated.get("business_service").unwrap_or(&updated)))
}

/// Delete a business service.
pub async fn delete(client: &Client, state: &Value) -> Result<(), ProviderError> {
    let id = require_attr_str(state, "id")?;
    info!(id, "deleting business service");
    client
        .delete(&format!("/business_services/{}", id))
        .await
        .map_err(ProviderError::from)
}

/// Import a business service by its id.
pub async fn import(client: &Client, id: &str) -> Result<Value, ProviderError> {
    get(client, id).await
}
