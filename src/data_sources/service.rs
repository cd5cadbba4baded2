//! The `pagerduty_service` data source.
//!
//! Looks up a technical service by exact name through the paginated
//! `/services` listing.

use serde_json::{json, Value};
use tracing::info;

use crate::client::{retry, Client, Retry, RETRY_TIME};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::util::require_attr_str;

/// Data source type name.
pub const TYPE_NAME: &str = "pagerduty_service";

/// Schema for the service data source.
pub fn schema() -> Schema {
    let team_type = AttributeType::object(
        [
            ("id".to_string(), AttributeType::String),
            ("name".to_string(), AttributeType::String),
        ]
        .into_iter()
        .collect(),
    );
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("auto_resolve_timeout", Attribute::computed_int64())
        .with_attribute("acknowledgement_timeout", Attribute::computed_int64())
        .with_attribute("alert_creation", Attribute::computed_string())
        .with_attribute("description", Attribute::computed_string())
        .with_attribute("escalation_policy", Attribute::computed_string())
        .with_attribute("type", Attribute::computed_string())
        .with_attribute(
            "teams",
            Attribute::computed(AttributeType::list(team_type))
                .with_description("The set of teams associated with the service"),
        )
}

/// Flatten a service object into attribute state.
fn flatten(service: &Value) -> Value {
    let teams: Vec<Value> = service
        .get("teams")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|team| {
                    json!({
                        "id": team.get("id").cloned().unwrap_or(Value::Null),
                        "name": team.get("name").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    json!({
        "id": service.get("id").cloned().unwrap_or(Value::Null),
        "name": service.get("name").cloned().unwrap_or(Value::Null),
        "type": service.get("type").cloned().unwrap_or(Value::Null),
        "auto_resolve_timeout": service.get("auto_resolve_timeout").cloned().unwrap_or(Value::Null),
        "acknowledgement_timeout": service
            .get("acknowledgement_timeout")
            .cloned()
            .unwrap_or(Value::Null),
        "alert_creation": service.get("alert_creation").cloned().unwrap_or(Value::Null),
        "description": service.get("description").cloned().unwrap_or(Value::Null),
        "escalation_policy": service
            .get("escalation_policy")
            .and_then(|ep| ep.get("id"))
            .cloned()
            .unwrap_or(Value::Null),
        "teams": teams,
    })
}

/// Find a service by exact name.
pub async fn read(client: &Client, config: &Value) -> Result<Value, ProviderError> {
    let name = require_attr_str(config, "name")?;
    info!(name, "reading service");

    let services = retry(RETRY_TIME, || async move {
        client
            .list_all("/services", &[("query", name)], "services")
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

    let found = services
        .iter()
        .find(|service| service.get("name").and_then(Value::as_str) == Some(name))
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Unable to locate any service with the name: {}",
                name
            ))
        })?;
    Ok(flatten(found))
}
