//! The `pagerduty_extension_schema` data source.
//!
//! Looks up an extension schema by label through `/extension_schemas`.
//! The match is case-insensitive; the API exposes only a handful of
//! schemas so the whole listing is scanned.

use serde_json::{json, Value};
use tracing::info;

use crate::client::{retry, Client, Retry, RETRY_TIME};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::util::require_attr_str;

/// Data source type name.
pub const TYPE_NAME: &str = "pagerduty_extension_schema";

/// Schema for the extension schema data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("type", Attribute::computed_string())
}

/// Find an extension schema by label.
pub async fn read(client: &Client, config: &Value) -> Result<Value, ProviderError> {
    let name = require_attr_str(config, "name")?;
    info!(name, "reading extension schema");

    let schemas = retry(RETRY_TIME, || async move {
        client
            .list_all("/extension_schemas", &[], "extension_schemas")
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

    let found = schemas
        .iter()
        .find(|schema| {
            schema
                .get("label")
                .and_then(Value::as_str)
                .is_some_and(|label| label.eq_ignore_ascii_case(name))
        })
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Unable to locate any extension schema with the name: {}",
                name
            ))
        })?;

    Ok(json!({
        "id": found.get("id").cloned().unwrap_or(Value::Null),
        "name": found.get("label").cloned().unwrap_or(Value::Null),
        "type": found.get("type").cloned().unwrap_or(Value::Null),
    }))
}
