//! The `pagerduty_service_dependency` resource.
//!
//! Dependencies between business and technical services are managed
//! through the `/service_dependencies/associate` and `/disassociate`
//! endpoints. Both mutate shared relationship state on the PagerDuty
//! side, so callers serialize them through a provider-wide lock. There
//! is no per-dependency read; reads list the dependent service's
//! relationships and search by id.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::{retry_with_interval, Client, Retry, RETRY_TIME_LONG};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::util::attr_str;

/// Resource type name.
pub const TYPE_NAME: &str = "pagerduty_service_dependency";

/// Polling interval while listing dependencies, per the API's
/// rate-limiting guidance.
const LIST_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Schema for the service dependency resource.
pub fn schema() -> Schema {
    let service_ref = Block::new()
        .with_attribute("id", Attribute::required_string().with_force_new())
        .with_attribute("type", Attribute::required_string().with_force_new());

    let dependency = Block::new()
        .with_attribute("type", Attribute::optional_computed_string())
        .with_block(
            "supporting_service",
            NestedBlock::list(service_ref.clone()).with_min_items(1),
        )
        .with_block(
            "dependent_service",
            NestedBlock::list(service_ref).with_min_items(1),
        );

    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_block(
            "dependency",
            NestedBlock::list(dependency)
                .with_min_items(1)
                .with_max_items(1)
                .with_force_new(),
        )
}

/// The API answers with `*_reference` types but expects the plain kind
/// in requests and configuration.
fn convert_reference_type(s: &str) -> &str {
    match s {
        "business_service_reference" => "business_service",
        "technical_service_reference" => "service",
        other => other,
    }
}

/// Pull `(id, type)` out of the first element of a service block.
fn service_ref(dependency: &Value, name: &str) -> Result<(String, String), ProviderError> {
    let entry = dependency
        .get(name)
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .ok_or_else(|| {
            ProviderError::Validation(format!("dependency block is missing {}", name))
        })?;
    let id = attr_str(entry, "id").unwrap_or_default().to_string();
    let kind = attr_str(entry, "type").unwrap_or_default().to_string();
    Ok((id, kind))
}

/// Build the relationship request body from attribute state.
fn build(state: &Value) -> Result<Value, ProviderError> {
    let dependency = state
        .get("dependency")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .ok_or_else(|| {
            ProviderError::Validation("exactly one dependency block is required".to_string())
        })?;

    let (sup_id, sup_type) = service_ref(dependency, "supporting_service")?;
    let (dep_id, dep_type) = service_ref(dependency, "dependent_service")?;

    let mut relationship = json!({
        "supporting_service": {"id": sup_id, "type": sup_type},
        "dependent_service": {"id": dep_id, "type": dep_type},
    });
    if let Some(id) = attr_str(state, "id").filter(|id| !id.is_empty()) {
        relationship["id"] = json!(id);
    }
    if let Some(kind) = attr_str(dependency, "type").filter(|t| !t.is_empty()) {
        relationship["type"] = json!(kind);
    }
    Ok(relationship)
}

/// Flatten a relationship from the API into attribute state.
fn flatten(relationship: &Value) -> Result<Value, ProviderError> {
    let reference = |name: &str| -> Result<Value, ProviderError> {
        let obj = relationship.get(name).ok_or_else(|| {
            ProviderError::Internal(format!("relationship is missing {}", name))
        })?;
        Ok(json!([{
            "id": obj.get("id").cloned().unwrap_or(Value::Null),
            "type": convert_reference_type(attr_str(obj, "type").unwrap_or_default()),
        }]))
    };

    Ok(json!({
        "id": relationship.get("id").cloned().unwrap_or(Value::Null),
        "dependency": [{
            "type": relationship.get("type").cloned().unwrap_or(Value::Null),
            "supporting_service": reference("supporting_service")?,
            "dependent_service": reference("dependent_service")?,
        }],
    }))
}

/// List a service's dependencies and return the relationship with the
/// given id, if any. The listing endpoint depends on the service kind.
async fn find_relationship(
    client: &Client,
    id: &str,
    service_id: &str,
    service_type: &str,
) -> Result<Option<Value>, ProviderError> {
    let path = match service_type {
        "service" | "technical_service" | "technical_service_reference" => {
            format!("/service_dependencies/technical_services/{}", service_id)
        }
        "business_service" | "business_service_reference" => {
            format!("/service_dependencies/business_services/{}", service_id)
        }
        other => {
            return Err(ProviderError::Validation(format!(
                "unknown service type {:?} for dependency lookup",
                other
            )))
        }
    };

    let body = retry_with_interval(RETRY_TIME_LONG, LIST_RETRY_INTERVAL, || {
        let path = &path;
        async move {
            client.get(path).await.map_err(|err| {
                if err.is_bad_request() {
                    Retry::Permanent(err)
                } else {
                    Retry::Transient(err)
                }
            })
        }
    })
    .await
    .map_err(ProviderError::from)?;

    let found = body
        .get("relationships")
        .and_then(Value::as_array)
        .and_then(|rels| {
            rels.iter()
                .find(|rel| rel.get("id").and_then(Value::as_str) == Some(id))
        })
        .cloned();
    Ok(found)
}

/// Associate the dependency. Holds `lock` across the API call.
pub async fn create(
    client: &Client,
    lock: &Mutex<()>,
    planned: &Value,
) -> Result<Value, ProviderError> {
    let relationship = build(planned)?;
    info!("associating service dependency");

    let body = json!({"relationships": [relationship]});
    let response = {
        let _guard = lock.lock().await;
        client
            .post("/service_dependencies/associate", &body)
            .await
            .map_err(ProviderError::from)?
    };

    let relationship = response
        .get("relationships")
        .and_then(Value::as_array)
        .and_then(|rels| rels.first())
        .ok_or_else(|| {
            ProviderError::Internal("associate response carried no relationships".to_string())
        })?;
    flatten(relationship)
}

/// Read the dependency, returning `Null` when it no longer exists.
pub async fn read(client: &Client, state: &Value) -> Result<Value, ProviderError> {
    let relationship = build(state)?;
    let id = attr_str(state, "id").unwrap_or_default();
    info!(id, "reading service dependency");

    let dep_id = relationship["dependent_service"]["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let dep_type = relationship["dependent_service"]["type"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    match find_relationship(client, id, &dep_id, &dep_type).await? {
        Some(found) => flatten(&found),
        None => Ok(Value::Null),
    }
}

/// Updates never reach the API: every dependency attribute forces
/// replacement.
pub async fn update(
    _client: &Client,
    _prior: &Value,
    planned: &Value,
) -> Result<Value, ProviderError> {
    warn!("update for service dependency has no effect");
    Ok(planned.clone())
}

/// Disassociate the dependency. Holds `lock` across the API call.
pub async fn delete(
    client: &Client,
    lock: &Mutex<()>,
    state: &Value,
) -> Result<(), ProviderError> {
    let relationship = build(state)?;
    let id = attr_str(state, "id").unwrap_or_default();
    info!(id, "disassociating service dependency");

    let dep_id = relationship["dependent_service"]["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let dep_type = relationship["dependent_service"]["type"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let Some(mut found) = find_relationship(client, id, &dep_id, &dep_type).await? else {
        // Already gone.
        return Ok(());
    };

    // Disassociate expects request-side type names.
    for name in ["supporting_service", "dependent_service"] {
        if let Some(kind) = found
            .get(name)
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
        {
            let converted = convert_reference_type(kind).to_string();
            found[name]["type"] = json!(converted);
        }
    }

    let body = json!({"relationships": [found]});
    let _guard = lock.lock().await;
    client
        .post("/service_dependencies/disassociate", &body)
        .await
        .map_err(ProviderError::from)?;
    Ok(())
}

/// Import a dependency from a composite id of the form
/// `<supporting_service_id>.<supporting_service_type>.<dependency_id>`.
pub async fn import(client: &Client, composite: &str) -> Result<Value, ProviderError> {
    let parts: Vec<&str> = composite.split('.').collect();
    let [sup_id, sup_type, id] = parts[..] else {
        return Err(ProviderError::Validation(
            "expecting an import id formed as \
             '<supporting_service_id>.<supporting_service_type>.<dependency_id>'"
                .to_string(),
        ));
    };

    let found = find_relationship(client, id, sup_id, sup_type)
        .await?
        .ok_or_else(|| {
            ProviderError::NotFound(format!("no service dependency found with id {:?}", id))
        })?;
    flatten(&found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_state() -> Value {
        json!({
            "id": "D1EPND",
            "dependency": [{
                "type": "service_dependency",
                "supporting_service": [{"id": "PT4KHLK", "type": "business_service"}],
                "dependent_service": [{"id": "P1SVC", "type": "service"}],
            }],
        })
    }

    #[test]
    fn test_build_relationship() {
        let relationship = build(&sample_state()).unwrap();
        assert_eq!(relationship["id"], "D1EPND");
        assert_eq!(relationship["supporting_service"]["id"], "PT4KHLK");
        assert_eq!(relationship["supporting_service"]["type"], "business_service");
        assert_eq!(relationship["dependent_service"]["id"], "P1SVC");
    }

    #[test]
    fn test_build_requires_dependency_block() {
        let err = build(&json!({"id": "D1EPND", "dependency": []})).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_flatten_converts_reference_types() {
        let relationship = json!({
            "id": "D1EPND",
            "type": "service_dependency",
            "supporting_service": {"id": "PT4KHLK", "type": "business_service_reference"},
            "dependent_service": {"id": "P1SVC", "type": "technical_service_reference"},
        });
        let state = flatten(&relationship).unwrap();
        assert_eq!(state["id"], "D1EPND");
        let dependency = &state["dependency"][0];
        assert_eq!(
            dependency["supporting_service"][0]["type"],
            "business_service"
        );
        assert_eq!(dependency["dependent_service"][0]["type"], "service");
    }

    #[test]
    fn test_convert_reference_type() {
        assert_eq!(
            convert_reference_type("business_service_reference"),
            "business_service"
        );
        assert_eq!(convert_reference_type("technical_service_reference"), "service");
        assert_eq!(convert_reference_type("service"), "service");
    }

    #[test]
    fn test_schema_forces_replacement() {
        let schema = schema();
        let dependency = &schema.block.blocks["dependency"];
        assert!(dependency.force_new);
        assert_eq!(dependency.min_items, 1);
        assert_eq!(dependency.max_items, 1);
        let supporting = &dependency.block.blocks["supporting_service"];
        assert!(supporting.block.attributes["id"].force_new);
    }
}
