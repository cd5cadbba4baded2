//! The PagerDuty provider.
//!
//! [`PagerDutyProvider`] wires the resource and data source handlers
//! into the [`ProviderService`] surface: it owns the configured API
//! client, dispatches operations by type name, and computes plans from
//! the declared schemas.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::client::Client;
use crate::config::Config;
use crate::data_sources;
use crate::error::ProviderError;
use crate::resources;
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{AttributeChange, ImportedResource, PlanResult};
use crate::validation::validate;

/// Provider for the PagerDuty REST API.
pub struct PagerDutyProvider {
    /// Set once a `Configure` call succeeds.
    client: RwLock<Option<Arc<Client>>>,
    /// Serializes service dependency associate/disassociate calls.
    dependency_lock: Mutex<()>,
}

impl PagerDutyProvider {
    /// Create an unconfigured provider.
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            dependency_lock: Mutex::new(()),
        }
    }

    /// Schema for the provider configuration block.
    fn provider_config_schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "api_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("REST API token. Falls back to PAGERDUTY_TOKEN."),
            )
            .with_attribute(
                "api_url_override",
                Attribute::optional_string()
                    .with_description("Overrides the regional API endpoint."),
            )
            .with_attribute(
                "service_region",
                Attribute::optional_string()
                    .with_description("Service region, \"us\" (default) or \"eu\"."),
            )
            .with_attribute("skip_credentials_validation", Attribute::optional_bool())
            .with_attribute("insecure_tls", Attribute::optional_bool())
    }

    /// The configured client, or an error when `Configure` has not run.
    async fn client(&self) -> Result<Arc<Client>, ProviderError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| {
                ProviderError::FailedPrecondition("provider is not configured".to_string())
            })
    }

    fn resource_schema(resource_type: &str) -> Result<Schema, ProviderError> {
        match resource_type {
            resources::business_service::TYPE_NAME => Ok(resources::business_service::schema()),
            resources::maintenance_window::TYPE_NAME => Ok(resources::maintenance_window::schema()),
            resources::incident_custom_field::TYPE_NAME => {
                Ok(resources::incident_custom_field::schema())
            }
            resources::incident_custom_field_option::TYPE_NAME => {
                Ok(resources::incident_custom_field_option::schema())
            }
            resources::service_dependency::TYPE_NAME => Ok(resources::service_dependency::schema()),
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown resource type: {}",
                other
            ))),
        }
    }
}

impl Default for PagerDutyProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the planned state and changes for a top-level attribute diff.
///
/// Computed attributes with no proposed value carry their prior value
/// forward; changing a `force_new` attribute or the contents of a
/// `force_new` block forces replacement.
fn plan_state(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let empty = serde_json::Map::new();
    let proposed_map = proposed.as_object().unwrap_or(&empty);
    let prior_map = prior.and_then(Value::as_object);

    let mut planned = serde_json::Map::new();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    // Deterministic change ordering for stable output.
    let mut names: BTreeMap<&str, ()> = BTreeMap::new();
    for name in schema.block.attributes.keys() {
        names.insert(name, ());
    }
    for name in schema.block.blocks.keys() {
        names.insert(name, ());
    }

    for (name, _) in names {
        let attribute = schema.block.attributes.get(name);
        let block = schema.block.blocks.get(name);

        let prior_value = prior_map.and_then(|m| m.get(name)).cloned();
        let mut proposed_value = proposed_map.get(name).cloned().unwrap_or(Value::Null);

        if proposed_value.is_null() {
            if let Some(attr) = attribute {
                if attr.computed {
                    // Not set in config: keep what the API last reported.
                    proposed_value = prior_value.clone().unwrap_or(Value::Null);
                }
                if proposed_value.is_null() {
                    if let Some(default) = &attr.default {
                        proposed_value = default.clone();
                    }
                }
            }
        }

        let before = prior_value.clone().filter(|v| !v.is_null());
        let after = Some(proposed_value.clone()).filter(|v| !v.is_null());
        if before != after {
            let force_new = attribute.map(|a| a.force_new).unwrap_or(false)
                || block.map(|b| b.force_new).unwrap_or(false);
            if force_new && prior.is_some() {
                requires_replace = true;
            }
            changes.push(AttributeChange::new(name.to_string(), before, after));
        }

        planned.insert(name.to_string(), proposed_value);
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

#[async_trait::async_trait]
impl ProviderService for PagerDutyProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(Self::provider_config_schema())
            .with_resource(
                resources::business_service::TYPE_NAME,
                resources::business_service::schema(),
            )
            .with_resource(
                resources::maintenance_window::TYPE_NAME,
                resources::maintenance_window::schema(),
            )
            .with_resource(
                resources::incident_custom_field::TYPE_NAME,
                resources::incident_custom_field::schema(),
            )
            .with_resource(
                resources::incident_custom_field_option::TYPE_NAME,
                resources::incident_custom_field_option::schema(),
            )
            .with_resource(
                resources::service_dependency::TYPE_NAME,
                resources::service_dependency::schema(),
            )
            .with_data_source(
                data_sources::service::TYPE_NAME,
                data_sources::service::schema(),
            )
            .with_data_source(
                data_sources::extension_schema::TYPE_NAME,
                data_sources::extension_schema::schema(),
            )
            .with_data_source(
                data_sources::incident_custom_field::TYPE_NAME,
                data_sources::incident_custom_field::schema(),
            )
            .with_data_source(
                data_sources::user_contact_method::TYPE_NAME,
                data_sources::user_contact_method::schema(),
            )
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&Self::provider_config_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = Config::from_value(config)?;
        let client = config.build_client().await?;
        *self.client.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("dropping API client");
        *self.client.write().await = None;
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = Self::resource_schema(resource_type)?;
        let mut diagnostics = validate(&schema, &config);
        match resource_type {
            resources::maintenance_window::TYPE_NAME => {
                diagnostics.extend(resources::maintenance_window::validate(&config));
            }
            resources::incident_custom_field::TYPE_NAME => {
                diagnostics.extend(resources::incident_custom_field::validate(&config));
            }
            resources::incident_custom_field_option::TYPE_NAME => {
                diagnostics.extend(resources::incident_custom_field_option::validate(&config));
            }
            _ => {}
        }
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = Self::resource_schema(resource_type)?;
        Ok(plan_state(&schema, prior_state.as_ref(), &proposed_state))
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        match resource_type {
            resources::business_service::TYPE_NAME => {
                resources::business_service::create(&client, &planned_state).await
            }
            resources::maintenance_window::TYPE_NAME => {
                resources::maintenance_window::create(&client, &planned_state).await
            }
            resources::incident_custom_field::TYPE_NAME => {
                resources::incident_custom_field::create(&client, &planned_state).await
            }
            resources::incident_custom_field_option::TYPE_NAME => {
                resources::incident_custom_field_option::create(&client, &planned_state).await
            }
            resources::service_dependency::TYPE_NAME => {
                resources::service_dependency::create(&client, &self.dependency_lock, &planned_state)
                    .await
            }
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown resource type: {}",
                other
            ))),
        }
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        match resource_type {
            resources::business_service::TYPE_NAME => {
                resources::business_service::read(&client, &current_state).await
            }
            resources::maintenance_window::TYPE_NAME => {
                resources::maintenance_window::read(&client, &current_state).await
            }
            resources::incident_custom_field::TYPE_NAME => {
                resources::incident_custom_field::read(&client, &current_state).await
            }
            resources::incident_custom_field_option::TYPE_NAME => {
                resources::incident_custom_field_option::read(&client, &current_state).await
            }
            resources::service_dependency::TYPE_NAME => {
                resources::service_dependency::read(&client, &current_state).await
            }
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown resource type: {}",
                other
            ))),
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        match resource_type {
            resources::business_service::TYPE_NAME => {
                resources::business_service::update(&client, &prior_state, &planned_state).await
            }
            resources::maintenance_window::TYPE_NAME => {
                resources::maintenance_window::update(&client, &prior_state, &planned_state).await
            }
            resources::incident_custom_field::TYPE_NAME => {
                resources::incident_custom_field::update(&client, &prior_state, &planned_state)
                    .await
            }
            resources::incident_custom_field_option::TYPE_NAME => {
                resources::incident_custom_field_option::update(
                    &client,
                    &prior_state,
                    &planned_state,
                )
                .await
            }
            resources::service_dependency::TYPE_NAME => {
                resources::service_dependency::update(&client, &prior_state, &planned_state).await
            }
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown resource type: {}",
                other
            ))),
        }
    }

    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let client = self.client().await?;
        match resource_type {
            resources::business_service::TYPE_NAME => {
                resources::business_service::delete(&client, &current_state).await
            }
            resources::maintenance_window::TYPE_NAME => {
                resources::maintenance_window::delete(&client, &current_state).await
            }
            resources::incident_custom_field::TYPE_NAME => {
                resources::incident_custom_field::delete(&client, &current_state).await
            }
            resources::incident_custom_field_option::TYPE_NAME => {
                resources::incident_custom_field_option::delete(&client, &current_state).await
            }
            resources::service_dependency::TYPE_NAME => {
                resources::service_dependency::delete(&client, &self.dependency_lock, &current_state)
                    .await
            }
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown resource type: {}",
                other
            ))),
        }
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let client = self.client().await?;
        let state = match resource_type {
            resources::business_service::TYPE_NAME => {
                resources::business_service::import(&client, id).await?
            }
            resources::maintenance_window::TYPE_NAME => {
                resources::maintenance_window::import(&client, id).await?
            }
            resources::incident_custom_field::TYPE_NAME => {
                resources::incident_custom_field::import(&client, id).await?
            }
            resources::service_dependency::TYPE_NAME => {
                resources::service_dependency::import(&client, id).await?
            }
            other => {
                return Err(ProviderError::Unimplemented(format!(
                    "Import not supported for resource type: {}",
                    other
                )))
            }
        };
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = match data_source_type {
            data_sources::service::TYPE_NAME => data_sources::service::schema(),
            data_sources::extension_schema::TYPE_NAME => data_sources::extension_schema::schema(),
            data_sources::incident_custom_field::TYPE_NAME => {
                data_sources::incident_custom_field::schema()
            }
            data_sources::user_contact_method::TYPE_NAME => {
                data_sources::user_contact_method::schema()
            }
            other => {
                return Err(ProviderError::UnknownResource(format!(
                    "Unknown data source type: {}",
                    other
                )))
            }
        };
        Ok(validate(&schema, &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        match data_source_type {
            data_sources::service::TYPE_NAME => data_sources::service::read(&client, &config).await,
            data_sources::extension_schema::TYPE_NAME => {
                data_sources::extension_schema::read(&client, &config).await
            }
            data_sources::incident_custom_field::TYPE_NAME => {
                data_sources::incident_custom_field::read(&client, &config).await
            }
            data_sources::user_contact_method::TYPE_NAME => {
                data_sources::user_contact_method::read(&client, &config).await
            }
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                other
            ))),
        }
    }
}
