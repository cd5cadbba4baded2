//! Resource handlers for the PagerDuty provider.
//!
//! Each module manages one resource type: it declares the schema, maps
//! attribute state to and from the REST API's JSON shapes, and drives
//! the API through the shared [`Client`](crate::client::Client) with the
//! retry policy that endpoint needs. Reads signal a deleted remote
//! resource by returning `Value::Null`, which the provider layer turns
//! into state removal.

pub mod business_service;
pub mod incident_custom_field;
pub mod incident_custom_field_option;
pub mod maintenance_window;
pub mod service_dependency;
