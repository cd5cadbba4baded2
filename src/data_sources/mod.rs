//! Data sources for the PagerDuty provider.
//!
//! Data sources look up existing PagerDuty objects by name or label and
//! expose them as read-only attribute state.

pub mod extension_schema;
pub mod incident_custom_field;
pub mod service;
pub mod user_contact_method;
