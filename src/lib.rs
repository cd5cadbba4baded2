//! Hemmer provider for the PagerDuty REST API.
//!
//! This crate implements a Hemmer provider that manages PagerDuty
//! objects: business services, maintenance windows, incident custom
//! fields and their options, and service dependencies, plus data
//! sources for services, extension schemas, and user contact methods.
//!
//! # Overview
//!
//! The crate is split into two layers:
//!
//! - **Protocol**: gRPC types and server plumbing ([`generated`],
//!   [`server`], [`schema`], [`types`], [`validation`]) implementing the
//!   Hemmer provider protocol with its stdout handshake.
//! - **Provider**: the PagerDuty-specific half ([`provider`], [`client`],
//!   [`config`], [`resources`], [`data_sources`]) that talks to the
//!   REST API with token auth, offset pagination, and wall-clock retry
//!   budgets.
//!
//! # Quick Start
//!
//! ```ignore
//! use hemmer_provider_pagerduty::{init_logging, serve, PagerDutyProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(PagerDutyProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! When the provider starts via [`serve`], it outputs a handshake string
//! to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`
//!
//! This allows Hemmer to spawn the provider as a subprocess and connect
//! via gRPC.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
mod util;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

// Re-export main types at crate root
pub use client::{ApiError, Client};
pub use config::Config;
pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use provider::PagerDutyProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
