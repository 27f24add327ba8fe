//! Hemmer provider for FortiFlex.
//!
//! Manages FortiFlex configurations and entitlements through the FortiFlex
//! v2 REST API and serves them to Hemmer over the provider gRPC protocol.
//!
//! # Resources
//!
//! - `fortiflexvm_config`: a configuration of one product type
//! - `fortiflexvm_entitlements_vm`, `fortiflexvm_entitlements_hardware`,
//!   `fortiflexvm_entitlements_cloud`: entitlements of a configuration
//! - `fortiflexvm_entitlements_vm_token`: the token of an existing VM entitlement
//! - `fortiflexvm_retrieve_vm_group`: claims a group of unused VM entitlements
//!
//! # Data sources
//!
//! `fortiflexvm_programs_list`, `fortiflexvm_configs_list`,
//! `fortiflexvm_entitlements_list`, `fortiflexvm_entitlements_points`,
//! `fortiflexvm_groups_list` and `fortiflexvm_groups_nexttoken`.
//!
//! # Handshake Protocol
//!
//! When the provider starts via [`serve`], it writes a handshake line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Logs go to stderr.
//!
//! # Example
//!
//! ```ignore
//! use fortiflex_provider::{init_logging, serve, FortiFlexProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(FortiFlexProvider::new()).await
//! }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod entitlement;
pub mod error;
pub mod logging;
pub mod params;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(clippy::all)]
pub mod generated;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use provider::{DataSource, FortiFlexProvider, ManagedResource, Session};
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    plan_from_schema, AttributeChange, ImportedResource, PlanResult, ProviderMetadata,
    ServerCapabilities, StateResult, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
pub use serde_json;
pub use tonic;
pub use tracing;
