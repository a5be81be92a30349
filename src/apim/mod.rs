//! Azure API Management interaction module
//!
//! This module provides the core functionality for talking to the API
//! Management REST API: authentication, HTTP plumbing, resource paths and
//! the wire records.
//!
//! # Module Structure
//!
//! - [`auth`] - Secret store abstraction and token caching
//! - [`client`] - Main APIM client, path and query construction
//! - [`error`] - Error type shared by the crate
//! - [`http`] - HTTP utilities for REST API calls
//! - [`record`] - API version wire record
//! - [`version_set`] - Version-set path provider
//!
//! # Example
//!
//! ```ignore
//! use apim_sync::apim::{ApimClient, ApimCredentials, ClientSettings, ServiceCoordinates};
//!
//! async fn example() -> apim_sync::apim::Result<()> {
//!     let client = ApimClient::new(
//!         ClientSettings {
//!             coordinates: ServiceCoordinates::new("sub", "rg", "contoso"),
//!             management_endpoint: "https://contoso.management.azure-api.net".into(),
//!             api_version: "2019-12-01".into(),
//!             request_timeout: None,
//!         },
//!         ApimCredentials::from_token("SharedAccessSignature ..."),
//!     )?;
//!     let response = client.get_api("churn-v1", &[]).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod record;
pub mod version_set;

pub use auth::{ApimCredentials, EnvSecretStore, SecretStore, StaticSecretStore};
pub use client::{build_query, ApimClient, ClientSettings, ServiceCoordinates};
pub use error::{ApimError, Result};
pub use record::{ApiVersionProperties, ApiVersionRecord};
pub use version_set::VersionSetPaths;
