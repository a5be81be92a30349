//! apim-sync: reconcile API versions and deployments against Azure API
//! Management.
//!
//! - [`apim`] - REST client for the management API
//! - [`reconciler`] - Descriptors and the [`ResourceReconciler`]
//! - [`config`] - Persistent configuration
//! - [`manifest`] - Desired-state manifests for batch apply

pub mod apim;
pub mod config;
pub mod manifest;
pub mod reconciler;

pub use apim::{ApimClient, ApimError};
pub use reconciler::{Descriptor, ResourceReconciler};
