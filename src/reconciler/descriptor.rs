//! Resource descriptors
//!
//! Domain objects describing what should exist in API Management, and the
//! [`Descriptor`] union the reconciler operates on.

use super::backend::{BackendKind, BackendRegistry};
use crate::apim::{ApiVersionProperties, ApiVersionRecord, Result, VersionSetPaths};
use serde::{Deserialize, Serialize};

/// A published version of a product deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub product_name: String,
    pub deployment_name: String,
    pub version_name: String,
}

impl ApiVersion {
    pub fn new(product_name: &str, deployment_name: &str, version_name: &str) -> Self {
        Self {
            product_name: product_name.to_string(),
            deployment_name: deployment_name.to_string(),
            version_name: version_name.to_string(),
        }
    }

    /// APIM resource id: `{deployment}-{version}`, with characters APIM does
    /// not accept in ids replaced by `-`.
    ///
    /// The rewrite is lossy: `1.0` and `1-0` share the id `prod-1-0`, so a
    /// `create` for one overwrites the other. `apply` rejects such pairs.
    pub fn version_id(&self) -> String {
        format!("{}-{}", self.deployment_name, self.version_name)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    }
}

/// A product deployment; its origin version is the pass-through default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub product_name: String,
    pub deployment_name: String,
}

impl Deployment {
    pub fn new(product_name: &str, deployment_name: &str) -> Self {
        Self {
            product_name: product_name.to_string(),
            deployment_name: deployment_name.to_string(),
        }
    }
}

/// Public APIM path of a deployment
pub fn apim_path(product_name: &str, deployment_name: &str) -> String {
    format!("{}/{}", product_name, deployment_name)
}

/// Desired state of one APIM API version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A concrete version forwarding to a backend of the given kind
    Versioned {
        version: ApiVersion,
        backend: BackendKind,
    },
    /// The default version of a deployment, with no service URL
    Origin(Deployment),
}

impl Descriptor {
    pub fn versioned(version: ApiVersion, backend: BackendKind) -> Self {
        Descriptor::Versioned { version, backend }
    }

    pub fn origin(deployment: Deployment) -> Self {
        Descriptor::Origin(deployment)
    }

    /// Remote resource id under `apis/`
    pub fn identity(&self) -> String {
        match self {
            Descriptor::Versioned { version, .. } => version.version_id(),
            Descriptor::Origin(deployment) => deployment.deployment_name.clone(),
        }
    }

    pub fn product_name(&self) -> &str {
        match self {
            Descriptor::Versioned { version, .. } => &version.product_name,
            Descriptor::Origin(deployment) => &deployment.product_name,
        }
    }

    pub fn deployment_name(&self) -> &str {
        match self {
            Descriptor::Versioned { version, .. } => &version.deployment_name,
            Descriptor::Origin(deployment) => &deployment.deployment_name,
        }
    }

    /// Build the record sent to APIM
    pub fn materialize(
        &self,
        backends: &BackendRegistry,
        version_sets: &VersionSetPaths,
    ) -> Result<ApiVersionRecord> {
        let name = self.identity();
        let (api_version, service_url) = match self {
            Descriptor::Versioned { version, backend } => {
                let backend = backends.resolve(*backend)?;
                (
                    version.version_name.clone(),
                    backend.service_url(&version.product_name, &version.deployment_name),
                )
            }
            Descriptor::Origin(deployment) => (deployment.deployment_name.clone(), String::new()),
        };

        Ok(ApiVersionRecord {
            name: name.clone(),
            properties: ApiVersionProperties {
                display_name: name,
                api_version,
                service_url,
                path: apim_path(self.product_name(), self.deployment_name()),
                api_version_set_id: version_sets.resource_path(self.deployment_name()),
            },
        })
    }
}
