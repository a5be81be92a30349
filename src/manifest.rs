//! Desired-state manifest
//!
//! YAML file listing the versions and deployments `apply` should upsert:
//!
//! ```yaml
//! deployments:
//!   - product: churn
//!     deployment: prod
//! versions:
//!   - product: churn
//!     deployment: prod
//!     version: v1
//!     backend: realtime
//! ```

use crate::reconciler::{ApiVersion, BackendKind, Deployment, Descriptor};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub deployments: Vec<DeploymentEntry>,
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentEntry {
    pub product: String,
    pub deployment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub product: String,
    pub deployment: String,
    pub version: String,
    pub backend: BackendKind,
}

impl Manifest {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse manifest YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Descriptors in manifest order, origin versions first
    pub fn descriptors(&self) -> Vec<Descriptor> {
        let origins = self
            .deployments
            .iter()
            .map(|d| Descriptor::origin(Deployment::new(&d.product, &d.deployment)));
        let versions = self.versions.iter().map(|v| {
            Descriptor::versioned(
                ApiVersion::new(&v.product, &v.deployment, &v.version),
                v.backend,
            )
        });
        origins.chain(versions).collect()
    }
}
