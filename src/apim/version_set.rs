//! API version sets
//!
//! Every deployment owns a version set that groups its API versions. Version
//! records reference it by ARM path in `apiVersionSetId`.

use super::client::ServiceCoordinates;

/// Computes ARM paths of version sets under one service instance
#[derive(Debug, Clone)]
pub struct VersionSetPaths {
    coordinates: ServiceCoordinates,
}

impl VersionSetPaths {
    pub fn new(coordinates: ServiceCoordinates) -> Self {
        Self { coordinates }
    }

    /// ARM path of the version set for a deployment
    pub fn resource_path(&self, deployment_name: &str) -> String {
        format!(
            "{}/apiVersionSets/{}",
            self.coordinates.service_path(),
            urlencoding::encode(deployment_name)
        )
    }
}
