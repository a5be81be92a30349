//! Resource reconciler
//!
//! Maps a [`Descriptor`] to API Management calls. Create and update are both
//! an overwriting PUT; delete is a no-op when the resource is already gone.
//! Nothing is retried: whatever the management API answers is what the
//! caller sees.
//!
//! # Architecture
//!
//! - [`backend`] - Backend kinds and the registry resolving them to URLs
//! - [`descriptor`] - Domain objects and the descriptor union

pub mod backend;
pub mod descriptor;

pub use backend::{Backend, BackendKind, BackendRegistry};
pub use descriptor::{ApiVersion, Deployment, Descriptor};

use crate::apim::{ApiVersionRecord, ApimClient, ApimError, Result, VersionSetPaths};
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use std::collections::HashSet;

/// Outcome of an existence probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    /// The management API answered 404
    Absent,
    /// Any other non-success status (auth failure, throttling, outage)
    Unknown(StatusCode),
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Per-resource results of [`ResourceReconciler::apply`]
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<(String, ApimError)>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconciles API version descriptors against one APIM service
#[derive(Clone)]
pub struct ResourceReconciler {
    client: ApimClient,
    backends: BackendRegistry,
    version_sets: VersionSetPaths,
    /// Added to every request; `api-version` here never wins
    extra_query: Vec<(String, String)>,
}

impl ResourceReconciler {
    pub fn new(client: ApimClient, backends: BackendRegistry) -> Self {
        let version_sets = VersionSetPaths::new(client.coordinates.clone());
        Self {
            client,
            backends,
            version_sets,
            extra_query: Vec::new(),
        }
    }

    /// Send `key=value` on every request
    pub fn with_query_param(mut self, key: &str, value: &str) -> Self {
        self.extra_query.push((key.to_string(), value.to_string()));
        self
    }

    /// Record that would be sent for `descriptor`
    pub fn materialize(&self, descriptor: &Descriptor) -> Result<ApiVersionRecord> {
        descriptor.materialize(&self.backends, &self.version_sets)
    }

    /// Probe the remote resource, telling real absence apart from failures
    pub async fn probe(&self, descriptor: &Descriptor) -> Result<Presence> {
        let id = descriptor.identity();
        let response = self.client.get_api(&id, &self.extra_query).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(Presence::Absent);
        }
        if !response.is_success() {
            return Ok(Presence::Unknown(response.status));
        }

        if ApiVersionRecord::from_response(&response.body).is_none() {
            return Err(ApimError::server(
                "Query result in bad format",
                response.body,
            ));
        }
        Ok(Presence::Present)
    }

    /// Whether the remote resource exists. Any non-success status counts as
    /// absent; use [`probe`](Self::probe) to tell the cases apart.
    pub async fn exists(&self, descriptor: &Descriptor) -> Result<bool> {
        let presence = self.probe(descriptor).await?;
        if let Presence::Unknown(status) = presence {
            tracing::warn!(
                "Existence check for {} returned {}, treating as absent",
                descriptor.identity(),
                status
            );
        }
        Ok(presence == Presence::Present)
    }

    /// Create the remote resource, overwriting any existing one
    pub async fn create(&self, descriptor: &Descriptor) -> Result<()> {
        self.put(descriptor).await?;
        tracing::info!("Created API version {}", descriptor.identity());
        Ok(())
    }

    /// Update the remote resource. Same request as [`create`](Self::create).
    pub async fn update(&self, descriptor: &Descriptor) -> Result<()> {
        self.put(descriptor).await?;
        tracing::info!("Updated API version {}", descriptor.identity());
        Ok(())
    }

    /// Delete the remote resource if it exists
    pub async fn delete(&self, descriptor: &Descriptor) -> Result<()> {
        let id = descriptor.identity();
        if !self.exists(descriptor).await? {
            tracing::debug!("API version {} not found, nothing to delete", id);
            return Ok(());
        }

        let response = self.client.delete_api(&id, &self.extra_query).await?;
        if !response.is_success() {
            return Err(ApimError::server("Query failed with response", response.body));
        }
        tracing::info!("Deleted API version {}", id);
        Ok(())
    }

    /// Create when absent, update when present
    pub async fn upsert(&self, descriptor: &Descriptor) -> Result<UpsertOutcome> {
        if self.exists(descriptor).await? {
            self.update(descriptor).await?;
            Ok(UpsertOutcome::Updated)
        } else {
            self.create(descriptor).await?;
            Ok(UpsertOutcome::Created)
        }
    }

    /// Upsert a batch of descriptors, at most `concurrency` at a time.
    ///
    /// Identities must be distinct; a duplicate fails the whole batch before
    /// any request is sent.
    pub async fn apply(&self, descriptors: &[Descriptor], concurrency: usize) -> Result<ApplyReport> {
        // Reject duplicates before touching the remote
        let mut seen = HashSet::new();
        for descriptor in descriptors {
            let id = descriptor.identity();
            if !seen.insert(id.clone()) {
                return Err(ApimError::DuplicateIdentity(id));
            }
        }

        let results: Vec<(String, Result<UpsertOutcome>)> = stream::iter(descriptors)
            .map(|descriptor| async move {
                (descriptor.identity(), self.upsert(descriptor).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        // Split outcomes; sorted below so reports are stable across runs
        let mut report = ApplyReport::default();
        for (id, result) in results {
            match result {
                Ok(UpsertOutcome::Created) => report.created.push(id),
                Ok(UpsertOutcome::Updated) => report.updated.push(id),
                Err(e) => {
                    tracing::error!("Failed to apply {}: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }
        report.created.sort();
        report.updated.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(report)
    }

    async fn put(&self, descriptor: &Descriptor) -> Result<()> {
        let record = self.materialize(descriptor)?;
        let response = self
            .client
            .put_api(&record.name, &self.extra_query, &record)
            .await?;
        if !response.is_success() {
            return Err(ApimError::server("Query failed with response", response.body));
        }
        Ok(())
    }
}
