//! Backend registry
//!
//! Versioned APIs forward to a backend whose URL depends on what kind of
//! endpoint the version exposes. Kinds are a closed set parsed once from
//! configuration; each maps to a base URL and a path template.

use crate::apim::{ApimError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Kind of backend an API version forwards to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Real-time scoring endpoint
    Realtime,
    /// Batch inference jobs
    Batch,
    /// Model training
    Train,
    /// Model deployment
    Deploy,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Realtime => "realtime",
            BackendKind::Batch => "batch",
            BackendKind::Train => "train",
            BackendKind::Deploy => "deploy",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ApimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "realtime" => Ok(BackendKind::Realtime),
            "batch" => Ok(BackendKind::Batch),
            "train" => Ok(BackendKind::Train),
            "deploy" => Ok(BackendKind::Deploy),
            other => Err(ApimError::UnknownBackend(other.to_string())),
        }
    }
}

/// Where a kind of backend lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub base_url: String,
    /// Path appended to `base_url`; `{product}` and `{deployment}` are
    /// substituted
    pub path_template: String,
}

impl Backend {
    pub fn new(base_url: &str, path_template: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            path_template: path_template.to_string(),
        }
    }

    pub fn path(&self, product: &str, deployment: &str) -> String {
        self.path_template
            .replace("{product}", product)
            .replace("{deployment}", deployment)
    }

    /// Service URL for a product deployment
    pub fn service_url(&self, product: &str, deployment: &str) -> String {
        format!("{}{}", self.base_url, self.path(product, deployment))
    }
}

/// Backends keyed by kind
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Backend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, kind: BackendKind, backend: Backend) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    pub fn register(&mut self, kind: BackendKind, backend: Backend) {
        self.backends.insert(kind, backend);
    }

    pub fn resolve(&self, kind: BackendKind) -> Result<&Backend> {
        self.backends
            .get(&kind)
            .ok_or_else(|| ApimError::UnknownBackend(kind.to_string()))
    }
}
