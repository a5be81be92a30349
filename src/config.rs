//! Configuration Management
//!
//! Handles persistent configuration storage for apim-sync. Values come from
//! the config file, then `APIM_*` environment variables, then CLI flags.

use crate::apim::{ApimCredentials, ClientSettings, SecretStore, ServiceCoordinates};
use crate::reconciler::{Backend, BackendKind, BackendRegistry};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_VERSION: &str = "2019-12-01";
pub const DEFAULT_TOKEN_SECRET: &str = "apim-token";
pub const DEFAULT_VAULT: &str = "apim";
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub resource_group: Option<String>,
    /// APIM service instance name
    #[serde(default)]
    pub service_name: Option<String>,
    /// Management API version pinned on every request
    #[serde(default)]
    pub api_version: Option<String>,
    /// Defaults to `https://{service_name}.management.azure-api.net`
    #[serde(default)]
    pub management_endpoint: Option<String>,
    #[serde(default)]
    pub vault_name: Option<String>,
    #[serde(default)]
    pub token_secret_name: Option<String>,
    /// Seconds a fetched token is reused; 0 keeps it for the process lifetime
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub backends: HashMap<BackendKind, Backend>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("apim-sync").join("config.json"))
    }

    /// Load configuration from the default location, falling back to
    /// defaults when it is missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Override fields from `APIM_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("APIM_SUBSCRIPTION_ID") {
            self.subscription_id = Some(v);
        }
        if let Some(v) = get("APIM_RESOURCE_GROUP") {
            self.resource_group = Some(v);
        }
        if let Some(v) = get("APIM_SERVICE_NAME") {
            self.service_name = Some(v);
        }
        if let Some(v) = get("APIM_API_VERSION") {
            self.api_version = Some(v);
        }
        if let Some(v) = get("APIM_MANAGEMENT_ENDPOINT") {
            self.management_endpoint = Some(v);
        }
    }

    pub fn effective_api_version(&self) -> String {
        self.api_version
            .clone()
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string())
    }

    /// Management endpoint (explicit > derived from service name)
    pub fn effective_endpoint(&self) -> Option<String> {
        self.management_endpoint.clone().or_else(|| {
            self.service_name
                .as_ref()
                .map(|name| format!("https://{}.management.azure-api.net", name))
        })
    }

    pub fn token_ttl(&self) -> Option<Duration> {
        match self.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Report the required fields that are missing
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("subscription_id", &self.subscription_id),
            ("resource_group", &self.resource_group),
            ("service_name", &self.service_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            bail!("Missing required configuration: {}", missing.join(", "));
        }
        Ok(())
    }

    pub fn coordinates(&self) -> Result<ServiceCoordinates> {
        self.validate()?;
        Ok(ServiceCoordinates::new(
            self.subscription_id.as_deref().unwrap_or_default(),
            self.resource_group.as_deref().unwrap_or_default(),
            self.service_name.as_deref().unwrap_or_default(),
        ))
    }

    pub fn client_settings(&self) -> Result<ClientSettings> {
        let coordinates = self.coordinates()?;
        let management_endpoint = self
            .effective_endpoint()
            .context("No management endpoint configured")?;

        Ok(ClientSettings {
            coordinates,
            management_endpoint,
            api_version: self.effective_api_version(),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn credentials(&self, store: Arc<dyn SecretStore>) -> ApimCredentials {
        ApimCredentials::new(
            store,
            self.vault_name.as_deref().unwrap_or(DEFAULT_VAULT),
            self.token_secret_name
                .as_deref()
                .unwrap_or(DEFAULT_TOKEN_SECRET),
            self.token_ttl(),
        )
    }

    pub fn backend_registry(&self) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        for (kind, backend) in &self.backends {
            registry.register(*kind, backend.clone());
        }
        registry
    }
}
