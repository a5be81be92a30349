//! APIM Authentication
//!
//! The management API is called with a shared-access token kept in a secret
//! store. The token is fetched on first use and cached until its TTL runs
//! out, after which the next request fetches it again.

use super::error::{ApimError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Environment variable consulted when no vault-specific variable is set
pub const FALLBACK_TOKEN_ENV: &str = "APIM_TOKEN";

/// Source of secrets such as the APIM access token
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret `name` from `vault`
    async fn get_secret(&self, vault: &str, name: &str) -> Result<String>;
}

/// Reads secrets from environment variables
///
/// A secret `token` in vault `luna-kv` is looked up as `LUNA_KV_TOKEN`,
/// then as [`FALLBACK_TOKEN_ENV`].
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

/// Environment variable name for a vault secret
pub fn secret_env_var(vault: &str, name: &str) -> String {
    format!("{}_{}", vault, name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, vault: &str, name: &str) -> Result<String> {
        let var = secret_env_var(vault, name);
        if let Ok(value) = std::env::var(&var) {
            if !value.trim().is_empty() {
                return Ok(value.trim().to_string());
            }
        }
        if let Ok(value) = std::env::var(FALLBACK_TOKEN_ENV) {
            if !value.trim().is_empty() {
                tracing::debug!("{} not set, using {}", var, FALLBACK_TOKEN_ENV);
                return Ok(value.trim().to_string());
            }
        }
        Err(ApimError::secret(format!(
            "secret '{}' not found in vault '{}' (set {} or {})",
            name, vault, var, FALLBACK_TOKEN_ENV
        )))
    }
}

/// In-memory secrets, keyed by `(vault, name)`
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<(String, String), String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, vault: &str, name: &str, value: &str) -> Self {
        self.secrets
            .insert((vault.to_string(), name.to_string()), value.to_string());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, vault: &str, name: &str) -> Result<String> {
        self.secrets
            .get(&(vault.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                ApimError::secret(format!("secret '{}' not found in vault '{}'", name, vault))
            })
    }
}

/// APIM credentials holder with token caching
#[derive(Clone)]
pub struct ApimCredentials {
    store: Arc<dyn SecretStore>,
    vault_name: String,
    secret_name: String,
    /// `None` keeps the first token for the lifetime of the client
    ttl: Option<Duration>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

impl ApimCredentials {
    pub fn new(
        store: Arc<dyn SecretStore>,
        vault_name: &str,
        secret_name: &str,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            vault_name: vault_name.to_string(),
            secret_name: secret_name.to_string(),
            ttl,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Credentials that always hand out `token`
    pub fn from_token(token: &str) -> Self {
        let store = StaticSecretStore::new().with_secret("static", "token", token);
        Self::new(Arc::new(store), "static", "token", None)
    }

    /// Get the access token, fetching it from the secret store when the
    /// cache is empty or expired
    pub async fn get_token(&self) -> Result<String> {
        // Check cache first
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
            }
        }

        // Hold the write lock across the fetch so concurrent callers wait
        // for one token instead of each fetching their own
        let mut cache = self.token_cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.token.clone());
            }
            tracing::debug!("Cached APIM token expired, fetching new token");
        }

        // Fetch new token
        let token = self
            .store
            .get_secret(&self.vault_name, &self.secret_name)
            .await?;

        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });

        match self.ttl {
            Some(ttl) => tracing::debug!("New APIM token cached, expires in {}s", ttl.as_secs()),
            None => tracing::debug!("New APIM token cached without expiry"),
        }

        Ok(token)
    }

    /// Drop the cached token and fetch a fresh one
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }
}
