//! APIM Client
//!
//! Main client for the API Management REST API, combining authentication,
//! resource path computation and HTTP functionality. Built once per process
//! and cloned into whatever needs it.

use super::auth::ApimCredentials;
use super::error::Result;
use super::http::{ApimHttpClient, ApimResponse};
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Query parameter pinned on every request
pub const API_VERSION_PARAM: &str = "api-version";

/// Identifies one API Management service instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCoordinates {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
}

impl ServiceCoordinates {
    pub fn new(subscription_id: &str, resource_group: &str, service_name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            service_name: service_name.to_string(),
        }
    }

    /// ARM path of the service instance itself
    pub fn service_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}",
            segment(&self.subscription_id),
            segment(&self.resource_group),
            segment(&self.service_name)
        )
    }

    /// ARM path of an API (version) under the service
    pub fn api_path(&self, version_id: &str) -> String {
        format!("{}/apis/{}", self.service_path(), segment(version_id))
    }
}

fn segment(value: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(value)
}

/// Merge caller query parameters with the pinned api-version.
///
/// Keys are deduplicated with the last assignment winning, and `api-version`
/// is assigned after every caller parameter so it cannot be overridden.
/// Order of first appearance is preserved.
pub fn build_query<K, V>(extra: &[(K, V)], api_version: &str) -> Vec<(String, String)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let assignments = extra
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .chain(std::iter::once((API_VERSION_PARAM, api_version)));

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in assignments {
        match pairs.iter_mut().find(|(existing, _)| existing == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => pairs.push((key.to_string(), value.to_string())),
        }
    }
    pairs
}

/// Connection settings for [`ApimClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub coordinates: ServiceCoordinates,
    /// e.g. `https://contoso.management.azure-api.net`
    pub management_endpoint: String,
    pub api_version: String,
    pub request_timeout: Option<Duration>,
}

/// Main APIM client
#[derive(Clone)]
pub struct ApimClient {
    pub credentials: ApimCredentials,
    pub http: ApimHttpClient,
    pub coordinates: ServiceCoordinates,
    endpoint: String,
    api_version: String,
}

impl ApimClient {
    /// Create a new APIM client
    pub fn new(settings: ClientSettings, credentials: ApimCredentials) -> Result<Self> {
        // Reject an unusable endpoint up front rather than on first request
        Url::parse(&settings.management_endpoint)?;

        let http = ApimHttpClient::new(settings.request_timeout)?;

        Ok(Self {
            credentials,
            http,
            coordinates: settings.coordinates,
            endpoint: settings
                .management_endpoint
                .trim_end_matches('/')
                .to_string(),
            api_version: settings.api_version,
        })
    }

    /// ARM path for an API version id
    pub fn api_path(&self, version_id: &str) -> String {
        self.coordinates.api_path(version_id)
    }

    /// Full request URL for an API version id, including the query string
    pub fn api_url<K, V>(&self, version_id: &str, extra_query: &[(K, V)]) -> Result<Url>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = Url::parse(&format!("{}{}", self.endpoint, self.api_path(version_id)))?;
        url.query_pairs_mut()
            .clear()
            .extend_pairs(build_query(extra_query, &self.api_version));
        Ok(url)
    }

    /// GET an API version
    pub async fn get_api(
        &self,
        version_id: &str,
        extra_query: &[(String, String)],
    ) -> Result<ApimResponse> {
        let url = self.api_url(version_id, extra_query)?;
        let token = self.credentials.get_token().await?;
        self.http
            .send::<()>(Method::GET, url.as_str(), &token, None)
            .await
    }

    /// PUT an API version, overwriting whatever exists
    pub async fn put_api<B: Serialize + ?Sized>(
        &self,
        version_id: &str,
        extra_query: &[(String, String)],
        body: &B,
    ) -> Result<ApimResponse> {
        let url = self.api_url(version_id, extra_query)?;
        let token = self.credentials.get_token().await?;
        self.http
            .send(Method::PUT, url.as_str(), &token, Some(body))
            .await
    }

    /// DELETE an API version
    pub async fn delete_api(
        &self,
        version_id: &str,
        extra_query: &[(String, String)],
    ) -> Result<ApimResponse> {
        let url = self.api_url(version_id, extra_query)?;
        let token = self.credentials.get_token().await?;
        self.http
            .send::<()>(Method::DELETE, url.as_str(), &token, None)
            .await
    }
}
