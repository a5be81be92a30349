//! APIM API version record
//!
//! Wire shape exchanged with the `apis/{id}` endpoint. Sent as the PUT body
//! and expected back from a successful GET.

use serde::{Deserialize, Serialize};

/// API version resource as the management API represents it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiVersionRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: ApiVersionProperties,
}

/// Properties block of an API version resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionProperties {
    #[serde(default)]
    pub display_name: String,
    /// Version label shown to API consumers
    #[serde(default)]
    pub api_version: String,
    /// Backend URL requests are forwarded to; empty for origin versions
    #[serde(default)]
    pub service_url: String,
    /// Public path suffix, `{product}/{deployment}`
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub api_version_set_id: String,
}

impl ApiVersionRecord {
    /// Parse a GET response body. Returns `None` when the body is not a JSON
    /// object of this shape.
    pub fn from_response(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}
