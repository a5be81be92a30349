//! HTTP utilities for APIM REST API calls

use super::error::Result;
use reqwest::header::{AUTHORIZATION, IF_MATCH};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Correlation header understood by Azure Resource Manager
const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// Truncate a response body for logging and strip control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Status and raw body of a completed request
#[derive(Debug, Clone)]
pub struct ApimResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApimResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// HTTP client wrapper for APIM management calls
#[derive(Clone)]
pub struct ApimHttpClient {
    client: Client,
}

impl ApimHttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Send a request with the APIM authorization and precondition headers.
    ///
    /// Non-success statuses are returned, not raised; callers decide what
    /// they mean.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<ApimResponse> {
        // Correlation id so failures can be matched against Azure logs
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("{} {} [{}]", method, url, request_id);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(AUTHORIZATION, token)
            .header(IF_MATCH, "*")
            .header(CLIENT_REQUEST_ID, &request_id);

        if let Some(body) = body {
            request = request.json(body);
        }

        // Read the body whatever the status
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Only log a truncated body
            tracing::error!(
                "APIM error: {} {} -> {} - {}",
                method,
                url,
                status,
                sanitize_for_log(&body)
            );
        }

        Ok(ApimResponse { status, body })
    }
}
