//! Error types for APIM operations

use thiserror::Error;

/// Errors surfaced by the APIM client and the reconciler
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApimError {
    /// The management API rejected a request, or answered a success status
    /// with a body that does not match the expected record shape.
    /// `body` holds the raw upstream response text.
    #[error("{message}: {body}")]
    Server { message: String, body: String },

    /// Network-level failure talking to the management endpoint
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The secret store could not produce an access token
    #[error("secret error: {0}")]
    Secret(String),

    /// A request URL could not be built from the configured endpoint
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No backend is registered for the requested kind
    #[error("no backend registered for kind '{0}'")]
    UnknownBackend(String),

    /// The same remote identity appeared twice in one batch
    #[error("duplicate resource identity '{0}' in batch")]
    DuplicateIdentity(String),
}

impl ApimError {
    /// Create a server error carrying the raw response body
    pub fn server(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            body: body.into(),
        }
    }

    /// Create a secret retrieval error
    pub fn secret(msg: impl Into<String>) -> Self {
        Self::Secret(msg.into())
    }

    /// Raw upstream body, if this error came from the management API
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Server { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub type Result<T, E = ApimError> = std::result::Result<T, E>;
