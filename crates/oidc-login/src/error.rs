//! Error types for the OIDC login server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Startup configuration errors. All of these are fatal.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Provider name unusable as a URL path segment
    #[error("Invalid provider name '{0}': use letters, digits, '-' or '_'")]
    InvalidProviderName(String),

    /// Same provider name registered twice
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// Required provider field missing or blank
    #[error("Provider '{provider}' is missing '{field}'")]
    MissingField {
        /// Provider name
        provider: String,
        /// Field name
        field: &'static str,
    },

    /// Provider field is not an absolute URL
    #[error("Provider '{provider}' has an invalid '{field}': {source}")]
    InvalidUrl {
        /// Provider name
        provider: String,
        /// Field name
        field: &'static str,
        /// Parse failure
        source: url::ParseError,
    },

    /// Session signing secret too short
    #[error("Session secret must be at least {min} bytes, got {actual}")]
    WeakSessionSecret {
        /// Required length
        min: usize,
        /// Supplied length
        actual: usize,
    },

    /// Providers file could not be read
    #[error("Failed to read providers file {}: {source}", path.display())]
    ProvidersFile {
        /// File path
        path: PathBuf,
        /// I/O failure
        source: std::io::Error,
    },

    /// Providers file is not valid JSON
    #[error("Failed to parse providers file: {0}")]
    ProvidersJson(#[from] serde_json::Error),

    /// No provider registered at all
    #[error("No identity provider configured")]
    NoProviders,
}

impl ConfigError {
    /// Create a missing field error.
    #[must_use]
    pub fn missing(provider: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField { provider: provider.into(), field }
    }
}

/// Errors from calls to the identity provider.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Provider rejected the request with an OAuth error body
    #[error("Provider error '{error}': {description}")]
    Provider {
        /// OAuth error code
        error: String,
        /// Human readable description, empty when absent
        description: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },
}

impl ClientError {
    /// Returns true for transport-level failures.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            _ => false,
        }
    }
}

/// Reasons a login callback fails. Every variant ends in the failure redirect.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Callback arrived without a login started in this session
    #[error("No login in progress for this session")]
    NoPendingLogin,

    /// Callback `state` differs from the one issued
    #[error("State parameter mismatch")]
    StateMismatch,

    /// Provider redirected back with an error
    #[error("Provider returned '{error}': {description}")]
    ProviderDenied {
        /// OAuth error code
        error: String,
        /// Description, empty when absent
        description: String,
    },

    /// Callback carried no authorization code
    #[error("Missing authorization code")]
    MissingCode,

    /// Pending login names a provider that is not registered
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// Token or user-info request failed
    #[error("Provider request failed: {0}")]
    Client(#[from] ClientError),

    /// Token response lacked an ID token
    #[error("Token response has no id_token")]
    MissingIdToken,

    /// ID token malformed or its claims rejected
    #[error("Invalid ID token: {0}")]
    InvalidIdToken(String),

    /// User-info subject differs from the ID token subject
    #[error("User-info subject '{userinfo}' does not match ID token subject '{id_token}'")]
    SubjectMismatch {
        /// `sub` from the ID token
        id_token: String,
        /// `sub` from user-info
        userinfo: String,
    },

    /// Profile could not be stored in the session
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl AuthError {
    /// Create an invalid ID token error.
    #[must_use]
    pub fn invalid_id_token(reason: impl Into<String>) -> Self {
        Self::InvalidIdToken(reason.into())
    }
}

/// Errors from the profile serialization hooks.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// Stored value does not deserialize into a profile
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Request-level failures rendered as generic HTTP responses.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// `/auth/{provider}` for a name that is not registered
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// `/auth` without a default strategy registered
    #[error("Unknown authentication strategy '{0}'")]
    UnknownStrategy(String),

    /// Session middleware was not installed on the route
    #[error("Session not available")]
    SessionUnavailable,

    /// Internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,
            Self::UnknownStrategy(_) | Self::SessionUnavailable | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        // Generic body; details stay in the log.
        let body = status.canonical_reason().unwrap_or("Error");
        (status, body).into_response()
    }
}

/// Result type alias for provider calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for login completion.
pub type AuthResult<T> = Result<T, AuthError>;
