//! Configuration for the OIDC login server.
//!
//! Server-wide settings live in [`Config`]; each identity provider is described
//! by a [`ProviderConfig`]. Nothing here performs I/O except the providers-file
//! loader.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Server defaults.
pub mod defaults {
    use std::time::Duration;

    /// Listening port.
    pub const PORT: u16 = 3001;

    /// Where the browser lands after a successful login.
    pub const SUCCESS_REDIRECT: &str = "http://localhost:3000/success";

    /// Where the browser lands after a failed login.
    pub const FAILURE_REDIRECT: &str = "http://localhost:3000";

    /// Session cookie name.
    pub const SESSION_COOKIE_NAME: &str = "oidc_login.sid";

    /// Idle lifetime of a session (24 hours).
    pub const SESSION_TTL: Duration = Duration::from_secs(24 * 3600);

    /// Upper bound on stored sessions.
    pub const SESSION_MAX_ENTRIES: u64 = 10_000;

    /// Minimum length of the cookie signing secret, in bytes.
    pub const MIN_SESSION_SECRET_LEN: usize = 32;

    /// Outbound request timeout for token and user-info calls.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Outbound connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Clock skew tolerated on ID token `exp` and `iat`, in seconds.
    pub const ID_TOKEN_LEEWAY_SECS: i64 = 60;
}

/// Google endpoints used by the built-in provider.
pub mod google {
    pub const NAME: &str = "google";
    pub const ISSUER: &str = "https://accounts.google.com";
    pub const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
    pub const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
    pub const SCOPE: &str = "openid profile email";
}

/// How the client authenticates at the token endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAuthMethod {
    /// Credentials in the form body.
    #[default]
    ClientSecretPost,
    /// Credentials in an HTTP Basic `Authorization` header.
    ClientSecretBasic,
}

/// One identity provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub scope: String,
    #[serde(default)]
    pub pkce: bool,
    #[serde(default)]
    pub token_endpoint_auth_method: TokenAuthMethod,
}

impl ProviderConfig {
    /// Google with the given client credentials.
    #[must_use]
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            issuer: google::ISSUER.to_string(),
            authorization_endpoint: google::AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: google::TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: google::USERINFO_ENDPOINT.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url: callback_url.into(),
            scope: google::SCOPE.to_string(),
            pkce: false,
            token_endpoint_auth_method: TokenAuthMethod::ClientSecretPost,
        }
    }

    /// A provider whose endpoints all live under `base_url` (for mock servers).
    #[must_use]
    pub fn for_testing(base_url: &str, callback_url: &str) -> Self {
        Self {
            issuer: base_url.to_string(),
            authorization_endpoint: format!("{base_url}/authorize"),
            token_endpoint: format!("{base_url}/token"),
            userinfo_endpoint: format!("{base_url}/userinfo"),
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            callback_url: callback_url.to_string(),
            scope: google::SCOPE.to_string(),
            pkce: false,
            token_endpoint_auth_method: TokenAuthMethod::ClientSecretPost,
        }
    }

    /// Check that every field is present and every endpoint is an absolute URL.
    pub fn validate(&self, provider: &str) -> Result<(), ConfigError> {
        let urls = [
            ("issuer", &self.issuer),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("userinfo_endpoint", &self.userinfo_endpoint),
            ("callback_url", &self.callback_url),
        ];
        for (field, value) in urls {
            if value.trim().is_empty() {
                return Err(ConfigError::missing(provider, field));
            }
            url::Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                provider: provider.to_string(),
                field,
                source,
            })?;
        }

        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("scope", &self.scope),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::missing(provider, field));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("issuer", &self.issuer)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("userinfo_endpoint", &self.userinfo_endpoint)
            .field("client_id", &self.client_id)
            .field("callback_url", &self.callback_url)
            .field("scope", &self.scope)
            .field("pkce", &self.pkce)
            .finish()
    }
}

/// Provider entry as written in a providers file.
///
/// Credentials may be left out and supplied through `{NAME}_CLIENT_ID` and
/// `{NAME}_CLIENT_SECRET` instead.
#[derive(Debug, Deserialize)]
struct ProviderFileEntry {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    callback_url: Option<String>,
    scope: Option<String>,
    #[serde(default)]
    pkce: bool,
    #[serde(default)]
    token_endpoint_auth_method: TokenAuthMethod,
}

/// Load providers from a JSON file mapping names to provider entries.
///
/// `default_callback` fills in entries without a `callback_url`.
pub fn load_providers_file(
    path: &Path,
    default_callback: &str,
) -> Result<Vec<(String, ProviderConfig)>, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::ProvidersFile { path: path.to_path_buf(), source })?;
    parse_providers(&raw, default_callback, |key| std::env::var(key).ok())
}

/// Parse a providers document; `lookup` resolves credential env variables.
pub fn parse_providers(
    raw: &str,
    default_callback: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Vec<(String, ProviderConfig)>, ConfigError> {
    let entries: BTreeMap<String, ProviderFileEntry> = serde_json::from_str(raw)?;

    Ok(entries
        .into_iter()
        .map(|(name, entry)| {
            let prefix = name.to_uppercase().replace('-', "_");
            let client_id = entry
                .client_id
                .or_else(|| lookup(&format!("{prefix}_CLIENT_ID")))
                .unwrap_or_default();
            let client_secret = entry
                .client_secret
                .or_else(|| lookup(&format!("{prefix}_CLIENT_SECRET")))
                .unwrap_or_default();

            let config = ProviderConfig {
                issuer: entry.issuer,
                authorization_endpoint: entry.authorization_endpoint,
                token_endpoint: entry.token_endpoint,
                userinfo_endpoint: entry.userinfo_endpoint,
                client_id,
                client_secret,
                callback_url: entry.callback_url.unwrap_or_else(|| default_callback.to_string()),
                scope: entry.scope.unwrap_or_else(|| google::SCOPE.to_string()),
                pkce: entry.pkce,
                token_endpoint_auth_method: entry.token_endpoint_auth_method,
            };
            (name, config)
        })
        .collect())
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Secret used to sign the session cookie. No default.
    pub session_secret: String,

    /// Session cookie name.
    pub session_cookie_name: String,

    /// Idle lifetime of a stored session.
    pub session_ttl: Duration,

    /// Maximum number of stored sessions.
    pub session_max_entries: u64,

    /// Redirect target after a successful login.
    pub success_redirect: String,

    /// Redirect target after a failed login.
    pub failure_redirect: String,

    /// Outbound request timeout.
    pub request_timeout: Duration,

    /// Outbound connection timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Create a configuration with the given signing secret and defaults elsewhere.
    pub fn new(session_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let session_secret = session_secret.into();
        if session_secret.len() < defaults::MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::WeakSessionSecret {
                min: defaults::MIN_SESSION_SECRET_LEN,
                actual: session_secret.len(),
            });
        }

        Ok(Self {
            session_secret,
            session_cookie_name: defaults::SESSION_COOKIE_NAME.to_string(),
            session_ttl: defaults::SESSION_TTL,
            session_max_entries: defaults::SESSION_MAX_ENTRIES,
            success_redirect: defaults::SUCCESS_REDIRECT.to_string(),
            failure_redirect: defaults::FAILURE_REDIRECT.to_string(),
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
        })
    }

    /// A configuration with short timeouts and a fixed secret, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            session_secret: "test-session-secret-with-at-least-32-bytes".to_string(),
            session_cookie_name: defaults::SESSION_COOKIE_NAME.to_string(),
            session_ttl: Duration::from_secs(600),
            session_max_entries: 1000,
            success_redirect: defaults::SUCCESS_REDIRECT.to_string(),
            failure_redirect: defaults::FAILURE_REDIRECT.to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// Override the success and failure redirect targets.
    #[must_use]
    pub fn with_redirects(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_redirect = success.into();
        self.failure_redirect = failure.into();
        self
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("session_cookie_name", &self.session_cookie_name)
            .field("session_ttl", &self.session_ttl)
            .field("session_max_entries", &self.session_max_entries)
            .field("success_redirect", &self.success_redirect)
            .field("failure_redirect", &self.failure_redirect)
            .finish()
    }
}
