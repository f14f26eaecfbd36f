//! HTTP client for the provider's token and user-info endpoints.
//!
//! One pooled `reqwest` client is shared by all providers. Calls are not
//! retried; a failure or timeout fails the login it belongs to.

mod types;

pub use types::TokenResponse;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::{Config, ProviderConfig, TokenAuthMethod};
use crate::error::{ClientError, ClientResult};

/// Client for talking to identity providers.
#[derive(Clone)]
pub struct OidcClient {
    client: Client,
}

impl OidcClient {
    /// Create a new client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("oidc-login/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Exchange an authorization code at the provider's token endpoint.
    pub async fn exchange_code(
        &self,
        provider: &ProviderConfig,
        code: &str,
        code_verifier: Option<&str>,
    ) -> ClientResult<TokenResponse> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", provider.callback_url.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let request = self.client.post(&provider.token_endpoint).header("Accept", "application/json");
        let request = match provider.token_endpoint_auth_method {
            TokenAuthMethod::ClientSecretPost => {
                form.push(("client_id", provider.client_id.as_str()));
                form.push(("client_secret", provider.client_secret.as_str()));
                request
            }
            TokenAuthMethod::ClientSecretBasic => {
                request.basic_auth(&provider.client_id, Some(&provider.client_secret))
            }
        };

        tracing::debug!(endpoint = %provider.token_endpoint, "Exchanging authorization code");
        let response = request.form(&form).send().await?;
        Self::handle_response(response).await
    }

    /// Fetch the user-info document with the access token.
    pub async fn fetch_userinfo(
        &self,
        provider: &ProviderConfig,
        access_token: &str,
    ) -> ClientResult<serde_json::Value> {
        tracing::debug!(endpoint = %provider.userinfo_endpoint, "Fetching user info");
        let response = self
            .client
            .get(&provider.userinfo_endpoint)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Map a provider response to a typed value or a [`ClientError`].
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            return Ok(serde_json::from_str(&text)?);
        }

        let text = response.text().await.unwrap_or_default();

        // OAuth errors come back as 400/401 with a JSON body (RFC 6749 §5.2)
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            if let Ok(body) = serde_json::from_str::<types::OAuthErrorBody>(&text) {
                return Err(ClientError::Provider {
                    error: body.error,
                    description: body.error_description.unwrap_or_default(),
                });
            }
        }

        Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text })
    }
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> ProviderConfig {
        ProviderConfig::for_testing(&server.uri(), "http://localhost:3001/callback")
    }

    #[tokio::test]
    async fn test_exchange_code_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_secret=test-client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "token_type": "Bearer",
                "id_token": "x.y.z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OidcClient::new(&Config::for_testing()).unwrap();
        let tokens = client.exchange_code(&provider(&server), "abc", None).await.unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.id_token.as_deref(), Some("x.y.z"));
    }

    #[tokio::test]
    async fn test_exchange_code_basic_auth() {
        let server = MockServer::start().await;
        // base64("test-client-id:test-client-secret")
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header(
                "authorization",
                "Basic dGVzdC1jbGllbnQtaWQ6dGVzdC1jbGllbnQtc2VjcmV0",
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "at"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = provider(&server);
        config.token_endpoint_auth_method = TokenAuthMethod::ClientSecretBasic;
        let client = OidcClient::new(&Config::for_testing()).unwrap();
        let tokens = client.exchange_code(&config, "abc", Some("verifier")).await.unwrap();
        assert!(tokens.id_token.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_oauth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Code expired"
            })))
            .mount(&server)
            .await;

        let client = OidcClient::new(&Config::for_testing()).unwrap();
        let err = client.exchange_code(&provider(&server), "old", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Provider { ref error, .. } if error == "invalid_grant"));
    }

    #[tokio::test]
    async fn test_userinfo_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer at"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = OidcClient::new(&Config::for_testing()).unwrap();
        let err = client.fetch_userinfo(&provider(&server), "at").await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedStatus { status: 503, .. }));
    }
}
