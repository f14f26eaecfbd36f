//! OpenID Connect authorization code flow.
//!
//! Two halves:
//! - [`authorization_request`] builds the redirect to the provider and the
//!   [`PendingLogin`] the session keeps until the browser comes back
//! - [`complete_login`] turns the callback into an [`IdentityProfile`]

pub mod id_token;
pub mod pkce;
mod profile;

pub use profile::{IdentityProfile, ProfileEmail, ProfileName};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::OidcClient;
use crate::error::{AuthError, AuthResult};
use crate::registry::{Provider, ProviderRegistry};
use id_token::{Expected, IdTokenClaims};

/// A login started in a session and not yet completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub provider: String,
    pub state: String,
    pub nonce: String,
    pub code_verifier: Option<String>,
}

/// Redirect target plus the state to remember.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub pending: PendingLogin,
}

/// Query parameters the provider sends back to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Scope with `openid` guaranteed to be present.
fn openid_scope(scope: &str) -> String {
    if scope.split_whitespace().any(|s| s == "openid") {
        scope.to_string()
    } else {
        format!("openid {scope}")
    }
}

/// Build the authorization redirect for `provider`.
pub fn authorization_request(provider: &Provider) -> Result<AuthorizationRequest, url::ParseError> {
    let config = &provider.config;
    let state = random_token();
    let nonce = random_token();
    let code_verifier = config.pkce.then(pkce::generate_verifier);

    let mut url = Url::parse(&config.authorization_endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.callback_url)
            .append_pair("scope", &openid_scope(&config.scope))
            .append_pair("state", &state)
            .append_pair("nonce", &nonce);
        if let Some(ref verifier) = code_verifier {
            query
                .append_pair("code_challenge", &pkce::challenge_s256(verifier))
                .append_pair("code_challenge_method", "S256");
        }
    }

    Ok(AuthorizationRequest {
        url,
        pending: PendingLogin { provider: provider.name.clone(), state, nonce, code_verifier },
    })
}

/// Complete a login from the callback parameters.
///
/// `pending` is the login taken out of the caller's session; it decides which
/// provider the callback belongs to.
pub async fn complete_login(
    client: &OidcClient,
    registry: &ProviderRegistry,
    pending: Option<PendingLogin>,
    params: CallbackParams,
) -> AuthResult<IdentityProfile> {
    let pending = pending.ok_or(AuthError::NoPendingLogin)?;

    if params.state.as_deref() != Some(pending.state.as_str()) {
        return Err(AuthError::StateMismatch);
    }
    if let Some(error) = params.error {
        return Err(AuthError::ProviderDenied {
            error,
            description: params.error_description.unwrap_or_default(),
        });
    }
    let code = params.code.filter(|c| !c.is_empty()).ok_or(AuthError::MissingCode)?;

    let provider = registry
        .get(&pending.provider)
        .ok_or_else(|| AuthError::UnknownProvider(pending.provider.clone()))?;
    let config = &provider.config;

    let tokens = client.exchange_code(config, &code, pending.code_verifier.as_deref()).await?;
    let raw_id_token = tokens.id_token.as_deref().ok_or(AuthError::MissingIdToken)?;
    let claims = IdTokenClaims::decode(raw_id_token)?;
    claims.validate(&Expected {
        issuer: &config.issuer,
        client_id: &config.client_id,
        nonce: &pending.nonce,
        now: chrono::Utc::now().timestamp(),
    })?;

    let userinfo = client.fetch_userinfo(config, &tokens.access_token).await?;
    let userinfo_sub = userinfo.get("sub").and_then(|v| v.as_str()).unwrap_or_default();
    if userinfo_sub != claims.sub {
        return Err(AuthError::SubjectMismatch {
            id_token: claims.sub,
            userinfo: userinfo_sub.to_string(),
        });
    }

    tracing::info!(provider = %provider.name, subject = %claims.sub, "Login completed");
    Ok(IdentityProfile::from_userinfo(&provider.name, &claims.sub, userinfo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn provider(pkce: bool) -> Provider {
        let mut config =
            ProviderConfig::for_testing("https://idp.example", "http://localhost:3001/callback");
        config.pkce = pkce;
        Provider { name: "google".to_string(), config }
    }

    fn query(url: &Url) -> std::collections::HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_authorization_request_parameters() {
        let request = authorization_request(&provider(false)).unwrap();
        let params = query(&request.url);

        assert_eq!(request.url.path(), "/authorize");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "test-client-id");
        assert_eq!(params["redirect_uri"], "http://localhost:3001/callback");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["state"], request.pending.state);
        assert_eq!(params["nonce"], request.pending.nonce);
        assert!(!params.contains_key("code_challenge"));
        assert!(request.pending.code_verifier.is_none());
    }

    #[test]
    fn test_authorization_request_with_pkce() {
        let request = authorization_request(&provider(true)).unwrap();
        let params = query(&request.url);
        let verifier = request.pending.code_verifier.as_deref().unwrap();

        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["code_challenge"], pkce::challenge_s256(verifier));
    }

    #[test]
    fn test_state_is_fresh_per_request() {
        let a = authorization_request(&provider(false)).unwrap();
        let b = authorization_request(&provider(false)).unwrap();
        assert_ne!(a.pending.state, b.pending.state);
        assert_ne!(a.pending.nonce, b.pending.nonce);
    }

    #[test]
    fn test_openid_scope() {
        assert_eq!(openid_scope("openid profile email"), "openid profile email");
        assert_eq!(openid_scope("profile email"), "openid profile email");
        assert_eq!(openid_scope("email openid"), "email openid");
    }

    #[tokio::test]
    async fn test_complete_login_rejects_before_network() {
        let client = OidcClient::new(&crate::config::Config::for_testing()).unwrap();
        let registry = ProviderRegistry::builder()
            .register("google", provider(false).config)
            .unwrap()
            .build()
            .unwrap();
        let pending = authorization_request(registry.get("google").unwrap()).unwrap().pending;

        let no_pending = complete_login(&client, &registry, None, CallbackParams::default()).await;
        assert!(matches!(no_pending, Err(AuthError::NoPendingLogin)));

        let wrong_state = CallbackParams {
            code: Some("c".into()),
            state: Some("forged".into()),
            ..CallbackParams::default()
        };
        let result = complete_login(&client, &registry, Some(pending.clone()), wrong_state).await;
        assert!(matches!(result, Err(AuthError::StateMismatch)));

        let denied = CallbackParams {
            state: Some(pending.state.clone()),
            error: Some("access_denied".into()),
            ..CallbackParams::default()
        };
        let result = complete_login(&client, &registry, Some(pending.clone()), denied).await;
        assert!(matches!(result, Err(AuthError::ProviderDenied { .. })));

        let no_code = CallbackParams { state: Some(pending.state.clone()), ..CallbackParams::default() };
        let result = complete_login(&client, &registry, Some(pending), no_code).await;
        assert!(matches!(result, Err(AuthError::MissingCode)));
    }
}
