//! HTTP routes.
//!
//! - `GET /auth/{provider}` starts a login with a registered provider
//! - `GET /auth` starts a login with the `openidconnect` provider
//! - `GET /callback` finishes whichever login the session started
//! - `GET /profile` shows the logged-in profile
//! - `GET /serverStatus` liveness check

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::trace::TraceLayer;

use crate::client::OidcClient;
use crate::config::Config;
use crate::error::{AppError, AuthError, AuthResult};
use crate::oidc::{self, CallbackParams, IdentityProfile};
use crate::registry::{DEFAULT_STRATEGY, Provider, ProviderRegistry};
use crate::session::{
    ProfileSerializer, Session, SessionLayerState, SessionStore, WholeProfile, session_middleware,
};

/// Body of the liveness check.
pub const SERVER_STATUS_BODY: &str = "Server is running";

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub registry: ProviderRegistry,
    pub client: OidcClient,
    pub serializer: Arc<dyn ProfileSerializer>,
    pub success_redirect: String,
    pub failure_redirect: String,
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState")
            .field("providers", &self.registry.names().collect::<Vec<_>>())
            .field("success_redirect", &self.success_redirect)
            .field("failure_redirect", &self.failure_redirect)
            .finish()
    }
}

/// Create the router, storing whole profiles in the session.
///
/// # Errors
///
/// Returns error if the outbound HTTP client cannot be built.
pub fn create_router(config: &Config, registry: ProviderRegistry) -> anyhow::Result<Router> {
    create_router_with_serializer(config, registry, Arc::new(WholeProfile))
}

/// Create the router with custom serialization hooks.
///
/// # Errors
///
/// Returns error if the outbound HTTP client cannot be built.
pub fn create_router_with_serializer(
    config: &Config,
    registry: ProviderRegistry,
    serializer: Arc<dyn ProfileSerializer>,
) -> anyhow::Result<Router> {
    let sessions = SessionLayerState::new(config, SessionStore::new(config));

    let state = Arc::new(HttpState {
        registry,
        client: OidcClient::new(config)?,
        serializer,
        success_redirect: config.success_redirect.clone(),
        failure_redirect: config.failure_redirect.clone(),
    });

    Ok(Router::new()
        .route("/serverStatus", get(server_status))
        .route("/auth", get(handle_auth_default))
        .route("/auth/{provider}", get(handle_auth_provider))
        .route("/callback", get(handle_callback))
        .route("/profile", get(handle_profile))
        .layer(axum::middleware::from_fn_with_state(sessions, session_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// 302 to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

async fn server_status() -> &'static str {
    SERVER_STATUS_BODY
}

async fn handle_auth_default(
    State(state): State<Arc<HttpState>>,
    session: Session,
) -> Result<Response, AppError> {
    let provider = state
        .registry
        .get(DEFAULT_STRATEGY)
        .ok_or_else(|| AppError::UnknownStrategy(DEFAULT_STRATEGY.to_string()))?;
    start_login(provider, &session).await
}

async fn handle_auth_provider(
    State(state): State<Arc<HttpState>>,
    Path(name): Path<String>,
    session: Session,
) -> Result<Response, AppError> {
    let provider = state.registry.get(&name).ok_or(AppError::UnknownProvider(name))?;
    start_login(provider, &session).await
}

async fn start_login(provider: &Provider, session: &Session) -> Result<Response, AppError> {
    let request = oidc::authorization_request(provider)
        .map_err(|e| AppError::internal(format!("authorization URL for '{}': {e}", provider.name)))?;

    session.begin_login(request.pending).await;
    tracing::debug!(provider = %provider.name, "Redirecting to authorization endpoint");

    Ok(found(request.url.as_str()))
}

async fn handle_callback(
    State(state): State<Arc<HttpState>>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Response {
    match finish_login(&state, &session, params).await {
        Ok(profile) => {
            tracing::info!(provider = %profile.provider, "User logged in");
            found(&state.success_redirect)
        }
        Err(err) => {
            let transport = matches!(&err, AuthError::Client(e) if e.is_transport());
            tracing::warn!(error = %err, transport, "Login failed");
            found(&state.failure_redirect)
        }
    }
}

async fn finish_login(
    state: &HttpState,
    session: &Session,
    params: CallbackParams,
) -> AuthResult<IdentityProfile> {
    let pending = session.take_pending_login().await;
    let profile = oidc::complete_login(&state.client, &state.registry, pending, params).await?;
    let stored = state.serializer.serialize(&profile)?;

    // Fresh id on login; the pre-login id is dropped when the session is saved
    session.regenerate().await;
    session.set_user(stored).await;
    Ok(profile)
}

async fn handle_profile(State(state): State<Arc<HttpState>>, session: Session) -> Response {
    let Some(stored) = session.user().await else {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"error": "not_authenticated"})))
            .into_response();
    };

    match state.serializer.deserialize(stored) {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => AppError::internal(format!("stored profile unreadable: {e}")).into_response(),
    }
}
