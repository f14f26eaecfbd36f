//! Session cookie middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use sha2::{Digest, Sha512};

use super::SessionStore;
use crate::config::Config;

/// State for [`session_middleware`].
#[derive(Clone)]
pub struct SessionLayerState {
    pub store: SessionStore,
    key: Key,
    cookie_name: String,
}

impl SessionLayerState {
    /// The signing key is derived from the configured session secret.
    #[must_use]
    pub fn new(config: &Config, store: SessionStore) -> Self {
        let key = Key::from(Sha512::digest(config.session_secret.as_bytes()).as_slice());
        Self { store, key, cookie_name: config.session_cookie_name.clone() }
    }
}

impl std::fmt::Debug for SessionLayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLayerState").field("cookie_name", &self.cookie_name).finish()
    }
}

/// Attach a [`super::Session`] to the request and persist its changes afterwards.
///
/// A cookie is only sent when the session is new or its id changed. Cookies
/// with a bad signature are ignored, as if absent.
pub async fn session_middleware(
    State(layer): State<SessionLayerState>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = SignedCookieJar::from_headers(req.headers(), layer.key.clone());
    let cookie_id = jar.get(&layer.cookie_name).map(|c| c.value().to_owned());

    let (session, created) = layer.store.load_or_create(cookie_id.as_deref()).await;
    let loaded_id = session.id().await;
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;

    let id = layer.store.save(&session).await;
    if !created && id == loaded_id {
        return response;
    }

    let cookie = Cookie::build((layer.cookie_name.clone(), id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), response).into_response()
}
