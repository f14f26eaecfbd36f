//! Cookie-keyed server-side sessions.
//!
//! The session middleware loads (or creates) a [`Session`] for every request,
//! hands it to handlers through request extensions and writes it back to the
//! [`SessionStore`] once the handler is done. Sessions are created for every
//! client, logged in or not.

mod middleware;
mod serializer;
mod store;

pub use middleware::{SessionLayerState, session_middleware};
pub use serializer::{ProfileSerializer, WholeProfile};
pub use store::SessionStore;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::oidc::PendingLogin;

/// What is stored per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Serialized identity profile; `None` before login.
    pub user: Option<serde_json::Value>,
    /// Login started but not yet called back.
    pub pending_login: Option<PendingLogin>,
}

struct SessionState {
    id: String,
    previous_id: Option<String>,
    record: SessionRecord,
    /// Not yet in the store under `id`.
    fresh: bool,
    /// Changed by this request.
    dirty: bool,
}

pub(crate) struct Snapshot {
    pub id: String,
    pub previous_id: Option<String>,
    pub record: SessionRecord,
    pub fresh: bool,
    pub dirty: bool,
}

/// Handle to the current request's session.
///
/// Each request works on its own copy of the stored record. Only a copy the
/// request changed is written back, and the pending login is taken from the
/// store itself, so concurrent requests on one cookie cannot both use it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
    store: SessionStore,
}

impl Session {
    pub(crate) fn new(id: String, record: SessionRecord, fresh: bool, store: SessionStore) -> Self {
        let state = SessionState { id, previous_id: None, record, fresh, dirty: fresh };
        Self { inner: Arc::new(Mutex::new(state)), store }
    }

    pub async fn id(&self) -> String {
        self.inner.lock().await.id.clone()
    }

    /// Serialized profile of the logged-in user.
    pub async fn user(&self) -> Option<serde_json::Value> {
        self.inner.lock().await.record.user.clone()
    }

    /// Store a serialized profile, replacing any previous one.
    pub async fn set_user(&self, user: serde_json::Value) {
        let mut state = self.inner.lock().await;
        state.record.user = Some(user);
        state.dirty = true;
    }

    /// Remember a login in progress. Replaces an earlier unfinished one.
    pub async fn begin_login(&self, pending: PendingLogin) {
        let mut state = self.inner.lock().await;
        state.record.pending_login = Some(pending);
        state.dirty = true;
    }

    /// Take the login in progress out of the store; only one caller gets it.
    pub async fn take_pending_login(&self) -> Option<PendingLogin> {
        let mut state = self.inner.lock().await;
        state.record.pending_login = None;
        if state.fresh {
            return None;
        }
        self.store.take_pending_login(&state.id).await
    }

    /// Move to a fresh id with an empty record.
    ///
    /// The old id is invalidated when the session is saved.
    pub async fn regenerate(&self) {
        let mut state = self.inner.lock().await;
        let old = std::mem::replace(&mut state.id, SessionStore::generate_id());
        if !state.fresh {
            state.previous_id.get_or_insert(old);
        }
        state.record = SessionRecord::default();
        state.fresh = true;
        state.dirty = true;
    }

    /// Current state for saving; the handle counts as clean afterwards.
    pub(crate) async fn checkpoint(&self) -> Snapshot {
        let mut state = self.inner.lock().await;
        let snapshot = Snapshot {
            id: state.id.clone(),
            previous_id: state.previous_id.take(),
            record: state.record.clone(),
            fresh: state.fresh,
            dirty: state.dirty,
        };
        state.fresh = false;
        state.dirty = false;
        snapshot
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or(AppError::SessionUnavailable)
    }
}
