//! In-memory session store.
//!
//! Backed by a `moka` cache: entries expire after the configured idle time and
//! the store never holds more than the configured number of sessions.

use moka::Entry;
use moka::future::Cache;
use moka::ops::compute::Op;

use super::{Session, SessionRecord};
use crate::config::Config;
use crate::oidc::PendingLogin;

/// Process-local session storage, cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, SessionRecord>,
}

impl SessionStore {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let sessions = Cache::builder()
            .max_capacity(config.session_max_entries)
            .time_to_idle(config.session_ttl)
            .build();
        Self { sessions }
    }

    /// Generate a session id (two UUIDs, 256 bits).
    pub(super) fn generate_id() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    /// Load the session for `id`, or start a fresh one.
    ///
    /// Returns the session and whether it was newly created.
    pub async fn load_or_create(&self, id: Option<&str>) -> (Session, bool) {
        if let Some(id) = id {
            if let Some(record) = self.sessions.get(id).await {
                return (Session::new(id.to_string(), record, false, self.clone()), false);
            }
            tracing::debug!("Session cookie refers to an unknown or expired session");
        }

        let id = Self::generate_id();
        (Session::new(id, SessionRecord::default(), true, self.clone()), true)
    }

    /// Remove and return the pending login stored under `id`.
    ///
    /// Runs as one step on the cache entry, so of several concurrent callers
    /// at most one gets the login.
    pub async fn take_pending_login(&self, id: &str) -> Option<PendingLogin> {
        let mut taken = None;
        self.sessions
            .entry_by_ref(id)
            .and_compute_with(|entry| {
                let op = match entry.map(Entry::into_value) {
                    Some(mut record) if record.pending_login.is_some() => {
                        taken = record.pending_login.take();
                        Op::Put(record)
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        taken
    }

    /// Write the session back if this request changed it.
    ///
    /// A regenerated session drops its previous id. An existing session that
    /// disappeared from the store meanwhile (invalidated or expired) is not
    /// brought back. Returns the id the cookie must carry.
    pub async fn save(&self, session: &Session) -> String {
        let snapshot = session.checkpoint().await;
        if let Some(ref previous) = snapshot.previous_id {
            self.sessions.invalidate(previous).await;
        }
        if !snapshot.dirty {
            return snapshot.id;
        }

        if snapshot.fresh {
            self.sessions.insert(snapshot.id.clone(), snapshot.record).await;
        } else {
            let record = snapshot.record;
            self.sessions
                .entry_by_ref(snapshot.id.as_str())
                .and_compute_with(|entry| {
                    std::future::ready(if entry.is_some() { Op::Put(record) } else { Op::Nop })
                })
                .await;
        }
        snapshot.id
    }

    /// Stored record for `id`, if any.
    pub async fn get(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.get(id).await
    }

    /// Approximate number of stored sessions.
    pub async fn session_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish()
    }
}
