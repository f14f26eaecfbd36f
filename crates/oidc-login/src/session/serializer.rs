//! Hooks deciding what part of a profile is kept in the session.

use crate::error::SessionError;
use crate::oidc::IdentityProfile;

/// Converts profiles to and from their stored form.
pub trait ProfileSerializer: Send + Sync {
    /// Value to store after a successful login.
    fn serialize(&self, profile: &IdentityProfile) -> Result<serde_json::Value, SessionError>;

    /// Profile for a stored value on later requests.
    fn deserialize(&self, stored: serde_json::Value) -> Result<IdentityProfile, SessionError>;
}

/// Stores the entire profile and hands it back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeProfile;

impl ProfileSerializer for WholeProfile {
    fn serialize(&self, profile: &IdentityProfile) -> Result<serde_json::Value, SessionError> {
        Ok(serde_json::to_value(profile)?)
    }

    fn deserialize(&self, stored: serde_json::Value) -> Result<IdentityProfile, SessionError> {
        Ok(serde_json::from_value(stored)?)
    }
}
