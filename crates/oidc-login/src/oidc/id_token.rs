//! ID token claim checks.
//!
//! The token's signature is not verified; it arrives directly from the token
//! endpoint over TLS. Claims are still checked against what this login expects.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::config::defaults::ID_TOKEN_LEEWAY_SECS;
use crate::error::{AuthError, AuthResult};

/// `aud` is either a single string or an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }

    fn is_multiple(&self) -> bool {
        matches!(self, Self::Many(auds) if auds.len() > 1)
    }
}

/// Claims this server looks at.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub azp: Option<String>,
}

/// What a login expects the ID token to say.
#[derive(Debug, Clone, Copy)]
pub struct Expected<'a> {
    pub issuer: &'a str,
    pub client_id: &'a str,
    pub nonce: &'a str,
    /// Unix seconds.
    pub now: i64,
}

impl IdTokenClaims {
    /// Decode the payload segment of a compact JWS.
    pub fn decode(token: &str) -> AuthResult<Self> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (segments.next(), segments.next(), segments.next(), segments.next())
        else {
            return Err(AuthError::invalid_id_token("expected three segments"));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| AuthError::invalid_id_token(format!("payload is not base64url: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::invalid_id_token(format!("payload is not a claim set: {e}")))
    }

    /// Check issuer, audience, authorized party, expiry, issue time and nonce.
    ///
    /// `exp` and `iat` are allowed [`ID_TOKEN_LEEWAY_SECS`] of clock skew.
    pub fn validate(&self, expected: &Expected<'_>) -> AuthResult<()> {
        if self.iss != expected.issuer {
            return Err(AuthError::invalid_id_token(format!("unexpected issuer '{}'", self.iss)));
        }
        if !self.aud.contains(expected.client_id) {
            return Err(AuthError::invalid_id_token("audience does not include client id"));
        }
        if self.aud.is_multiple() && self.azp.as_deref() != Some(expected.client_id) {
            return Err(AuthError::invalid_id_token("authorized party is not this client"));
        }
        if self.exp.saturating_add(ID_TOKEN_LEEWAY_SECS) <= expected.now {
            return Err(AuthError::invalid_id_token("token expired"));
        }
        if self.iat.is_some_and(|iat| iat > expected.now.saturating_add(ID_TOKEN_LEEWAY_SECS)) {
            return Err(AuthError::invalid_id_token("token issued in the future"));
        }
        if self.nonce.as_deref() != Some(expected.nonce) {
            return Err(AuthError::invalid_id_token("nonce mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    fn expected() -> Expected<'static> {
        Expected { issuer: "https://idp.example", client_id: "cid", nonce: "n-1", now: 1_000 }
    }

    fn claims() -> serde_json::Value {
        serde_json::json!({
            "iss": "https://idp.example",
            "sub": "user-1",
            "aud": "cid",
            "exp": 2_000,
            "iat": 900,
            "nonce": "n-1"
        })
    }

    #[test]
    fn test_valid_token() {
        let claims = IdTokenClaims::decode(&encode(&claims())).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(claims.validate(&expected()).is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(IdTokenClaims::decode("only.two").is_err());
        assert!(IdTokenClaims::decode("a.b.c.d").is_err());
        assert!(IdTokenClaims::decode("a.!!!.c").is_err());
    }

    #[test]
    fn test_rejects_wrong_issuer() {
        let mut raw = claims();
        raw["iss"] = "https://evil.example".into();
        let claims = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(claims.validate(&expected()).is_err());
    }

    #[test]
    fn test_rejects_expired() {
        let mut raw = claims();
        raw["exp"] = (1_000 - ID_TOKEN_LEEWAY_SECS).into();
        let claims = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(claims.validate(&expected()).is_err());
    }

    #[test]
    fn test_expiry_within_leeway() {
        let mut raw = claims();
        raw["exp"] = (1_000 - ID_TOKEN_LEEWAY_SECS + 1).into();
        let claims = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(claims.validate(&expected()).is_ok());
    }

    #[test]
    fn test_rejects_future_issue_time() {
        let mut raw = claims();
        raw["iat"] = (1_000 + ID_TOKEN_LEEWAY_SECS + 1).into();
        let claims = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(claims.validate(&expected()).is_err());

        raw["iat"] = (1_000 + ID_TOKEN_LEEWAY_SECS).into();
        let claims = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(claims.validate(&expected()).is_ok());
    }

    #[test]
    fn test_rejects_nonce_mismatch() {
        let mut raw = claims();
        raw["nonce"] = "other".into();
        let claims = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(claims.validate(&expected()).is_err());
    }

    #[test]
    fn test_multiple_audiences_need_azp() {
        let mut raw = claims();
        raw["aud"] = serde_json::json!(["cid", "other"]);
        let without_azp = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(without_azp.validate(&expected()).is_err());

        raw["azp"] = "cid".into();
        let with_azp = IdTokenClaims::decode(&encode(&raw)).unwrap();
        assert!(with_azp.validate(&expected()).is_ok());
    }
}
