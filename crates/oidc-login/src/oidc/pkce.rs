//! PKCE (Proof Key for Code Exchange) helpers.
//!
//! Implements S256 code challenges per RFC 7636.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Generate a code verifier (64 unreserved characters, 256 bits of randomness).
pub fn generate_verifier() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// Compute `BASE64URL(SHA256(code_verifier))`.
pub fn challenge_s256(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
