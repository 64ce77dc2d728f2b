//! OAuth security parameter generation: PKCE verifier/challenge, CSRF state,
//! OIDC nonce.
//!
//! All randomness comes from the thread-local CSPRNG; a failure to obtain
//! entropy aborts rather than degrading to weaker values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE code verifier and S256 challenge pair (RFC 7636).
///
/// The verifier is the secret held server-side until token exchange; the
/// challenge travels in the authorization request so the provider can bind
/// the issued code to this login attempt.
#[derive(Debug, Clone)]
pub struct PkceCodes {
    pub verifier: String,
    pub challenge: String,
}

impl PkceCodes {
    /// Generate a fresh pair. 32 random bytes encode to a 43-character
    /// base64url verifier, within the RFC's 43-128 range.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);

        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Recompute the S256 challenge for a verifier.
    pub fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }
}

/// CSRF `state` parameter: 128 bits of entropy, hex-encoded.
pub fn generate_state() -> String {
    random_hex_token()
}

/// OIDC `nonce` parameter: 128 bits of entropy, hex-encoded.
pub fn generate_nonce() -> String {
    random_hex_token()
}

fn random_hex_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_has_rfc7636_length_and_alphabet() {
        let codes = PkceCodes::generate();
        assert!(codes.verifier.len() >= 43 && codes.verifier.len() <= 128);
        assert!(codes
            .verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(codes
            .challenge
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn challenge_recomputes_from_verifier() {
        let codes = PkceCodes::generate();
        assert_eq!(codes.challenge, PkceCodes::challenge_for(&codes.verifier));
    }

    #[test]
    fn pairs_are_unique() {
        let a = PkceCodes::generate();
        let b = PkceCodes::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn state_and_nonce_are_32_hex_chars() {
        for token in [generate_state(), generate_nonce()] {
            assert_eq!(token.len(), 32);
            assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        }
        assert_ne!(generate_state(), generate_state());
    }
}
