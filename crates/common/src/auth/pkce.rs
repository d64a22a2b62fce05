//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for authorization without a client secret. The
//! verifier is sampled from the full unreserved alphabet rather than derived
//! from random bytes, so every one of the 66 symbols can appear.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Unreserved characters allowed in a code verifier (RFC 7636 §4.1)
const VERIFIER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of generated verifiers (the RFC minimum)
pub const CODE_VERIFIER_LEN: usize = 43;

/// Generate a fresh code verifier
///
/// Returns exactly 43 characters, each drawn uniformly from
/// `[A-Za-z0-9-._~]` using the thread-local CSPRNG (seeded from the OS).
#[must_use]
pub fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_VERIFIER_LEN)
        .map(|_| char::from(VERIFIER_ALPHABET[rng.gen_range(0..VERIFIER_ALPHABET.len())]))
        .collect()
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier))).
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    base64url_encode(&hasher.finalize())
}

/// Encode bytes as unpadded base64url
///
/// Standard base64 with `+` → `-`, `/` → `_` and trailing `=` removed.
#[must_use]
pub fn base64url_encode(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    encoded.trim_end_matches('=').replace('+', "-").replace('/', "_")
}

/// PKCE verifier/challenge pair for one authorization attempt
///
/// The verifier stays on this device until token exchange; only the
/// challenge is sent with the authorization request.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a new pair
    ///
    /// # Examples
    /// ```
    /// use thermowatch_common::auth::pkce::PkceChallenge;
    ///
    /// let pkce = PkceChallenge::generate();
    /// assert_eq!(pkce.code_verifier.len(), 43);
    /// assert_eq!(pkce.challenge_method(), "S256");
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(generate_code_verifier())
    }

    /// Build the pair for an existing verifier
    #[must_use]
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &str {
        "S256"
    }
}
