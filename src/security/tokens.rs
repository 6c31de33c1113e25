// ABOUTME: Random one-time tokens for emailed links and their SHA-256 storage digests
// ABOUTME: Plain tokens leave the server only inside the email; the database sees the digest
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use account_core::constants::tokens::TOKEN_BYTES;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Freshly generated token and the digest to persist
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Value to put in the emailed link
    pub token: String,
    /// Hex SHA-256 of `token`
    pub hash: String,
}

/// Generate a URL-safe random token
#[must_use]
pub fn generate_token() -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_token(&token);
    IssuedToken { token, hash }
}

/// Hash a token for storage and lookup
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two secrets without leaking the position of the first difference
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 43);
        assert!(a
            .token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_matches_issued_digest() {
        let issued = generate_token();
        assert_eq!(hash_token(&issued.token), issued.hash);
        assert_eq!(issued.hash.len(), 64);
        assert_ne!(issued.hash, issued.token);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secret-longer"));
    }
}
