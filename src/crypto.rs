//! API token generation and hashing.
//!
//! Tokens are shown once at creation time; only the SHA-256 hash is stored.
//! Token issuance flows (login, OAuth) live outside this service.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a new bearer token with a recognizable prefix.
pub fn generate_api_token() -> String {
    format!(
        "cdk_{}{}",
        Uuid::new_v4().as_simple(),
        Uuid::new_v4().as_simple()
    )
}

/// Hash a token for storage and lookup.
pub fn hash_api_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_format() {
        let token = generate_api_token();
        assert!(token.starts_with("cdk_"));
        assert_eq!(token.len(), 4 + 64);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let token = generate_api_token();
        assert_eq!(hash_api_token(&token), hash_api_token(&token));
        assert_ne!(hash_api_token(&token), hash_api_token("other"));
    }
}
