//! Pending consent decisions.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::scope::Scopes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationTransaction {
    pub id: String,
    pub client_id: String,
    /// The authorization request URL the transaction was opened for.
    pub request_url: String,
    pub digest: String,
    pub scopes: Scopes,
    pub granted_scopes: Scopes,
    pub granted: bool,
    pub session_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// SHA-256 of a full request URL, hex encoded.
pub fn request_digest(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            request_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(request_digest("https://a/?x=1"), request_digest("https://a/?x=2"));
    }
}
