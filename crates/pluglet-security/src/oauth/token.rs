use chrono::{DateTime, Utc};

use super::scope::Scopes;

/// Access credential minted at the token endpoint, bound to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub client_id: String,
    pub session_token: String,
    pub scopes: Scopes,
    pub expires_at: DateTime<Utc>,
}
