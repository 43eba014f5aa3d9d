//! Errors answered by the identity endpoints.

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

use pluglet_framework::Reply;

use crate::routes::reply_response;

/// A rejected identity request. Every variant maps to one HTTP status and
/// one machine-readable `error` code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OAuthError {
    #[error("OAuth 2.0 is disabled for this tenant")]
    Disabled,

    #[error("unknown or disabled client '{0}'")]
    InvalidClient(String),

    #[error("redirect uri '{0}' does not belong to the client")]
    InvalidRedirect(String),

    #[error("{0}")]
    InvalidGrant(&'static str),

    #[error("authorization transaction is missing or expired")]
    InvalidTransaction,

    #[error("authorization request does not match its transaction")]
    TamperDetected,

    #[error("authentication required")]
    Unauthenticated,

    #[error("wrong username or password")]
    InvalidCredentials,

    #[error("{}", .0.join("; "))]
    InvalidPassword(Vec<String>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OAuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_)
            | Self::InvalidRedirect(_)
            | Self::InvalidGrant(_)
            | Self::InvalidTransaction
            | Self::InvalidPassword(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Disabled | Self::TamperDetected => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "oauth_disabled",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidRedirect(_) => "invalid_redirect_uri",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidTransaction => "invalid_transaction",
            Self::TamperDetected => "tamper_detected",
            Self::Unauthenticated => "unauthorized",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidPassword(_) => "invalid_password",
            Self::Internal(_) => "server_error",
        }
    }

    pub fn into_reply(self) -> Reply {
        Reply::json(
            self.status(),
            &json!({
                "error": self.code(),
                "error_description": self.to_string(),
            }),
        )
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        reply_response(self.into_reply())
    }
}
