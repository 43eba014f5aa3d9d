//! Sign-in, sign-out and password change.

use std::sync::Arc;

use http::StatusCode;
use pluglet_framework::builtin::strategy::attributes::{password, session};
use pluglet_framework::{Reply, SecurityExchange};
use serde_json::json;
use tracing::info;

use crate::cookie::{clear_cookie, set_cookie};
use crate::directory::Directory;
use crate::error::OAuthError;
use crate::session::SessionManager;
use crate::settings::{SecuritySettings, resolve};

pub struct AccountService {
    settings: Arc<SecuritySettings>,
    directory: Arc<dyn Directory>,
    sessions: Arc<SessionManager>,
}

impl AccountService {
    pub fn new(
        settings: Arc<SecuritySettings>,
        directory: Arc<dyn Directory>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            settings,
            directory,
            sessions,
        }
    }

    /// `POST /sso/login`
    ///
    /// Opens a session and sets the session cookie. A `redirect_uri` on this
    /// server is followed; anything else gets the session as JSON.
    pub fn login(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        let tenant = exchange.tenant_code();
        let request = exchange.request();
        let username = request.param("username").unwrap_or_default();
        let account = self
            .directory
            .authenticate(tenant, username, request.param("password").unwrap_or_default())
            .ok_or(OAuthError::InvalidCredentials)?;

        let timeout = resolve(exchange, &session::TIMEOUT, &self.settings.session_timeout);
        let issuer = resolve(exchange, &session::ISSUER, &self.settings.session_issuer);
        let session = self.sessions.issue(tenant, &account.id, &issuer, timeout);
        let cookie = set_cookie(&self.settings.session_cookie, &session.token, timeout);
        info!(tenant, account = %account.id, "Signed in");

        let return_to = request
            .param("redirect_uri")
            .filter(|target| target.starts_with(self.settings.base_url()));
        let reply = match return_to {
            Some(target) => Reply::redirect(target),
            None => Reply::json(
                StatusCode::OK,
                &json!({
                    "token": session.token,
                    "issuer": session.issuer,
                    "expiresAt": session.expires_at,
                }),
            ),
        };
        Ok(reply.with_cookie(&cookie))
    }

    /// `POST /sso/logout`
    pub fn logout(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        let cookie = &self.settings.session_cookie;
        if let Some(token) = exchange.request().cookie(cookie) {
            self.sessions.revoke(exchange.tenant_code(), token);
        }
        Ok(Reply::new(StatusCode::NO_CONTENT).with_cookie(&clear_cookie(cookie)))
    }

    /// `POST /sso/password`: checks the tenant's password policy, if any.
    pub fn change_password(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        let tenant = exchange.tenant_code();
        let session = self
            .sessions
            .current(exchange, &self.settings.session_cookie)
            .ok_or(OAuthError::Unauthenticated)?;
        let account = self
            .directory
            .account(tenant, &session.account_id)
            .ok_or(OAuthError::Unauthenticated)?;

        let request = exchange.request();
        let current = request.param("password").unwrap_or_default();
        if self.directory.authenticate(tenant, &account.username, current).is_none() {
            return Err(OAuthError::InvalidCredentials);
        }

        let replacement = request.param("new_password").unwrap_or_default();
        if let Some(policy) = exchange.attribute(&password::POLICY) {
            let violations = policy.check(replacement);
            if !violations.is_empty() {
                return Err(OAuthError::InvalidPassword(violations));
            }
        }
        if !self.directory.change_password(tenant, &account.id, replacement) {
            return Err(OAuthError::Internal(format!("account '{}' vanished", account.id)));
        }
        info!(tenant, account = %account.id, "Password changed");
        Ok(Reply::new(StatusCode::NO_CONTENT))
    }
}
