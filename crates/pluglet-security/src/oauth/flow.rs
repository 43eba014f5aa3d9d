//! The authorization-code flow.
//!
//! ```text
//! authorize ──no session──▶ login ──▶ GET/POST /scopes ──▶ authorize ──▶ redirect?code=&state=
//!                                                                          │
//! client ◀── access_token ◀── code ◀───────────────────────────────────────┘
//! ```
//!
//! Codes and transactions are single use: both are taken out of their store
//! before they are looked at, so a replay finds nothing.

use std::sync::Arc;

use http::StatusCode;
use pluglet_framework::builtin::strategy::attributes::oauth;
use pluglet_framework::{Reply, SecurityExchange};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use url::{Url, form_urlencoded};
use uuid::Uuid;

use super::code::{AuthorizationCode, CODE_SERIAL, CodeSerial};
use super::scope::{Scope, Scopes, join_scopes, parse_scopes};
use super::token::AccessToken;
use super::transaction::{AuthorizationTransaction, request_digest};
use crate::clock::{Clock, later};
use crate::cookie::{clear_cookie, set_cookie};
use crate::directory::{Account, Application, Directory};
use crate::error::OAuthError;
use crate::session::{Session, SessionManager};
use crate::settings::{SecuritySettings, resolve};
use crate::store::ExpiringStore;

pub struct AuthorizationFlow {
    settings: Arc<SecuritySettings>,
    directory: Arc<dyn Directory>,
    sessions: Arc<SessionManager>,
    codes: ExpiringStore<AuthorizationCode>,
    transactions: ExpiringStore<AuthorizationTransaction>,
    tokens: ExpiringStore<AccessToken>,
    serial: &'static CodeSerial,
    clock: Arc<dyn Clock>,
}

impl AuthorizationFlow {
    pub fn new(
        settings: Arc<SecuritySettings>,
        directory: Arc<dyn Directory>,
        sessions: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            directory,
            sessions,
            codes: ExpiringStore::new("codes", Arc::clone(&clock)),
            transactions: ExpiringStore::new("transactions", Arc::clone(&clock)),
            tokens: ExpiringStore::new("access_tokens", Arc::clone(&clock)),
            serial: &CODE_SERIAL,
            clock,
        }
    }

    /// `GET /authorize`
    pub fn authorize(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        if !resolve(exchange, &oauth::ENABLED, &self.settings.oauth_enabled) {
            return Err(OAuthError::Disabled);
        }

        let tenant = exchange.tenant_code();
        let request = exchange.request();
        let client_id = request.param("client_id").unwrap_or_default();
        let application = self.client(tenant, client_id)?;

        let redirect_uri = request.param("redirect_uri").unwrap_or_default();
        let redirect_allowed = redirect_uri
            .to_lowercase()
            .starts_with(&application.redirect_prefix());
        if !redirect_allowed || Url::parse(redirect_uri).is_err() {
            return Err(OAuthError::InvalidRedirect(redirect_uri.to_owned()));
        }

        let scopes = parse_scopes(request.param_values("scope"));
        let state = request.param("state");

        if resolve(exchange, &oauth::AUTO_GRANTING, &self.settings.auto_granting) {
            let session = self.sessions.current(exchange, &self.settings.session_cookie);
            let Some(session) = session else {
                debug!(tenant, client = client_id, "No session, redirecting to login");
                return Ok(self.login_redirect(&request.url));
            };
            let code = self.issue_code(exchange, client_id, redirect_uri, &session.token, scopes);
            return redirect_with(redirect_uri, &[("code", Some(code.as_str())), ("state", state)]);
        }

        let cookie = &self.settings.transaction_cookie;
        match request.cookie(cookie) {
            None => {
                let ttl = resolve(
                    exchange,
                    &oauth::TRANSACTION_TIMEOUT,
                    &self.settings.transaction_timeout,
                );
                let transaction = AuthorizationTransaction {
                    id: Uuid::new_v4().simple().to_string(),
                    client_id: client_id.to_owned(),
                    request_url: request.url.clone(),
                    digest: request_digest(&request.url),
                    scopes,
                    granted_scopes: Scopes::new(),
                    granted: false,
                    session_token: None,
                    expires_at: later(self.clock.now(), ttl),
                };
                debug!(
                    tenant,
                    client = client_id,
                    transaction = %transaction.id,
                    "Authorization transaction opened"
                );
                let set = set_cookie(cookie, &transaction.id, ttl);
                self.transactions.put_until(
                    tenant,
                    &transaction.id,
                    transaction.clone(),
                    transaction.expires_at,
                );
                Ok(self.login_redirect(&request.url).with_cookie(&set))
            }
            Some(id) => {
                let reply = self
                    .complete(exchange, id, redirect_uri, state)
                    .unwrap_or_else(OAuthError::into_reply);
                Ok(reply.with_cookie(&clear_cookie(cookie)))
            }
        }
    }

    /// Closes the transaction named by the cookie and answers the client.
    fn complete(
        &self,
        exchange: &SecurityExchange,
        id: &str,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<Reply, OAuthError> {
        let tenant = exchange.tenant_code();
        let transaction = self
            .transactions
            .take(tenant, id)
            .ok_or(OAuthError::InvalidTransaction)?;

        if transaction.digest != request_digest(&exchange.request().url) {
            warn!(tenant, transaction = id, "Authorization request does not match its transaction");
            return Err(OAuthError::TamperDetected);
        }

        let session_token = match (transaction.granted, transaction.session_token) {
            (true, Some(token)) => token,
            _ => {
                info!(tenant, client = %transaction.client_id, "Authorization denied");
                let params = [("error", Some("access_denied")), ("state", state)];
                return redirect_with(redirect_uri, &params);
            }
        };

        let code = self.issue_code(
            exchange,
            &transaction.client_id,
            redirect_uri,
            &session_token,
            transaction.granted_scopes,
        );
        redirect_with(redirect_uri, &[("code", Some(code.as_str())), ("state", state)])
    }

    /// `GET /scopes`: what the consent page shows. Leaves the transaction open.
    pub fn consent_info(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        let tenant = exchange.tenant_code();
        let session = self.session(exchange)?;
        let transaction = self.open_transaction(exchange)?;

        let application = self
            .directory
            .application(tenant, &transaction.client_id)
            .ok_or_else(|| OAuthError::InvalidClient(transaction.client_id.clone()))?;
        let account = self
            .directory
            .account(tenant, &session.account_id)
            .ok_or(OAuthError::Unauthenticated)?;

        let scopes: Vec<Value> = transaction
            .scopes
            .iter()
            .map(|scope| {
                json!({
                    "name": scope.as_str(),
                    "description": scope.description(),
                    "required": scope.required(),
                })
            })
            .collect();
        Ok(Reply::json(
            StatusCode::OK,
            &json!({
                "account": account_view(&account, &Scopes::from([Scope::Basic])),
                "application": application_view(&application),
                "scopes": scopes,
            }),
        ))
    }

    /// `POST /scopes`: records the account's decision on the transaction.
    pub fn consent(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        let tenant = exchange.tenant_code();
        let session = self.session(exchange)?;
        let id = exchange
            .request()
            .cookie(&self.settings.transaction_cookie)
            .ok_or(OAuthError::InvalidTransaction)?;

        let request = exchange.request();
        let granted = request.param("granted").is_some_and(|v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
        });
        let chosen = parse_scopes(request.param_values("scopes"));

        let mut return_to = None;
        let updated = self.transactions.update(tenant, id, |transaction| {
            transaction.granted = granted;
            transaction.granted_scopes = if granted {
                transaction.scopes.intersection(&chosen).copied().collect()
            } else {
                Scopes::new()
            };
            transaction.session_token = Some(session.token.clone());
            return_to = Some(transaction.request_url.clone());
        });
        let return_to = return_to.filter(|_| updated).ok_or(OAuthError::InvalidTransaction)?;

        info!(tenant, account = %session.account_id, granted, "Consent recorded");
        Ok(Reply::redirect(&return_to))
    }

    /// `POST /access_token`
    pub fn access_token(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        let tenant = exchange.tenant_code();
        let request = exchange.request();
        let client_id = request.param("client_id").unwrap_or_default();
        let application = self.client(tenant, client_id)?;
        if request.param("client_secret") != Some(application.secret.as_str()) {
            return Err(OAuthError::InvalidClient(client_id.to_owned()));
        }

        let code = request
            .param("code")
            .ok_or(OAuthError::InvalidGrant("authorization code is missing"))?;
        let code = self
            .codes
            .take(tenant, code)
            .ok_or(OAuthError::InvalidGrant("authorization code is invalid or expired"))?;
        if code.client_id != client_id {
            warn!(tenant, client = client_id, "Authorization code presented by another client");
            return Err(OAuthError::InvalidGrant("authorization code was issued to another client"));
        }
        let session = self
            .sessions
            .verify(tenant, &code.session_token)
            .ok_or(OAuthError::InvalidGrant("session has ended"))?;

        let token = AccessToken {
            token: format!("AT-{}", Uuid::new_v4().simple()),
            client_id: client_id.to_owned(),
            session_token: session.token.clone(),
            scopes: code.scopes,
            expires_at: session.expires_at,
        };
        self.tokens
            .put_until(tenant, &token.token, token.clone(), token.expires_at);

        let expires_in = (token.expires_at - self.clock.now()).num_seconds().max(0);
        info!(tenant, client = client_id, account = %session.account_id, "Access token issued");
        Ok(Reply::json(
            StatusCode::OK,
            &json!({
                "access_token": token.token,
                "token_type": "Bearer",
                "expires_in": expires_in,
                "scope": join_scopes(&token.scopes),
            }),
        ))
    }

    /// `GET /user`
    pub fn user(&self, exchange: &SecurityExchange) -> Result<Reply, OAuthError> {
        let tenant = exchange.tenant_code();
        let bearer = exchange
            .request()
            .bearer_token()
            .ok_or(OAuthError::Unauthenticated)?;
        let token = self
            .tokens
            .get(tenant, bearer)
            .ok_or(OAuthError::Unauthenticated)?;
        let session = self
            .sessions
            .verify(tenant, &token.session_token)
            .ok_or(OAuthError::Unauthenticated)?;
        let account = self
            .directory
            .account(tenant, &session.account_id)
            .ok_or(OAuthError::Unauthenticated)?;
        Ok(Reply::json(StatusCode::OK, &account_view(&account, &token.scopes)))
    }

    /// Drops expired codes, transactions and access tokens.
    pub fn sweep(&self) -> usize {
        self.codes.sweep() + self.transactions.sweep() + self.tokens.sweep()
    }

    fn client(&self, tenant: &str, client_id: &str) -> Result<Application, OAuthError> {
        self.directory
            .application(tenant, client_id)
            .filter(|application| application.enabled)
            .ok_or_else(|| OAuthError::InvalidClient(client_id.to_owned()))
    }

    fn session(&self, exchange: &SecurityExchange) -> Result<Session, OAuthError> {
        self.sessions
            .current(exchange, &self.settings.session_cookie)
            .ok_or(OAuthError::Unauthenticated)
    }

    fn open_transaction(
        &self,
        exchange: &SecurityExchange,
    ) -> Result<AuthorizationTransaction, OAuthError> {
        let id = exchange
            .request()
            .cookie(&self.settings.transaction_cookie)
            .ok_or(OAuthError::InvalidTransaction)?;
        self.transactions
            .get(exchange.tenant_code(), id)
            .ok_or(OAuthError::InvalidTransaction)
    }

    fn issue_code(
        &self,
        exchange: &SecurityExchange,
        client_id: &str,
        redirect_uri: &str,
        session_token: &str,
        scopes: Scopes,
    ) -> String {
        let ttl = resolve(exchange, &oauth::CODE_TIMEOUT, &self.settings.code_timeout);
        let code = AuthorizationCode {
            code: self.serial.new_code(),
            client_id: client_id.to_owned(),
            redirect_uri: redirect_uri.to_owned(),
            session_token: session_token.to_owned(),
            scopes,
            expires_at: later(self.clock.now(), ttl),
        };
        info!(tenant = exchange.tenant_code(), client = client_id, "Authorization code issued");
        self.codes
            .put_until(exchange.tenant_code(), &code.code, code.clone(), code.expires_at);
        code.code
    }

    fn login_redirect(&self, return_to: &str) -> Reply {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect_uri", return_to)
            .finish();
        Reply::redirect(&format!(
            "{}{}?{query}",
            self.settings.base_url(),
            self.settings.login_path
        ))
    }
}

fn redirect_with(target: &str, pairs: &[(&str, Option<&str>)]) -> Result<Reply, OAuthError> {
    let mut url = Url::parse(target).map_err(|_| OAuthError::InvalidRedirect(target.to_owned()))?;
    {
        let mut query = url.query_pairs_mut();
        for (name, value) in pairs {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
    }
    Ok(Reply::redirect(url.as_str()))
}

/// The account fields the scopes allow.
fn account_view(account: &Account, scopes: &Scopes) -> Value {
    let mut view = Map::new();
    view.insert("id".into(), json!(account.id));
    view.insert("username".into(), json!(account.username));
    view.insert("name".into(), json!(account.name));
    view.insert("avatar".into(), json!(account.avatar));
    if scopes.contains(&Scope::Contact) {
        view.insert("email".into(), json!(account.email));
        view.insert("mobile".into(), json!(account.mobile));
    }
    Value::Object(view)
}

fn application_view(application: &Application) -> Value {
    json!({
        "code": application.code,
        "name": application.name,
        "url": application.url,
    })
}
