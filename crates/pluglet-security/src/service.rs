//! Runs the tenant's security strategies in front of every identity endpoint.

use std::sync::Arc;

use pluglet_core::BoxError;
use pluglet_framework::{
    Reply, SecurityExchange, SecurityRequest, StrategyPipeline, Terminal, dispatch_security,
};
use tower::service_fn;
use tower::util::BoxCloneSyncService;
use tracing::{Instrument, debug, error, info_span};

use crate::account::AccountService;
use crate::clock::Clock;
use crate::directory::Directory;
use crate::error::OAuthError;
use crate::oauth::AuthorizationFlow;
use crate::session::SessionManager;
use crate::settings::SecuritySettings;

/// The identity endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Authorize,
    ConsentInfo,
    Consent,
    AccessToken,
    User,
    Login,
    Logout,
    ChangePassword,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::ConsentInfo => "consent_info",
            Self::Consent => "consent",
            Self::AccessToken => "access_token",
            Self::User => "user",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::ChangePassword => "change_password",
        }
    }
}

pub struct SecurityService {
    settings: Arc<SecuritySettings>,
    strategies: Arc<StrategyPipeline>,
    sessions: Arc<SessionManager>,
    flow: Arc<AuthorizationFlow>,
    accounts: Arc<AccountService>,
}

impl SecurityService {
    pub fn new(
        settings: SecuritySettings,
        strategies: Arc<StrategyPipeline>,
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = Arc::new(settings);
        let sessions = Arc::new(SessionManager::new(Arc::clone(&clock)));
        let flow = AuthorizationFlow::new(
            Arc::clone(&settings),
            Arc::clone(&directory),
            Arc::clone(&sessions),
            clock,
        );
        let accounts = AccountService::new(Arc::clone(&settings), directory, Arc::clone(&sessions));
        Self {
            settings,
            strategies,
            sessions,
            flow: Arc::new(flow),
            accounts: Arc::new(accounts),
        }
    }

    pub fn settings(&self) -> &SecuritySettings {
        &self.settings
    }

    pub fn strategies(&self) -> &Arc<StrategyPipeline> {
        &self.strategies
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn flow(&self) -> &Arc<AuthorizationFlow> {
        &self.flow
    }

    /// Answers one identity request for `tenant`.
    pub async fn handle(
        &self,
        endpoint: Endpoint,
        tenant: &str,
        request: SecurityRequest,
    ) -> Reply {
        let exchange = Arc::new(SecurityExchange::new(tenant, request));
        let span = info_span!("security", tenant, endpoint = endpoint.as_str());

        let terminal = self.terminal(endpoint);
        let result = dispatch_security(&self.strategies, Arc::clone(&exchange), terminal)
            .instrument(span)
            .await;
        match result {
            Ok(()) => exchange.take_reply().unwrap_or_else(|| {
                error!(tenant, endpoint = endpoint.as_str(), "Security chain produced no reply");
                OAuthError::Internal("no reply produced".into()).into_reply()
            }),
            Err(e) => {
                error!(tenant, endpoint = endpoint.as_str(), error = %e, "Security chain failed");
                OAuthError::Internal(e.to_string()).into_reply()
            }
        }
    }

    /// Drops expired sessions, codes, transactions and access tokens.
    pub fn sweep(&self) -> usize {
        self.flow.sweep() + self.sessions.sweep()
    }

    fn terminal(&self, endpoint: Endpoint) -> Terminal<SecurityExchange> {
        let flow = Arc::clone(&self.flow);
        let accounts = Arc::clone(&self.accounts);
        BoxCloneSyncService::new(service_fn(move |exchange: Arc<SecurityExchange>| {
            let result = match endpoint {
                Endpoint::Authorize => flow.authorize(&exchange),
                Endpoint::ConsentInfo => flow.consent_info(&exchange),
                Endpoint::Consent => flow.consent(&exchange),
                Endpoint::AccessToken => flow.access_token(&exchange),
                Endpoint::User => flow.user(&exchange),
                Endpoint::Login => accounts.login(&exchange),
                Endpoint::Logout => accounts.logout(&exchange),
                Endpoint::ChangePassword => accounts.change_password(&exchange),
            };
            let reply = result.unwrap_or_else(|e| {
                debug!(endpoint = endpoint.as_str(), error = %e, "Identity request rejected");
                e.into_reply()
            });
            exchange.respond(reply);
            std::future::ready(Ok::<_, BoxError>(()))
        }))
    }
}
