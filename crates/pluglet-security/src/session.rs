//! SSO sessions held by signed-in accounts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pluglet_framework::SecurityExchange;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{Clock, later};
use crate::store::ExpiringStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub account_id: String,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionManager {
    store: ExpiringStore<Session>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: ExpiringStore::new("sessions", Arc::clone(&clock)),
            clock,
        }
    }

    pub fn issue(
        &self,
        tenant: &str,
        account_id: &str,
        issuer: &str,
        timeout: Duration,
    ) -> Session {
        let issued_at = self.clock.now();
        let session = Session {
            token: format!("ST-{}", Uuid::new_v4().simple()),
            account_id: account_id.to_owned(),
            issuer: issuer.to_owned(),
            issued_at,
            expires_at: later(issued_at, timeout),
        };
        self.store
            .put_until(tenant, &session.token, session.clone(), session.expires_at);
        debug!(tenant, account = account_id, "Session issued");
        session
    }

    /// The live session behind `token`.
    pub fn verify(&self, tenant: &str, token: &str) -> Option<Session> {
        self.store.get(tenant, token)
    }

    /// The live session named by the exchange's session cookie.
    pub fn current(&self, exchange: &SecurityExchange, cookie: &str) -> Option<Session> {
        let token = exchange.request().cookie(cookie)?;
        self.verify(exchange.tenant_code(), token)
    }

    pub fn revoke(&self, tenant: &str, token: &str) -> bool {
        self.store.remove(tenant, token)
    }

    pub fn sweep(&self) -> usize {
        self.store.sweep()
    }
}
