//! Read-only snapshots of applications and accounts.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A client application allowed to request authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub secret: String,
    /// Base URL; redirect targets must start with `url + context_path`.
    pub url: String,
    #[serde(default)]
    pub context_path: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl Application {
    /// The lower-cased prefix every redirect target must start with.
    pub fn redirect_prefix(&self) -> String {
        format!("{}{}", self.url, self.context_path).to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

fn enabled() -> bool {
    true
}

/// Where the identity endpoints look up applications and accounts.
pub trait Directory: Send + Sync {
    fn application(&self, tenant: &str, code: &str) -> Option<Application>;

    fn account(&self, tenant: &str, id: &str) -> Option<Account>;

    /// The account whose username and password match.
    fn authenticate(&self, tenant: &str, username: &str, password: &str) -> Option<Account>;

    /// Replaces an account's password; `false` when the account is unknown.
    fn change_password(&self, tenant: &str, id: &str, password: &str) -> bool;
}

#[derive(Debug, Clone)]
struct Credential {
    account: Account,
    digest: String,
}

#[derive(Debug, Default)]
struct TenantEntries {
    applications: HashMap<String, Application>,
    accounts: HashMap<String, Credential>,
}

/// In-memory directory filled from configuration.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    tenants: RwLock<HashMap<String, TenantEntries>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_application(&self, tenant: &str, application: Application) {
        self.tenants
            .write()
            .entry(tenant.to_owned())
            .or_default()
            .applications
            .insert(application.code.clone(), application);
    }

    pub fn insert_account(&self, tenant: &str, account: Account, password: &str) {
        let credential = Credential {
            digest: password_digest(password),
            account,
        };
        self.tenants
            .write()
            .entry(tenant.to_owned())
            .or_default()
            .accounts
            .insert(credential.account.id.clone(), credential);
    }

    pub fn with_application(self, tenant: &str, application: Application) -> Self {
        self.insert_application(tenant, application);
        self
    }

    pub fn with_account(self, tenant: &str, account: Account, password: &str) -> Self {
        self.insert_account(tenant, account, password);
        self
    }
}

impl Directory for StaticDirectory {
    fn application(&self, tenant: &str, code: &str) -> Option<Application> {
        self.tenants.read().get(tenant)?.applications.get(code).cloned()
    }

    fn account(&self, tenant: &str, id: &str) -> Option<Account> {
        let tenants = self.tenants.read();
        tenants.get(tenant)?.accounts.get(id).map(|c| c.account.clone())
    }

    fn authenticate(&self, tenant: &str, username: &str, password: &str) -> Option<Account> {
        let digest = password_digest(password);
        let tenants = self.tenants.read();
        tenants
            .get(tenant)?
            .accounts
            .values()
            .find(|c| c.account.username == username && c.digest == digest)
            .map(|c| c.account.clone())
    }

    fn change_password(&self, tenant: &str, id: &str, password: &str) -> bool {
        let mut tenants = self.tenants.write();
        match tenants.get_mut(tenant).and_then(|t| t.accounts.get_mut(id)) {
            Some(credential) => {
                credential.digest = password_digest(password);
                true
            }
            None => false,
        }
    }
}

fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
