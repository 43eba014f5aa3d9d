//! # Pluglet Security
//!
//! The identity service of Pluglet: an OAuth 2.0 authorization-code grant
//! with one-time codes and consent transactions, run behind each tenant's
//! security strategy chain.
//!
//! - [`SecurityService`]: strategies first, then the endpoint
//! - [`AuthorizationFlow`]: authorize, consent, token exchange, current user
//! - [`ExpiringStore`]: tenant-scoped stores with atomic take
//! - [`router`]: the axum routes

pub mod account;
pub mod clock;
pub mod cookie;
pub mod directory;
pub mod error;
pub mod oauth;
pub mod routes;
pub mod service;
pub mod session;
pub mod settings;
pub mod store;

pub use account::AccountService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{Account, Application, Directory, StaticDirectory};
pub use error::OAuthError;
pub use oauth::{AuthorizationFlow, Scope, Scopes};
pub use routes::{TENANT_HEADER, router};
pub use service::{Endpoint, SecurityService};
pub use session::{Session, SessionManager};
pub use settings::SecuritySettings;
pub use store::ExpiringStore;
