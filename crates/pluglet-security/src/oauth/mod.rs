//! OAuth 2.0 authorization-code grant.

pub mod code;
pub mod flow;
pub mod scope;
pub mod token;
pub mod transaction;

pub use code::{AuthorizationCode, CODE_SERIAL, CodeSerial};
pub use flow::AuthorizationFlow;
pub use scope::{Scope, Scopes, parse_scopes};
pub use token::AccessToken;
pub use transaction::{AuthorizationTransaction, request_digest};
