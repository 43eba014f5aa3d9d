//! Plugin types shipped with the framework, one module per domain.

pub mod broadcaster;
pub mod filter;
pub mod predicate;
pub mod storage;
pub mod strategy;
