//! The five plugin domains and the services built on their pipelines.

pub mod broadcaster;
pub mod collector;
pub mod filter;
pub mod log;
pub mod predicate;
pub mod storage;
pub mod strategy;
