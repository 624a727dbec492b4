//! auditmon command implementations.

pub mod audit;
pub mod rule;
pub mod watch;
