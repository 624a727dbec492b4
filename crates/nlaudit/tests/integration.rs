//! Integration test entry point.
//!
//! These tests talk to the running kernel. Audit tests need
//! `CAP_AUDIT_CONTROL` and watcher tests need `CAP_NET_ADMIN`, so run them
//! as root:
//!
//! ```bash
//! # Run all integration tests
//! sudo cargo test -p nlaudit --features integration --test integration
//!
//! # Run one module
//! sudo cargo test -p nlaudit --features integration --test integration watcher
//! ```
//!
//! Without root every test returns early.
//!
//! # Test Organization
//!
//! - `audit.rs` - Status queries, status updates and rule installation
//! - `watcher.rs` - Process connector and per-process watches

#[macro_use]
#[path = "common/mod.rs"]
mod common;

#[path = "integration/audit.rs"]
mod audit;

#[path = "integration/watcher.rs"]
mod watcher;
