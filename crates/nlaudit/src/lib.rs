//! Async netlink library for Linux process auditing.
//!
//! This crate talks to two kernel facilities over netlink: the audit
//! subsystem (`NETLINK_AUDIT`), for reading and changing audit status and
//! installing rules, and the process connector (`NETLINK_CONNECTOR`), for
//! fork, exec and exit notifications.
//!
//! # Features
//!
//! - `serde` - `Serialize`/`Deserialize` for status and event types
//! - `integration` - Enable integration tests (require root)
//!
//! # Example
//!
//! ```ignore
//! use nlaudit::netlink::{Audit, Connection};
//!
//! #[tokio::main]
//! async fn main() -> nlaudit::Result<()> {
//!     let mut conn = Connection::<Audit>::new()?;
//!
//!     let status = conn.get_status().await?;
//!     println!("audit enabled: {}", status.is_enabled());
//!
//!     conn.close()
//! }
//! ```
//!
//! # Watching Processes
//!
//! ```ignore
//! use nlaudit::netlink::watcher::{ProcEventMask, ProcessWatcher, WatchEvent};
//!
//! let (watcher, mut events) = ProcessWatcher::new().await?;
//! watcher.watch(pid, ProcEventMask::EXEC | ProcEventMask::EXIT)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let WatchEvent::Exit { pid, .. } = event {
//!         println!("{} exited", pid);
//!         break;
//!     }
//! }
//!
//! watcher.close().await?;
//! ```

pub mod netlink;

// Re-export common types at crate root for convenience
pub use netlink::{Audit, Connection, Connector, Error, Protocol, Result};
