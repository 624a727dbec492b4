//! Async netlink plumbing for the Linux audit subsystem and the process
//! connector.
//!
//! # Quick Start
//!
//! ```ignore
//! use nlaudit::netlink::{Audit, Connection};
//!
//! let mut conn = Connection::<Audit>::new()?;
//!
//! let status = conn.get_status().await?;
//! println!("enabled={} pid={}", status.enabled, status.pid);
//!
//! // Register ourselves as the audit daemon
//! conn.set_enabled(true).await?;
//! conn.set_pid(std::process::id()).await?;
//! ```
//!
//! # Rules
//!
//! ```ignore
//! use nlaudit::netlink::audit_rule::{AuditAction, AuditField, AuditFilter, AuditOperator, AuditRule};
//!
//! let mut rule = AuditRule::new();
//! rule.set_syscall(libc::SYS_execve as u32)?;
//! rule.add_field(AuditField::Pid, AuditOperator::Equal, 1234)?;
//!
//! conn.add_rule(&mut rule, AuditFilter::Exit, AuditAction::Always).await?;
//! ```
//!
//! # Process Events
//!
//! The `watcher` module tracks individual processes on top of the raw
//! process connector stream:
//!
//! ```ignore
//! use nlaudit::netlink::watcher::{ProcEventMask, ProcessWatcher};
//!
//! let (watcher, mut events) = ProcessWatcher::new().await?;
//! watcher.watch(1234, ProcEventMask::ALL)?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod audit;
pub mod audit_rule;
mod builder;
pub mod codec;
pub mod connection;
pub mod connector;
mod error;
pub mod message;
mod protocol;
mod socket;
pub mod watcher;

pub use audit::{AuditFailureMode, AuditStatus};
pub use audit_rule::{AuditAction, AuditField, AuditFilter, AuditOperator, AuditRule};
pub use builder::MessageBuilder;
pub use codec::{ByteOrder, Codec, Record};
pub use connection::{Connection, ConnectionConfig};
pub use connector::{ProcControlOp, ProcEvent};
pub use error::{Error, Result};
pub use message::{MessageIter, NLMSG_HDRLEN, NetlinkMessage, NlMsgHdr, NlMsgType};
pub use protocol::{Audit, Connector, ProtocolState};
pub use socket::{NetlinkSocket, Protocol, RecvMode};
pub use watcher::{ProcEventMask, ProcessWatcher, WatchEvent, WatchEvents, WatcherConfig};
