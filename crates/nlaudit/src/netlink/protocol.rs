//! Protocol state types for strongly-typed connections.
//!
//! Each netlink family this crate speaks has a state type carried by
//! [`Connection`](super::Connection):
//!
//! - [`Audit`]: remembers the last decoded status and any acknowledgement
//!   still owed by the kernel
//! - [`Connector`]: zero-sized, no additional state needed
//!
//! The [`ProtocolState`] trait is sealed to prevent external implementations.
//!
//! # Example
//!
//! ```ignore
//! use nlaudit::netlink::{Audit, Connection, Connector};
//!
//! let mut audit = Connection::<Audit>::new()?;
//! audit.set_enabled(true).await?;
//!
//! let proc_events = Connection::<Connector>::new().await?;
//! ```

use super::audit::AuditStatus;
use super::socket::Protocol;

/// Sealed trait module to prevent external implementations.
mod private {
    pub trait Sealed {}
}

/// Protocol state trait for typed connections.
///
/// This trait is sealed and cannot be implemented outside this crate.
pub trait ProtocolState: private::Sealed + Default {
    /// The netlink protocol for this state type.
    const PROTOCOL: Protocol;

    /// Receive buffer size used unless the connection config overrides it.
    const RECV_BUFFER_SIZE: usize;
}

/// Audit protocol state.
#[derive(Debug, Default, Clone)]
pub struct Audit {
    /// Status decoded by the most recent successful query.
    pub(crate) last_status: Option<AuditStatus>,
    /// Sequence of a GET request whose trailing ACK has not been read yet.
    pub(crate) stale_ack: Option<u32>,
}

impl private::Sealed for Audit {}

impl ProtocolState for Audit {
    const PROTOCOL: Protocol = Protocol::Audit;
    // MAX_AUDIT_MESSAGE_LENGTH plus a netlink header, rounded up.
    const RECV_BUFFER_SIZE: usize = 8960;
}

/// Kernel connector protocol state.
///
/// This is a zero-sized type with no additional state.
#[derive(Debug, Default, Clone, Copy)]
pub struct Connector;

impl private::Sealed for Connector {}

impl ProtocolState for Connector {
    const PROTOCOL: Protocol = Protocol::Connector;
    const RECV_BUFFER_SIZE: usize = 4096;
}
