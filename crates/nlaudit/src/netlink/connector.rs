//! Kernel connector implementation for `Connection<Connector>`.
//!
//! This module provides methods for receiving process events via the
//! NETLINK_CONNECTOR protocol. The kernel broadcasts fork, exec and exit
//! notifications for every process on the host; filtering by pid is left to
//! [`watcher`](super::watcher).
//!
//! # Example
//!
//! ```ignore
//! use nlaudit::netlink::{Connection, Connector};
//! use nlaudit::netlink::connector::ProcEvent;
//!
//! // Requires CAP_NET_ADMIN
//! let conn = Connection::<Connector>::new().await?;
//!
//! loop {
//!     for event in conn.recv_events().await? {
//!         match event? {
//!             ProcEvent::Fork { parent_pid, child_pid, .. } => {
//!                 println!("fork: {} -> {}", parent_pid, child_pid);
//!             }
//!             ProcEvent::Exit { pid, exit_code, .. } => {
//!                 println!("exit: {} ({})", pid, exit_code);
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

use tracing::{debug, warn};

use super::codec::{ByteOrder, Codec, PResult, Record, Writer, parse_u16, parse_u32, parse_u64};
use super::connection::{Connection, ConnectionConfig};
use super::error::{Error, Result};
use super::message::NlMsgType;
use super::protocol::{Connector, ProtocolState};
use super::socket::NetlinkSocket;

// Connector constants
/// Process events connector id, also the multicast group.
pub const CN_IDX_PROC: u32 = 1;
const CN_VAL_PROC: u32 = 1;

// Process event types
const PROC_EVENT_NONE: u32 = 0x0000_0000;
const PROC_EVENT_FORK: u32 = 0x0000_0001;
const PROC_EVENT_EXEC: u32 = 0x0000_0002;
const PROC_EVENT_EXIT: u32 = 0x8000_0000;

// Connector message operation
const PROC_CN_MCAST_LISTEN: u32 = 1;
const PROC_CN_MCAST_IGNORE: u32 = 2;

/// Multicast control operation for the process connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcControlOp {
    /// Start receiving process events.
    Listen,
    /// Stop receiving process events.
    Ignore,
}

impl ProcControlOp {
    /// Get the kernel value.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Listen => PROC_CN_MCAST_LISTEN,
            Self::Ignore => PROC_CN_MCAST_IGNORE,
        }
    }
}

/// A process lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcEvent {
    /// No event (acknowledgment of a control operation).
    None,

    /// Process forked.
    Fork {
        /// Parent process ID.
        parent_pid: u32,
        /// Parent thread group ID.
        parent_tgid: u32,
        /// Child process ID.
        child_pid: u32,
        /// Child thread group ID.
        child_tgid: u32,
    },

    /// Process executed a new program.
    Exec {
        /// Process ID.
        pid: u32,
        /// Thread group ID.
        tgid: u32,
    },

    /// Process exited.
    Exit {
        /// Process ID.
        pid: u32,
        /// Thread group ID.
        tgid: u32,
        /// Exit code.
        exit_code: u32,
        /// Exit signal.
        exit_signal: u32,
    },

    /// Event kind not decoded by this crate (uid, gid, comm, ...).
    Other {
        /// Event type code.
        what: u32,
    },
}

impl ProcEvent {
    /// Get the process ID for this event, if applicable.
    pub fn pid(&self) -> Option<u32> {
        match self {
            ProcEvent::Fork { child_pid, .. } => Some(*child_pid),
            ProcEvent::Exec { pid, .. } => Some(*pid),
            ProcEvent::Exit { pid, .. } => Some(*pid),
            ProcEvent::None | ProcEvent::Other { .. } => None,
        }
    }

    /// Get the thread group ID for this event, if applicable.
    pub fn tgid(&self) -> Option<u32> {
        match self {
            ProcEvent::Fork { child_tgid, .. } => Some(*child_tgid),
            ProcEvent::Exec { tgid, .. } => Some(*tgid),
            ProcEvent::Exit { tgid, .. } => Some(*tgid),
            ProcEvent::None | ProcEvent::Other { .. } => None,
        }
    }

    /// Decode the payload of one connector netlink message.
    ///
    /// The payload starts with the `cn_msg` header, followed by the
    /// `proc_event` header and the kind-specific data.
    pub fn decode(codec: &Codec, payload: &[u8]) -> Result<Self> {
        let mut input = payload;

        let cn: CnMsg = codec.decode_next(&mut input)?;
        if cn.idx != CN_IDX_PROC || cn.val != CN_VAL_PROC {
            return Err(Error::MalformedMessage(format!(
                "connector message for {}:{}, expected proc connector",
                cn.idx, cn.val
            )));
        }

        let header: ProcEventHeader = codec.decode_next(&mut input)?;

        Ok(match header.what {
            PROC_EVENT_NONE => ProcEvent::None,
            PROC_EVENT_FORK => {
                let ev: ForkEvent = codec.decode(input)?;
                ProcEvent::Fork {
                    parent_pid: ev.parent_pid,
                    parent_tgid: ev.parent_tgid,
                    child_pid: ev.child_pid,
                    child_tgid: ev.child_tgid,
                }
            }
            PROC_EVENT_EXEC => {
                let ev: ExecEvent = codec.decode(input)?;
                ProcEvent::Exec {
                    pid: ev.pid,
                    tgid: ev.tgid,
                }
            }
            PROC_EVENT_EXIT => {
                let ev: ExitEvent = codec.decode(input)?;
                ProcEvent::Exit {
                    pid: ev.pid,
                    tgid: ev.tgid,
                    exit_code: ev.exit_code,
                    exit_signal: ev.exit_signal,
                }
            }
            what => ProcEvent::Other { what },
        })
    }
}

/// cn_msg header structure (20 bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CnMsg {
    /// Connector id.
    pub idx: u32,
    /// Connector value.
    pub val: u32,
    /// Sequence number.
    pub seq: u32,
    /// Acknowledgment sequence.
    pub ack: u32,
    /// Payload length.
    pub len: u16,
    /// Flags.
    pub flags: u16,
}

impl Record for CnMsg {
    const NAME: &'static str = "cn_msg";
    const SIZE: usize = 20;

    fn write(&self, w: &mut Writer<'_>) {
        w.u32(self.idx);
        w.u32(self.val);
        w.u32(self.seq);
        w.u32(self.ack);
        w.u16(self.len);
        w.u16(self.flags);
    }

    fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self> {
        Ok(Self {
            idx: parse_u32(input, order)?,
            val: parse_u32(input, order)?,
            seq: parse_u32(input, order)?,
            ack: parse_u32(input, order)?,
            len: parse_u16(input, order)?,
            flags: parse_u16(input, order)?,
        })
    }
}

/// proc_event header (what + cpu + timestamp).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcEventHeader {
    /// Event kind bit.
    pub what: u32,
    /// CPU the event was generated on.
    pub cpu: u32,
    /// Monotonic timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

impl Record for ProcEventHeader {
    const NAME: &'static str = "proc_event";
    const SIZE: usize = 16;

    fn write(&self, w: &mut Writer<'_>) {
        w.u32(self.what);
        w.u32(self.cpu);
        w.u64(self.timestamp_ns);
    }

    fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self> {
        Ok(Self {
            what: parse_u32(input, order)?,
            cpu: parse_u32(input, order)?,
            timestamp_ns: parse_u64(input, order)?,
        })
    }
}

/// fork_proc_event payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForkEvent {
    /// Thread that called fork.
    pub parent_pid: u32,
    /// Process of the forking thread.
    pub parent_tgid: u32,
    /// New task. Differs from `child_tgid` when a thread was created.
    pub child_pid: u32,
    /// Process the new task belongs to.
    pub child_tgid: u32,
}

impl Record for ForkEvent {
    const NAME: &'static str = "fork_proc_event";
    const SIZE: usize = 16;

    fn write(&self, w: &mut Writer<'_>) {
        w.u32(self.parent_pid);
        w.u32(self.parent_tgid);
        w.u32(self.child_pid);
        w.u32(self.child_tgid);
    }

    fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self> {
        Ok(Self {
            parent_pid: parse_u32(input, order)?,
            parent_tgid: parse_u32(input, order)?,
            child_pid: parse_u32(input, order)?,
            child_tgid: parse_u32(input, order)?,
        })
    }
}

/// exec_proc_event payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecEvent {
    /// Thread that called exec.
    pub pid: u32,
    /// Its process.
    pub tgid: u32,
}

impl Record for ExecEvent {
    const NAME: &'static str = "exec_proc_event";
    const SIZE: usize = 8;

    fn write(&self, w: &mut Writer<'_>) {
        w.u32(self.pid);
        w.u32(self.tgid);
    }

    fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self> {
        Ok(Self {
            pid: parse_u32(input, order)?,
            tgid: parse_u32(input, order)?,
        })
    }
}

/// exit_proc_event payload.
///
/// Kernels since 4.19 append the parent pid/tgid; those bytes are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitEvent {
    /// Exiting thread.
    pub pid: u32,
    /// Its process.
    pub tgid: u32,
    /// Raw wait status, as `task->exit_code`.
    pub exit_code: u32,
    /// Signal sent to the parent, usually `SIGCHLD`.
    pub exit_signal: u32,
}

impl Record for ExitEvent {
    const NAME: &'static str = "exit_proc_event";
    const SIZE: usize = 16;

    fn write(&self, w: &mut Writer<'_>) {
        w.u32(self.pid);
        w.u32(self.tgid);
        w.u32(self.exit_code);
        w.u32(self.exit_signal);
    }

    fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self> {
        Ok(Self {
            pid: parse_u32(input, order)?,
            tgid: parse_u32(input, order)?,
            exit_code: parse_u32(input, order)?,
            exit_signal: parse_u32(input, order)?,
        })
    }
}

impl Connection<Connector> {
    /// Create a new connector and register for process events.
    ///
    /// This requires `CAP_NET_ADMIN` capability.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use nlaudit::netlink::{Connection, Connector};
    ///
    /// let conn = Connection::<Connector>::new().await?;
    /// ```
    pub async fn new() -> Result<Self> {
        Self::with_config(ConnectionConfig::default()).await
    }

    /// Create a new connector with explicit settings and register for
    /// process events.
    pub async fn with_config(config: ConnectionConfig) -> Result<Self> {
        let mut socket = NetlinkSocket::new(Connector::PROTOCOL)?;

        // Join the proc connector multicast group
        socket.add_membership(CN_IDX_PROC)?;

        let conn = Self::from_parts(socket, Connector, config);

        // Send registration message to enable proc events
        conn.send_control(ProcControlOp::Listen).await?;

        Ok(conn)
    }

    /// Send a process connector control message.
    pub async fn send_control(&self, op: ProcControlOp) -> Result<()> {
        let seq = self.socket().next_seq();
        let op = op.as_u32();

        let cn_msg = CnMsg {
            idx: CN_IDX_PROC,
            val: CN_VAL_PROC,
            seq,
            ack: 0,
            len: 4,
            flags: 0,
        };
        let mut payload = Vec::with_capacity(CnMsg::SIZE + 4);
        self.codec().encode_into(&cn_msg, &mut payload);
        self.codec().writer(&mut payload).u32(op);

        self.socket()
            .send(NlMsgType::DONE, 0, seq, &payload)
            .await?;
        debug!(op, seq, "proc connector control sent");
        Ok(())
    }

    /// Receive one datagram and decode every process event in it.
    ///
    /// A malformed message yields an `Err` item without hiding the others.
    pub async fn recv_events(&self) -> Result<Vec<Result<ProcEvent>>> {
        let mut events = Vec::new();

        for msg in self.recv().await? {
            match msg {
                Ok(msg) if msg.msg_type() == NlMsgType::DONE => {
                    events.push(ProcEvent::decode(self.codec(), &msg.payload));
                }
                Ok(msg) => {
                    debug!(msg_type = msg.msg_type(), "skipping non-connector message");
                }
                Err(e) => events.push(Err(e)),
            }
        }

        Ok(events)
    }

    /// Unregister from process events and close the socket.
    ///
    /// A failure to send IGNORE is logged and does not stop the close.
    pub async fn close(self) -> Result<()> {
        if let Err(e) = self.send_control(ProcControlOp::Ignore).await {
            warn!(error = %e, "failed to unregister from process events");
        }
        self.into_socket().close()
    }
}
