//! Audit implementation for `Connection<Audit>`.
//!
//! This module provides the request/reply session for the Linux audit
//! subsystem via the NETLINK_AUDIT protocol.
//!
//! # Example
//!
//! ```ignore
//! use nlaudit::netlink::{Audit, Connection};
//!
//! let mut conn = Connection::<Audit>::new()?;
//!
//! conn.set_enabled(true).await?;
//! conn.set_pid(std::process::id()).await?;
//!
//! let status = conn.get_status().await?;
//! println!("Audit enabled: {}", status.is_enabled());
//! println!("Backlog: {}/{}", status.backlog, status.backlog_limit);
//! ```

use tracing::debug;

use super::audit_rule::{AuditAction, AuditFilter, AuditRule};
use super::codec::{ByteOrder, Codec, PResult, Record, Writer, parse_u32};
use super::connection::{Connection, ConnectionConfig};
use super::error::{Error, Result};
use super::message::{NLM_F_ACK, NLM_F_REQUEST, NetlinkMessage, NlMsgError, NlMsgType};
use super::protocol::{Audit, ProtocolState};
use super::socket::NetlinkSocket;

// Audit message types (from linux/audit.h)
/// Get status
pub const AUDIT_GET: u16 = 1000;
/// Set status (enable/disable/auditd)
pub const AUDIT_SET: u16 = 1001;
/// Add syscall filtering rule
pub const AUDIT_ADD_RULE: u16 = 1011;
/// List syscall filtering rules
pub const AUDIT_LIST_RULES: u16 = 1013;

// Audit status mask bits
pub const AUDIT_STATUS_ENABLED: u32 = 0x0001;
pub const AUDIT_STATUS_FAILURE: u32 = 0x0002;
pub const AUDIT_STATUS_PID: u32 = 0x0004;
pub const AUDIT_STATUS_RATE_LIMIT: u32 = 0x0008;
pub const AUDIT_STATUS_BACKLOG_LIMIT: u32 = 0x0010;

// Failure modes
/// Silent (discard failed audit messages)
const AUDIT_FAIL_SILENT: u32 = 0;
/// Log to syslog
const AUDIT_FAIL_PRINTK: u32 = 1;
/// Panic
const AUDIT_FAIL_PANIC: u32 = 2;

/// Audit status structure (from linux/audit.h).
///
/// Only the first eight fields are carried; newer kernels append more, which
/// are ignored on decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuditStatus {
    /// Bit mask for valid entries.
    pub mask: u32,
    /// 1 = enabled, 0 = disabled, 2 = immutable.
    pub enabled: u32,
    /// Failure-to-log action.
    pub failure: u32,
    /// PID of auditd process.
    pub pid: u32,
    /// Message rate limit (per second).
    pub rate_limit: u32,
    /// Waiting messages limit.
    pub backlog_limit: u32,
    /// Messages lost.
    pub lost: u32,
    /// Messages waiting in queue.
    pub backlog: u32,
}

impl AuditStatus {
    /// Check if auditing is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled == 1
    }

    /// Check if auditing is locked (immutable).
    pub fn is_locked(&self) -> bool {
        self.enabled == 2
    }

    /// Get the failure mode as an enum.
    pub fn failure_mode(&self) -> AuditFailureMode {
        AuditFailureMode::from_u32(self.failure)
    }
}

impl Record for AuditStatus {
    const NAME: &'static str = "audit_status";
    const SIZE: usize = 32;

    fn write(&self, w: &mut Writer<'_>) {
        w.u32(self.mask);
        w.u32(self.enabled);
        w.u32(self.failure);
        w.u32(self.pid);
        w.u32(self.rate_limit);
        w.u32(self.backlog_limit);
        w.u32(self.lost);
        w.u32(self.backlog);
    }

    fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self> {
        Ok(Self {
            mask: parse_u32(input, order)?,
            enabled: parse_u32(input, order)?,
            failure: parse_u32(input, order)?,
            pid: parse_u32(input, order)?,
            rate_limit: parse_u32(input, order)?,
            backlog_limit: parse_u32(input, order)?,
            lost: parse_u32(input, order)?,
            backlog: parse_u32(input, order)?,
        })
    }
}

/// Audit failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuditFailureMode {
    /// Silent - discard failed audit messages.
    Silent,
    /// Printk - log to syslog on failure.
    Printk,
    /// Panic - kernel panic on audit failure.
    Panic,
    /// Unknown failure mode.
    Unknown(u32),
}

impl AuditFailureMode {
    /// Convert from the kernel value.
    pub fn from_u32(val: u32) -> Self {
        match val {
            AUDIT_FAIL_SILENT => Self::Silent,
            AUDIT_FAIL_PRINTK => Self::Printk,
            AUDIT_FAIL_PANIC => Self::Panic,
            other => Self::Unknown(other),
        }
    }

    /// Get the numeric value.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Silent => AUDIT_FAIL_SILENT,
            Self::Printk => AUDIT_FAIL_PRINTK,
            Self::Panic => AUDIT_FAIL_PANIC,
            Self::Unknown(n) => *n,
        }
    }
}

/// Terminal reply a request waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyExpect {
    /// SET and ADD_RULE: an acknowledgement.
    Ack,
    /// GET: a status reply.
    Status,
}

/// What the reply loop does with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReplyStep {
    /// Unrelated message; keep reading.
    Skip,
    /// Acknowledgement while a status reply is still owed.
    Acked,
    /// Request finished.
    Done,
    /// Status reply decoded.
    Status(AuditStatus),
}

/// Classify one reply against the outstanding request.
pub(crate) fn classify_reply(
    msg: &NetlinkMessage,
    codec: &Codec,
    seq: u32,
    local_pid: u32,
    expect: ReplyExpect,
    stale_ack: Option<u32>,
) -> Result<ReplyStep> {
    let header = &msg.header;

    if header.is_error() && stale_ack == Some(header.nlmsg_seq) && header.nlmsg_pid == local_pid {
        debug!(seq = header.nlmsg_seq, "consumed trailing ack of earlier query");
        return Ok(ReplyStep::Skip);
    }

    if header.nlmsg_seq != seq || header.nlmsg_pid != local_pid {
        return Err(Error::SequenceMismatch {
            expected_seq: seq,
            actual_seq: header.nlmsg_seq,
            expected_pid: local_pid,
            actual_pid: header.nlmsg_pid,
        });
    }

    match header.nlmsg_type {
        NlMsgType::ERROR => {
            let err = NlMsgError::from_bytes(&msg.payload)?;
            if !err.is_ack() {
                return Err(Error::from_errno(err.error));
            }
            Ok(match expect {
                ReplyExpect::Ack => ReplyStep::Done,
                ReplyExpect::Status => ReplyStep::Acked,
            })
        }
        NlMsgType::DONE => Ok(ReplyStep::Done),
        AUDIT_GET if expect == ReplyExpect::Status => {
            Ok(ReplyStep::Status(codec.decode(&msg.payload)?))
        }
        other => {
            debug!(msg_type = other, seq, "skipping unrelated audit message");
            Ok(ReplyStep::Skip)
        }
    }
}

impl Connection<Audit> {
    /// Create a new Audit connection.
    ///
    /// Requires `CAP_AUDIT_CONTROL` for anything but [`get_status`](Self::get_status).
    pub fn new() -> Result<Self> {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a new Audit connection with explicit settings.
    pub fn with_config(config: ConnectionConfig) -> Result<Self> {
        let socket = NetlinkSocket::new(Audit::PROTOCOL)?;
        Ok(Self::from_parts(socket, Audit::default(), config))
    }

    /// Status decoded by the most recent [`get_status`](Self::get_status).
    pub fn last_status(&self) -> Option<&AuditStatus> {
        self.state().last_status.as_ref()
    }

    /// Enable or disable auditing.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        let status = AuditStatus {
            mask: AUDIT_STATUS_ENABLED,
            enabled: enabled as u32,
            ..Default::default()
        };
        self.set_status(&status).await
    }

    /// Register `pid` as the audit daemon. Zero unregisters.
    pub async fn set_pid(&mut self, pid: u32) -> Result<()> {
        let status = AuditStatus {
            mask: AUDIT_STATUS_PID,
            pid,
            ..Default::default()
        };
        self.set_status(&status).await
    }

    /// Set what the kernel does when it cannot log.
    pub async fn set_failure_mode(&mut self, mode: AuditFailureMode) -> Result<()> {
        let status = AuditStatus {
            mask: AUDIT_STATUS_FAILURE,
            failure: mode.as_u32(),
            ..Default::default()
        };
        self.set_status(&status).await
    }

    /// Set the message rate limit (messages per second, 0 = unlimited).
    pub async fn set_rate_limit(&mut self, rate_limit: u32) -> Result<()> {
        let status = AuditStatus {
            mask: AUDIT_STATUS_RATE_LIMIT,
            rate_limit,
            ..Default::default()
        };
        self.set_status(&status).await
    }

    /// Set the backlog queue limit.
    pub async fn set_backlog_limit(&mut self, backlog_limit: u32) -> Result<()> {
        let status = AuditStatus {
            mask: AUDIT_STATUS_BACKLOG_LIMIT,
            backlog_limit,
            ..Default::default()
        };
        self.set_status(&status).await
    }

    /// Send a partial status update. Only fields whose mask bit is set apply.
    pub async fn set_status(&mut self, status: &AuditStatus) -> Result<()> {
        let payload = self.codec().encode(status);
        self.request(AUDIT_SET, &payload, ReplyExpect::Ack).await?;
        Ok(())
    }

    /// Get the current audit status.
    ///
    /// The result is also cached and available through
    /// [`last_status`](Self::last_status).
    pub async fn get_status(&mut self) -> Result<AuditStatus> {
        let status = self
            .request(AUDIT_GET, &[], ReplyExpect::Status)
            .await?
            .ok_or_else(|| Error::MalformedMessage("no status in reply to AUDIT_GET".into()))?;

        self.state_mut().last_status = Some(status);
        Ok(status)
    }

    /// Check whether auditing is enabled.
    pub async fn is_enabled(&mut self) -> Result<bool> {
        Ok(self.get_status().await?.is_enabled())
    }

    /// Install a rule on the given filter list.
    ///
    /// The deprecated entry list is rejected with
    /// [`Error::UnsupportedFilter`] before any I/O.
    pub async fn add_rule(
        &mut self,
        rule: &mut AuditRule,
        filter: AuditFilter,
        action: AuditAction,
    ) -> Result<()> {
        bind_rule(rule, filter, action)?;
        let payload = rule.encode(self.codec());
        self.request(AUDIT_ADD_RULE, &payload, ReplyExpect::Ack)
            .await?;
        Ok(())
    }

    /// Send one request and run the reply loop until its terminal message.
    async fn request(
        &mut self,
        msg_type: u16,
        payload: &[u8],
        expect: ReplyExpect,
    ) -> Result<Option<AuditStatus>> {
        let seq = self.socket().next_seq();
        self.socket()
            .send(msg_type, NLM_F_REQUEST | NLM_F_ACK, seq, payload)
            .await?;
        debug!(msg_type, seq, len = payload.len(), "audit request sent");

        let stale_ack = self.state_mut().stale_ack.take();
        let wait = self.await_reply(seq, expect, stale_ack);
        let (status, acked) = match self.config().reply_timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| Error::Timeout)??,
            None => wait.await?,
        };

        if expect == ReplyExpect::Status && !acked {
            self.state_mut().stale_ack = Some(seq);
        }
        Ok(status)
    }

    async fn await_reply(
        &self,
        seq: u32,
        expect: ReplyExpect,
        stale_ack: Option<u32>,
    ) -> Result<(Option<AuditStatus>, bool)> {
        let local_pid = self.socket().pid();
        let mut acked = false;

        loop {
            for msg in self.recv().await? {
                let msg = msg?;
                match classify_reply(&msg, self.codec(), seq, local_pid, expect, stale_ack)? {
                    ReplyStep::Skip => {}
                    ReplyStep::Acked => acked = true,
                    ReplyStep::Done => return Ok((None, acked)),
                    ReplyStep::Status(status) => return Ok((Some(status), acked)),
                }
            }
        }
    }

    /// Close the socket.
    pub fn close(self) -> Result<()> {
        self.into_socket().close()
    }
}

/// Stamp the filter list and action on a rule about to be sent.
fn bind_rule(rule: &mut AuditRule, filter: AuditFilter, action: AuditAction) -> Result<()> {
    if filter == AuditFilter::Entry {
        return Err(Error::UnsupportedFilter(filter));
    }
    rule.flags = filter.as_u32();
    rule.action = action.as_u32();
    Ok(())
}
