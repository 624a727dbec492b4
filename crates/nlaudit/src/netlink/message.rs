//! Netlink message header and buffer splitting.

use std::iter::FusedIterator;

use bytes::Bytes;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Check if this is an error message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse header from the front of a buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(h, _)| h)
            .map_err(|_| Error::TruncatedRecord {
                record: "nlmsghdr",
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Standard netlink message types.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message. Also the type of every connector message.
    pub const DONE: u16 = 3;
    /// Data lost, request resend.
    pub const OVERRUN: u16 = 4;
}

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;

/// One message split out of a receive buffer.
///
/// The payload shares the receive buffer and never includes alignment padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetlinkMessage {
    /// Message header.
    pub header: NlMsgHdr,
    /// Bytes between the header and `nlmsg_len`.
    pub payload: Bytes,
}

impl NetlinkMessage {
    /// Message type.
    pub fn msg_type(&self) -> u16 {
        self.header.nlmsg_type
    }

    /// Decode the payload of an `NLMSG_ERROR` message.
    ///
    /// Returns `None` for any other message type.
    pub fn error(&self) -> Option<Result<NlMsgError>> {
        self.header
            .is_error()
            .then(|| NlMsgError::from_bytes(&self.payload))
    }
}

/// Lazy iterator over the netlink messages packed in one receive buffer.
///
/// Each step validates `NLMSG_HDRLEN <= nlmsg_len <= remaining` and then
/// advances by the aligned length. After the first error the iterator is
/// exhausted; it cannot be restarted.
#[derive(Debug)]
pub struct MessageIter {
    data: Bytes,
}

impl MessageIter {
    /// Create a new message iterator.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl Iterator for MessageIter {
    type Item = Result<NetlinkMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            self.data.clear();
            return None;
        }

        let header = match NlMsgHdr::from_bytes(&self.data) {
            Ok(h) => h,
            Err(e) => {
                self.data.clear();
                return Some(Err(e));
            }
        };

        let msg_len = header.nlmsg_len as usize;
        if msg_len < NLMSG_HDRLEN || msg_len > self.data.len() {
            let remaining = self.data.len();
            self.data.clear();
            return Some(Err(Error::MalformedMessage(format!(
                "message length {} outside [{}, {}]",
                msg_len, NLMSG_HDRLEN, remaining
            ))));
        }

        // The final message may omit its trailing padding.
        let aligned_len = nlmsg_align(msg_len).min(self.data.len());
        let msg = self.data.split_to(aligned_len);
        let payload = msg.slice(NLMSG_HDRLEN..msg_len);

        Some(Ok(NetlinkMessage { header, payload }))
    }
}

impl FusedIterator for MessageIter {}

/// Netlink error message payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Parse error message from payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(e, _)| e)
            .map_err(|_| Error::TruncatedRecord {
                record: "nlmsgerr",
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// Check if this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}
