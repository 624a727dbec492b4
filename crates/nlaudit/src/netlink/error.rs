//! Error types for netlink operations.

use std::io;

use super::audit_rule::AuditFilter;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket creation, bind or close failed.
    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    /// Writing a request to the kernel failed or was partial.
    #[error("send error: {0}")]
    Send(#[source] io::Error),

    /// I/O error while receiving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A netlink header did not fit the buffer it was read from.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A fixed-size record was shorter than its layout.
    #[error("truncated {record}: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        /// Record type being decoded.
        record: &'static str,
        /// Fixed size of the record.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// A reply did not correlate with the outstanding request.
    #[error(
        "sequence mismatch: expected seq {expected_seq} pid {expected_pid}, got seq {actual_seq} pid {actual_pid}"
    )]
    SequenceMismatch {
        /// Sequence number of the request.
        expected_seq: u32,
        /// Sequence number in the reply.
        actual_seq: u32,
        /// Port id of the bound socket.
        expected_pid: u32,
        /// Port id in the reply.
        actual_pid: u32,
    },

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// An audit rule already holds the maximum number of field triples.
    #[error("audit rule already has {max} fields")]
    TooManyFields {
        /// Field capacity of a rule.
        max: usize,
    },

    /// Syscall number falls outside the usable part of the rule bitmask.
    #[error("syscall {nr} is outside the audit rule bitmask")]
    InvalidSyscall {
        /// The rejected syscall number.
        nr: u32,
    },

    /// Filter list that can no longer be used for rule installation.
    #[error("audit filter {0:?} is not supported for rule installation")]
    UnsupportedFilter(AuditFilter),

    /// `remove_watch` on a pid with no watch.
    #[error("watch for pid {pid} does not exist")]
    NotWatched {
        /// The pid that was not watched.
        pid: u32,
    },

    /// The process watcher has been closed.
    #[error("process watcher is closed")]
    WatcherClosed,

    /// No terminal reply arrived within the configured timeout.
    #[error("timed out waiting for kernel reply")]
    Timeout,
}

impl Error {
    /// Create a kernel error from a (negative) netlink errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    ///
    /// Covers both kernel rejections and sockets that could not be opened.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => matches!(*errno, 1 | 13), // EPERM=1, EACCES=13
            Self::Socket(e) | Self::Send(e) | Self::Io(e) => {
                e.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    /// Check if a non-blocking receive found no data.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }

    /// Check if this is a decode-time integrity failure.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage(_) | Self::TruncatedRecord { .. }
        )
    }
}
