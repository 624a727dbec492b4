//! Typed netlink connection shared by the audit and connector stacks.

use std::time::Duration;

use super::codec::Codec;
use super::error::Result;
use super::message::MessageIter;
use super::protocol::ProtocolState;
use super::socket::{NetlinkSocket, RecvMode};

/// Default time to wait for the terminal reply to a request.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Receive buffer size; `None` uses the protocol default.
    pub recv_buffer_size: Option<usize>,
    /// Whether receives wait for data.
    pub recv_mode: RecvMode,
    /// Deadline for a request's reply loop; `None` waits forever.
    pub reply_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: None,
            recv_mode: RecvMode::Wait,
            reply_timeout: Some(DEFAULT_REPLY_TIMEOUT),
        }
    }
}

impl ConnectionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receive buffer size.
    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    /// Set the receive mode.
    pub fn with_recv_mode(mut self, mode: RecvMode) -> Self {
        self.recv_mode = mode;
        self
    }

    /// Set the reply deadline.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    /// Wait for replies without a deadline.
    pub fn without_reply_timeout(mut self) -> Self {
        self.reply_timeout = None;
        self
    }
}

/// Netlink connection with protocol-specific state.
///
/// Operations live in `impl Connection<Audit>` and `impl Connection<Connector>`.
pub struct Connection<P: ProtocolState> {
    socket: NetlinkSocket,
    state: P,
    config: ConnectionConfig,
    codec: Codec,
}

impl<P: ProtocolState> Connection<P> {
    pub(crate) fn from_parts(socket: NetlinkSocket, state: P, config: ConnectionConfig) -> Self {
        Self {
            socket,
            state,
            config,
            codec: Codec::native(),
        }
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }

    /// Get the protocol state.
    pub fn state(&self) -> &P {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut P {
        &mut self.state
    }

    /// Get the connection config.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Record codec bound to the host byte order.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Receive buffer size in effect.
    pub fn recv_buffer_size(&self) -> usize {
        self.config.recv_buffer_size.unwrap_or(P::RECV_BUFFER_SIZE)
    }

    /// Receive one datagram using the configured size and mode.
    pub async fn recv(&self) -> Result<MessageIter> {
        self.socket
            .recv(self.recv_buffer_size(), self.config.recv_mode)
            .await
    }

    pub(crate) fn into_socket(self) -> NetlinkSocket {
        self.socket
    }
}

impl<P: ProtocolState + std::fmt::Debug> std::fmt::Debug for Connection<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("socket", &self.socket)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.recv_buffer_size, None);
        assert_eq!(config.recv_mode, RecvMode::Wait);
        assert_eq!(config.reply_timeout, Some(DEFAULT_REPLY_TIMEOUT));
    }

    #[test]
    fn config_builder() {
        let config = ConnectionConfig::new()
            .with_recv_buffer_size(16384)
            .with_recv_mode(RecvMode::NoWait)
            .without_reply_timeout();
        assert_eq!(config.recv_buffer_size, Some(16384));
        assert_eq!(config.recv_mode, RecvMode::NoWait);
        assert_eq!(config.reply_timeout, None);

        let config = config.with_reply_timeout(Duration::from_millis(250));
        assert_eq!(config.reply_timeout, Some(Duration::from_millis(250)));
    }
}
