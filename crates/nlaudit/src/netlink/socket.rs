//! Low-level async netlink socket operations.

use std::io;
use std::mem::ManuallyDrop;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::debug;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{MessageIter, NLMSG_HDRLEN};

/// Netlink protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Kernel audit subsystem.
    Audit,
    /// Kernel connector.
    Connector,
}

impl Protocol {
    fn as_isize(self) -> isize {
        match self {
            Protocol::Audit => protocols::NETLINK_AUDIT,
            Protocol::Connector => protocols::NETLINK_CONNECTOR,
        }
    }
}

/// How a receive waits for data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecvMode {
    /// Wait until a datagram is available.
    #[default]
    Wait,
    /// Read once with `MSG_DONTWAIT`; an empty socket yields `WouldBlock`.
    ///
    /// The kernel rarely answers before the read, so request/reply
    /// operations usually fail in this mode.
    NoWait,
}

/// Async netlink socket.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
    /// Protocol this socket uses.
    protocol: Protocol,
}

impl NetlinkSocket {
    /// Create and bind a netlink socket for the given protocol.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(protocol: Protocol) -> Result<Self> {
        let mut socket = Socket::new(protocol.as_isize()).map_err(Error::Socket)?;
        socket.set_non_blocking(true).map_err(Error::Socket)?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr).map_err(Error::Socket)?;
        socket.get_address(&mut addr).map_err(Error::Socket)?;
        let pid = addr.port_number();

        let fd = AsyncFd::new(socket).map_err(Error::Socket)?;
        debug!(?protocol, pid, "netlink socket bound");

        Ok(Self {
            fd,
            seq: AtomicU32::new(1),
            pid,
            protocol,
        })
    }

    /// Get the next sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Choose the sequence number used by the next request.
    pub fn set_next_seq(&self, seq: u32) {
        self.seq.store(seq, Ordering::Relaxed);
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Subscribe to a multicast group.
    pub fn add_membership(&mut self, group: u32) -> Result<()> {
        self.fd
            .get_mut()
            .add_membership(group)
            .map_err(Error::Socket)
    }

    /// Frame `payload` behind a netlink header and send it to the kernel.
    pub async fn send(&self, msg_type: u16, flags: u16, seq: u32, payload: &[u8]) -> Result<()> {
        let mut builder = MessageBuilder::new(msg_type, flags);
        builder.set_seq(seq);
        builder.set_pid(self.pid);
        builder.append_bytes(payload);
        self.send_raw(&builder.finish()).await
    }

    /// Send an already framed message to the kernel.
    pub async fn send_raw(&self, msg: &[u8]) -> Result<()> {
        let kernel = SocketAddr::new(0, 0);

        loop {
            let mut guard = self
                .fd
                .ready(Interest::WRITABLE)
                .await
                .map_err(Error::Send)?;

            match guard.try_io(|inner| inner.get_ref().send_to(msg, &kernel, 0)) {
                Ok(result) => {
                    let n = result.map_err(Error::Send)?;
                    if n != msg.len() {
                        return Err(Error::Send(io::Error::new(
                            io::ErrorKind::WriteZero,
                            format!("partial write: {} of {} bytes", n, msg.len()),
                        )));
                    }
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one datagram of at most `max_bytes` and split it into messages.
    pub async fn recv(&self, max_bytes: usize, mode: RecvMode) -> Result<MessageIter> {
        let mut buf = BytesMut::with_capacity(max_bytes);

        let n = match mode {
            RecvMode::NoWait => self
                .fd
                .get_ref()
                .recv(&mut buf, libc::MSG_DONTWAIT)?,
            RecvMode::Wait => loop {
                let mut guard = self.fd.ready(Interest::READABLE).await?;

                match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                    Ok(result) => break result?,
                    Err(_would_block) => continue,
                }
            },
        };

        if n < NLMSG_HDRLEN {
            return Err(Error::MalformedMessage(format!(
                "datagram of {} bytes is shorter than a netlink header",
                n
            )));
        }

        Ok(MessageIter::new(buf.freeze()))
    }

    /// Close the socket, surfacing the OS error.
    pub fn close(self) -> Result<()> {
        let socket = ManuallyDrop::new(self.fd.into_inner());
        let fd = socket.as_raw_fd();

        // SAFETY: `socket` is never dropped, so `fd` is closed exactly once here.
        let ret = unsafe { libc::close(fd) };
        if ret < 0 {
            return Err(Error::Socket(io::Error::last_os_error()));
        }
        debug!(protocol = ?self.protocol, pid = self.pid, "netlink socket closed");
        Ok(())
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

impl std::fmt::Debug for NetlinkSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetlinkSocket")
            .field("fd", &self.as_raw_fd())
            .field("pid", &self.pid)
            .field("protocol", &self.protocol)
            .finish()
    }
}
