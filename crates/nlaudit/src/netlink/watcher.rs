//! Per-process watches over the process connector event stream.
//!
//! The kernel reports every fork, exec and exit on the host. A
//! [`ProcessWatcher`] keeps a table of watched pids and only forwards events
//! for those. Children of a pid watched for [`ProcEventMask::EXEC`] are
//! watched automatically when they are forked, so an exec right after fork
//! is not missed.
//!
//! # Example
//!
//! ```ignore
//! use nlaudit::netlink::watcher::{ProcEventMask, ProcessWatcher, WatchEvent};
//!
//! let (watcher, mut events) = ProcessWatcher::new().await?;
//! watcher.watch(1234, ProcEventMask::EXEC | ProcEventMask::EXIT)?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         WatchEvent::Exec { pid } => println!("{} exec", pid),
//!         WatchEvent::Exit { pid, exit_code, .. } => println!("{} exit {}", pid, exit_code),
//!         WatchEvent::Fork { .. } => {}
//!     }
//! }
//!
//! watcher.close().await?;
//! ```

use std::collections::HashMap;
use std::io;
use std::ops::{BitOr, BitOrAssign};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, warn};

use super::connection::{Connection, ConnectionConfig};
use super::connector::ProcEvent;
use super::error::{Error, Result};
use super::protocol::Connector;
use super::socket::RecvMode;

/// Set of process event kinds to watch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcEventMask(u32);

impl ProcEventMask {
    /// No events.
    pub const NONE: Self = Self(0);
    /// Process forked a child.
    pub const FORK: Self = Self(0x0000_0001);
    /// Process called exec.
    pub const EXEC: Self = Self(0x0000_0002);
    /// Process exited.
    pub const EXIT: Self = Self(0x8000_0000);
    /// Fork, exec and exit.
    pub const ALL: Self = Self(Self::FORK.0 | Self::EXEC.0 | Self::EXIT.0);

    /// Build a mask from `PROC_EVENT_*` bits, dropping unknown ones.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw `PROC_EVENT_*` bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Check that every kind in `other` is in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check if no kind is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a kind name (`fork`, `exec`, `exit`, `all`).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "fork" => Self::FORK,
            "exec" => Self::EXEC,
            "exit" => Self::EXIT,
            "all" => Self::ALL,
            _ => return None,
        })
    }
}

impl BitOr for ProcEventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProcEventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Notification for a watched process.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WatchEvent {
    /// A watched process forked.
    Fork {
        /// Watched parent.
        parent_pid: u32,
        /// New child.
        child_pid: u32,
    },
    /// A watched process called exec.
    Exec {
        /// Process ID.
        pid: u32,
    },
    /// A watched process exited. Its watch is gone.
    Exit {
        /// Process ID.
        pid: u32,
        /// Exit code as reported by the kernel.
        exit_code: u32,
        /// Signal sent to the parent.
        exit_signal: u32,
    },
}

impl WatchEvent {
    /// Process the event is about (the parent for forks).
    pub fn pid(&self) -> u32 {
        match self {
            WatchEvent::Fork { parent_pid, .. } => *parent_pid,
            WatchEvent::Exec { pid } => *pid,
            WatchEvent::Exit { pid, .. } => *pid,
        }
    }
}

/// Table of watched pids and the filter applied to raw events.
///
/// Cloning shares the table. Every operation takes the one lock, so the read
/// loop and the public watch calls never interleave.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    watches: Arc<Mutex<HashMap<u32, ProcEventMask>>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u32, ProcEventMask>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Watch `pid` for `mask`, merging with any existing watch.
    pub fn watch(&self, pid: u32, mask: ProcEventMask) {
        *self.table().entry(pid).or_default() |= mask;
    }

    /// Stop watching `pid`.
    pub fn remove_watch(&self, pid: u32) -> Result<()> {
        self.table()
            .remove(&pid)
            .map(|_| ())
            .ok_or(Error::NotWatched { pid })
    }

    /// Check that `pid` is watched for every kind in `mask`.
    pub fn is_watching(&self, pid: u32, mask: ProcEventMask) -> bool {
        self.table().get(&pid).is_some_and(|m| m.contains(mask))
    }

    /// Current mask for `pid`.
    pub fn mask(&self, pid: u32) -> Option<ProcEventMask> {
        self.table().get(&pid).copied()
    }

    /// All watched pids, sorted.
    pub fn watched_pids(&self) -> Vec<u32> {
        let mut pids: Vec<_> = self.table().keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// Remove every watch.
    pub fn clear(&self) {
        self.table().clear();
    }

    /// Apply one raw event to the table and return the notifications it
    /// produces.
    ///
    /// Processes are keyed by thread group id. Thread creation and exits of
    /// non-leader threads are ignored.
    pub fn dispatch(&self, event: &ProcEvent) -> Vec<WatchEvent> {
        let mut table = self.table();
        let mut out = Vec::new();

        match *event {
            ProcEvent::Fork {
                parent_tgid,
                child_pid,
                child_tgid,
                ..
            } => {
                // A new thread, not a new process. No Fork notification
                // either, since the watched process did not fork.
                if child_pid != child_tgid {
                    return out;
                }
                let Some(mask) = table.get(&parent_tgid).copied() else {
                    return out;
                };

                // Follow forks
                if mask.contains(ProcEventMask::EXEC) {
                    *table.entry(child_tgid).or_default() |= mask;
                    debug!(parent = parent_tgid, child = child_tgid, "following fork");
                }
                if mask.contains(ProcEventMask::FORK) {
                    out.push(WatchEvent::Fork {
                        parent_pid: parent_tgid,
                        child_pid: child_tgid,
                    });
                }
            }
            ProcEvent::Exec { tgid, .. } => {
                if table
                    .get(&tgid)
                    .is_some_and(|m| m.contains(ProcEventMask::EXEC))
                {
                    out.push(WatchEvent::Exec { pid: tgid });
                }
            }
            ProcEvent::Exit {
                pid,
                tgid,
                exit_code,
                exit_signal,
            } => {
                if pid != tgid {
                    return out;
                }
                if table
                    .get(&tgid)
                    .is_some_and(|m| m.contains(ProcEventMask::EXIT))
                {
                    table.remove(&tgid);
                    out.push(WatchEvent::Exit {
                        pid: tgid,
                        exit_code,
                        exit_signal,
                    });
                }
            }
            ProcEvent::None | ProcEvent::Other { .. } => {}
        }

        out
    }
}

/// Settings for a [`ProcessWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Connector connection settings. The receive mode is always `Wait`.
    pub connection: ConnectionConfig,
    /// Capacity of the notification channel.
    pub channel_capacity: usize,
    /// Capacity of the error channel.
    pub error_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            channel_capacity: 128,
            error_capacity: 16,
        }
    }
}

impl WatcherConfig {
    /// Set the notification channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the error channel capacity.
    pub fn with_error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity;
        self
    }

    /// Set the connector connection settings.
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}

/// Receiving side of a [`ProcessWatcher`].
///
/// Notifications are delivered in kernel order. The read loop waits for
/// channel capacity, so a consumer that stops reading stalls dispatch. Errors
/// are delivered best-effort; when the error channel is full they are logged
/// and dropped. Both channels end once the watcher is closed.
#[derive(Debug)]
pub struct WatchEvents {
    events: mpsc::Receiver<WatchEvent>,
    errors: mpsc::Receiver<Error>,
}

impl WatchEvents {
    /// Receive the next notification.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }

    /// Receive the next read loop error.
    pub async fn recv_error(&mut self) -> Option<Error> {
        self.errors.recv().await
    }

    /// Receive whichever comes first, a notification or a read loop error.
    ///
    /// Returns `None` once the notification channel has ended.
    pub async fn recv_result(&mut self) -> Option<Result<WatchEvent>> {
        tokio::select! {
            Some(err) = self.errors.recv() => Some(Err(err)),
            event = self.events.recv() => event.map(Ok),
        }
    }

    /// Take a pending read loop error without waiting.
    pub fn try_recv_error(&mut self) -> Option<Error> {
        self.errors.try_recv().ok()
    }
}

impl Stream for WatchEvents {
    type Item = WatchEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

/// Watches individual processes through the process connector.
///
/// Owns a background task that reads the connector socket for the watcher's
/// lifetime. Dropping the watcher stops that task too.
#[derive(Debug)]
pub struct ProcessWatcher {
    dispatcher: Dispatcher,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
    closed: AtomicBool,
}

impl ProcessWatcher {
    /// Bind the process connector and start the read loop.
    ///
    /// This requires `CAP_NET_ADMIN` capability.
    pub async fn new() -> Result<(Self, WatchEvents)> {
        Self::with_config(WatcherConfig::default()).await
    }

    /// Bind the process connector with explicit settings.
    pub async fn with_config(config: WatcherConfig) -> Result<(Self, WatchEvents)> {
        let connection = config.connection.with_recv_mode(RecvMode::Wait);
        let conn = Connection::<Connector>::with_config(connection).await?;

        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (error_tx, error_rx) = mpsc::channel(config.error_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new();

        let task = tokio::spawn(read_loop(
            conn,
            dispatcher.clone(),
            event_tx,
            error_tx,
            stop_rx,
        ));

        let watcher = Self {
            dispatcher,
            stop: stop_tx,
            task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        };
        let events = WatchEvents {
            events: event_rx,
            errors: error_rx,
        };
        Ok((watcher, events))
    }

    /// Watch `pid` for the kinds in `mask`.
    ///
    /// Repeated calls merge their masks.
    pub fn watch(&self, pid: u32, mask: ProcEventMask) -> Result<()> {
        if self.is_closed() {
            return Err(Error::WatcherClosed);
        }
        self.dispatcher.watch(pid, mask);
        Ok(())
    }

    /// Stop watching `pid`.
    pub fn remove_watch(&self, pid: u32) -> Result<()> {
        self.dispatcher.remove_watch(pid)
    }

    /// Check that `pid` is watched for every kind in `mask`.
    pub fn is_watching(&self, pid: u32, mask: ProcEventMask) -> bool {
        self.dispatcher.is_watching(pid, mask)
    }

    /// All watched pids, sorted.
    pub fn watched_pids(&self) -> Vec<u32> {
        self.dispatcher.watched_pids()
    }

    /// Check if [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the read loop, drop every watch and close the connector.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.stop.send_replace(true);
        self.dispatcher.clear();

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let result = match task {
            Some(handle) => handle.await.map_err(|e| Error::Io(io::Error::other(e)))?,
            None => Ok(()),
        };

        // The loop may have followed a fork before it saw the stop signal
        self.dispatcher.clear();
        result
    }
}

/// Forward a read loop error without waiting for the consumer.
fn report(errors: &mpsc::Sender<Error>, err: Error) {
    if let Err(TrySendError::Full(err)) = errors.try_send(err) {
        warn!(error = %err, "error channel full, dropping watcher error");
    }
}

/// Dispatch one received batch and forward what it produces.
///
/// Decode errors go to the error channel and the rest of the batch is still
/// dispatched. Returns `false` if stop was signalled while waiting for
/// notification capacity.
async fn deliver(
    items: Vec<Result<ProcEvent>>,
    dispatcher: &Dispatcher,
    events: &mpsc::Sender<WatchEvent>,
    errors: &mpsc::Sender<Error>,
    stop: &mut watch::Receiver<bool>,
) -> bool {
    for item in items {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                report(errors, e);
                continue;
            }
        };

        for notification in dispatcher.dispatch(&event) {
            tokio::select! {
                _ = stop.changed() => return false,
                sent = events.send(notification) => {
                    if sent.is_err() {
                        debug!("notification receiver dropped");
                    }
                }
            }
        }
    }
    true
}

async fn read_loop(
    conn: Connection<Connector>,
    dispatcher: Dispatcher,
    events: mpsc::Sender<WatchEvent>,
    errors: mpsc::Sender<Error>,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    debug!(pid = conn.socket().pid(), "process watcher started");

    loop {
        if *stop.borrow() {
            break;
        }

        let batch = tokio::select! {
            _ = stop.changed() => break,
            batch = conn.recv_events() => batch,
        };

        let items = match batch {
            Ok(items) => items,
            Err(e) => {
                report(&errors, e);
                continue;
            }
        };

        if !deliver(items, &dispatcher, &events, &errors, &mut stop).await {
            break;
        }
    }

    drop(events);
    drop(errors);
    debug!("process watcher stopping");
    conn.close().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fork(parent: u32, child: u32) -> ProcEvent {
        ProcEvent::Fork {
            parent_pid: parent,
            parent_tgid: parent,
            child_pid: child,
            child_tgid: child,
        }
    }

    fn exec(pid: u32) -> ProcEvent {
        ProcEvent::Exec { pid, tgid: pid }
    }

    fn exit(pid: u32) -> ProcEvent {
        ProcEvent::Exit {
            pid,
            tgid: pid,
            exit_code: 0,
            exit_signal: 17,
        }
    }

    #[test]
    fn mask_bits() {
        assert_eq!(ProcEventMask::ALL.bits(), 0x8000_0003);
        assert!(ProcEventMask::ALL.contains(ProcEventMask::EXEC | ProcEventMask::EXIT));
        assert!(!ProcEventMask::FORK.contains(ProcEventMask::EXEC));
        assert!(ProcEventMask::NONE.is_empty());
        assert_eq!(ProcEventMask::from_bits(0xffff_ffff), ProcEventMask::ALL);
        assert_eq!(ProcEventMask::from_name("exit"), Some(ProcEventMask::EXIT));
        assert_eq!(ProcEventMask::from_name("uid"), None);
    }

    #[test]
    fn exec_follows_fork() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::EXEC);

        assert!(d.dispatch(&fork(100, 200)).is_empty());
        assert!(d.is_watching(200, ProcEventMask::EXEC));

        assert_eq!(d.dispatch(&exec(200)), vec![WatchEvent::Exec { pid: 200 }]);
    }

    #[test]
    fn fork_notification_needs_fork_bit() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::FORK);

        assert_eq!(
            d.dispatch(&fork(100, 200)),
            vec![WatchEvent::Fork {
                parent_pid: 100,
                child_pid: 200
            }]
        );
        // Not followed without EXEC
        assert!(!d.is_watching(200, ProcEventMask::NONE));
    }

    #[test]
    fn followed_child_inherits_full_mask() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::ALL);
        d.dispatch(&fork(100, 200));
        assert_eq!(d.mask(200), Some(ProcEventMask::ALL));
    }

    #[test]
    fn unwatched_events_ignored() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::EXIT);

        assert!(d.dispatch(&exec(100)).is_empty());
        assert!(d.dispatch(&exec(300)).is_empty());
        assert!(d.dispatch(&fork(300, 301)).is_empty());
        assert!(d.dispatch(&ProcEvent::None).is_empty());
        assert!(d.dispatch(&ProcEvent::Other { what: 4 }).is_empty());
        assert_eq!(d.watched_pids(), vec![100]);
    }

    #[test]
    fn exit_removes_watch() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::EXIT);

        assert_eq!(
            d.dispatch(&exit(100)),
            vec![WatchEvent::Exit {
                pid: 100,
                exit_code: 0,
                exit_signal: 17
            }]
        );
        assert!(matches!(
            d.remove_watch(100),
            Err(Error::NotWatched { pid: 100 })
        ));
        // Nothing more for that pid
        assert!(d.dispatch(&exit(100)).is_empty());
    }

    #[test]
    fn exit_keeps_watch_without_exit_bit() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::EXEC);

        assert!(d.dispatch(&exit(100)).is_empty());
        assert!(d.is_watching(100, ProcEventMask::EXEC));
        assert!(d.remove_watch(100).is_ok());
    }

    #[test]
    fn threads_are_not_processes() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::ALL);

        // clone(CLONE_THREAD): child_pid differs from child_tgid
        let thread = ProcEvent::Fork {
            parent_pid: 100,
            parent_tgid: 100,
            child_pid: 101,
            child_tgid: 100,
        };
        assert!(d.dispatch(&thread).is_empty());
        assert_eq!(d.watched_pids(), vec![100]);

        // A non-leader thread exiting leaves the process watched
        let thread_exit = ProcEvent::Exit {
            pid: 101,
            tgid: 100,
            exit_code: 0,
            exit_signal: 0xffff_ffff,
        };
        assert!(d.dispatch(&thread_exit).is_empty());
        assert!(d.is_watching(100, ProcEventMask::ALL));
    }

    #[test]
    fn fork_from_thread_uses_tgid() {
        let d = Dispatcher::new();
        d.watch(100, ProcEventMask::EXEC);

        let fork_from_thread = ProcEvent::Fork {
            parent_pid: 105,
            parent_tgid: 100,
            child_pid: 400,
            child_tgid: 400,
        };
        d.dispatch(&fork_from_thread);
        assert!(d.is_watching(400, ProcEventMask::EXEC));
    }

    #[test]
    fn watch_is_idempotent_union() {
        let a = Dispatcher::new();
        a.watch(7, ProcEventMask::FORK | ProcEventMask::EXEC);
        a.watch(7, ProcEventMask::EXEC | ProcEventMask::EXIT);
        a.watch(7, ProcEventMask::EXEC);

        let b = Dispatcher::new();
        b.watch(7, ProcEventMask::ALL);

        assert_eq!(a.mask(7), b.mask(7));
    }

    #[test]
    fn remove_and_clear() {
        let d = Dispatcher::new();
        d.watch(1, ProcEventMask::EXEC);
        d.watch(2, ProcEventMask::EXIT);

        d.remove_watch(1).unwrap();
        assert!(matches!(d.remove_watch(1), Err(Error::NotWatched { pid: 1 })));
        assert_eq!(d.watched_pids(), vec![2]);

        d.clear();
        assert!(d.watched_pids().is_empty());
    }

    #[test]
    fn clones_share_table() {
        let d = Dispatcher::new();
        let other = d.clone();
        d.watch(9, ProcEventMask::EXEC);
        assert!(other.is_watching(9, ProcEventMask::EXEC));
    }

    #[tokio::test]
    async fn stream_yields_sent_events() {
        use tokio_stream::StreamExt;

        let (event_tx, event_rx) = mpsc::channel(4);
        let (_error_tx, error_rx) = mpsc::channel(1);
        let mut events = WatchEvents {
            events: event_rx,
            errors: error_rx,
        };

        event_tx.send(WatchEvent::Exec { pid: 5 }).await.unwrap();
        drop(event_tx);

        assert_eq!(events.next().await, Some(WatchEvent::Exec { pid: 5 }));
        assert_eq!(events.next().await, None);
        assert!(events.try_recv_error().is_none());
    }

    #[tokio::test]
    async fn recv_result_carries_errors() {
        let (event_tx, event_rx) = mpsc::channel(4);
        let (error_tx, error_rx) = mpsc::channel(1);
        let mut events = WatchEvents {
            events: event_rx,
            errors: error_rx,
        };

        error_tx.send(Error::Timeout).await.unwrap();
        drop(error_tx);
        assert!(matches!(events.recv_result().await, Some(Err(Error::Timeout))));

        event_tx.send(WatchEvent::Exec { pid: 8 }).await.unwrap();
        drop(event_tx);
        assert!(matches!(
            events.recv_result().await,
            Some(Ok(WatchEvent::Exec { pid: 8 }))
        ));
        assert!(events.recv_result().await.is_none());
    }

    #[tokio::test]
    async fn bad_message_does_not_hide_batch() {
        let d = Dispatcher::new();
        d.watch(200, ProcEventMask::EXEC);

        let (event_tx, mut event_rx) = mpsc::channel(4);
        let (error_tx, mut error_rx) = mpsc::channel(4);
        let (_stop_tx, mut stop_rx) = watch::channel(false);

        let batch = vec![
            Err(Error::TruncatedRecord {
                record: "cn_msg",
                expected: 20,
                actual: 3,
            }),
            Ok(ProcEvent::Exec {
                pid: 200,
                tgid: 200,
            }),
        ];
        assert!(deliver(batch, &d, &event_tx, &error_tx, &mut stop_rx).await);

        assert!(matches!(
            error_rx.try_recv(),
            Ok(Error::TruncatedRecord {
                record: "cn_msg",
                ..
            })
        ));
        assert!(error_rx.try_recv().is_err());
        assert_eq!(event_rx.try_recv().unwrap(), WatchEvent::Exec { pid: 200 });
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_interrupts_blocked_delivery() {
        let d = Dispatcher::new();
        d.watch(7, ProcEventMask::EXEC);

        // Full notification channel, so the send waits
        let (event_tx, _event_rx) = mpsc::channel(1);
        event_tx.send(WatchEvent::Exec { pid: 1 }).await.unwrap();
        let (error_tx, _error_rx) = mpsc::channel(1);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        drop(stop_tx);

        let batch = vec![Ok(exec(7))];
        assert!(!deliver(batch, &d, &event_tx, &error_tx, &mut stop_rx).await);
    }

    #[test]
    fn full_error_channel_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        report(&tx, Error::WatcherClosed);
        report(&tx, Error::Timeout);

        assert!(matches!(rx.try_recv(), Ok(Error::WatcherClosed)));
        assert!(rx.try_recv().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn watch_event_json() {
        let event = WatchEvent::Exit {
            pid: 3,
            exit_code: 0,
            exit_signal: 17,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"Exit":{"pid":3,"exit_code":0,"exit_signal":17}}"#);
        assert_eq!(serde_json::from_str::<WatchEvent>(&json).unwrap(), event);
    }

    #[test]
    fn config_defaults() {
        let config = WatcherConfig::default();
        assert_eq!(config.channel_capacity, 128);
        assert_eq!(config.error_capacity, 16);

        let config = config.with_channel_capacity(4).with_error_capacity(2);
        assert_eq!(config.channel_capacity, 4);
        assert_eq!(config.error_capacity, 2);
    }
}
