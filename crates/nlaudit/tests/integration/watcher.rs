//! Process watcher integration tests.

use std::time::Duration;

use nlaudit::Result;
use nlaudit::netlink::{Error, ProcEventMask, ProcessWatcher, WatchEvent};

use crate::common::{spawn_sleeper, wait_for};

#[tokio::test(flavor = "multi_thread")]
async fn test_exit_is_reported_and_unwatched() -> Result<()> {
    require_root!();

    let (watcher, mut events) = ProcessWatcher::new().await?;
    let mut child = spawn_sleeper("0.3").map_err(Error::Io)?;
    let pid = child.id();

    watcher.watch(pid, ProcEventMask::EXIT)?;
    assert!(watcher.is_watching(pid, ProcEventMask::EXIT));

    let event = wait_for(&mut events, Duration::from_secs(5), |e| {
        matches!(e, WatchEvent::Exit { pid: p, .. } if *p == pid)
    })
    .await;
    child.wait().map_err(Error::Io)?;

    assert!(event.is_some(), "no exit notification for {pid}");
    assert!(matches!(
        watcher.remove_watch(pid),
        Err(Error::NotWatched { .. })
    ));

    watcher.close().await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_follows_fork() -> Result<()> {
    require_root!();

    let (watcher, mut events) = ProcessWatcher::new().await?;
    let me = std::process::id();
    watcher.watch(me, ProcEventMask::EXEC)?;

    // fork + exec from this process; the child is followed before it execs
    let mut child = spawn_sleeper("0.2").map_err(Error::Io)?;
    let pid = child.id();

    let event = wait_for(&mut events, Duration::from_secs(5), |e| {
        matches!(e, WatchEvent::Exec { pid: p } if *p == pid)
    })
    .await;
    child.wait().map_err(Error::Io)?;

    assert!(event.is_some(), "no exec notification for child {pid}");

    watcher.close().await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_is_idempotent() -> Result<()> {
    require_root!();

    let (watcher, mut events) = ProcessWatcher::new().await?;
    watcher.watch(1, ProcEventMask::ALL)?;

    watcher.close().await?;
    watcher.close().await?;

    assert!(watcher.is_closed());
    assert!(watcher.watched_pids().is_empty());
    assert!(matches!(
        watcher.watch(1, ProcEventMask::EXEC),
        Err(Error::WatcherClosed)
    ));

    // Channels end once the read loop is gone
    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while events.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok());

    Ok(())
}
