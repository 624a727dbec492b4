//! Common test utilities for integration tests.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use nlaudit::netlink::{WatchEvent, WatchEvents};

/// Check if running as root.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions.
    unsafe { libc::geteuid() == 0 }
}

/// Spawn `sleep` so there is a short-lived process to watch.
pub fn spawn_sleeper(secs: &str) -> std::io::Result<Child> {
    Command::new("sleep")
        .arg(secs)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Wait for the first notification matching `pred`, giving up after
/// `timeout`.
pub async fn wait_for<F>(
    events: &mut WatchEvents,
    timeout: Duration,
    mut pred: F,
) -> Option<WatchEvent>
where
    F: FnMut(&WatchEvent) -> bool,
{
    tokio::time::timeout(timeout, async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Skip the test if not running as root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}
