//! Print every process event on the host.
//!
//! Uses the raw connector listener without per-process filtering. Requires
//! CAP_NET_ADMIN capability (typically root).
//!
//! Run with: sudo cargo run -p nlaudit --example process_monitor

use nlaudit::netlink::{Connection, Connector, ProcEvent};

#[tokio::main]
async fn main() -> nlaudit::Result<()> {
    let conn = Connection::<Connector>::new().await?;

    println!("Monitoring process events (requires root)...");
    println!("Press Ctrl+C to exit.\n");

    loop {
        let batch = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            batch = conn.recv_events() => batch?,
        };

        for result in batch {
            match result? {
                ProcEvent::Fork {
                    parent_pid,
                    parent_tgid,
                    child_pid,
                    child_tgid,
                } => {
                    if parent_pid == parent_tgid && child_pid == child_tgid {
                        println!("FORK: {} -> {}", parent_pid, child_pid);
                    } else {
                        println!(
                            "FORK: {} (tgid {}) -> {} (tgid {})",
                            parent_pid, parent_tgid, child_pid, child_tgid
                        );
                    }
                }
                ProcEvent::Exec { pid, tgid } => {
                    if pid == tgid {
                        println!("EXEC: {}", pid);
                    } else {
                        println!("EXEC: {} (tgid {})", pid, tgid);
                    }
                }
                ProcEvent::Exit {
                    pid,
                    tgid,
                    exit_code,
                    ..
                } => {
                    if pid == tgid {
                        println!("EXIT: {} (code {})", pid, exit_code);
                    } else {
                        println!("EXIT: {} (tgid {}) (code {})", pid, tgid, exit_code);
                    }
                }
                ProcEvent::None | ProcEvent::Other { .. } => {}
            }
        }
    }

    conn.close().await
}
