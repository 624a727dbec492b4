//! auditmon watch - follow individual processes.

use anyhow::Context;
use clap::{Args, ValueEnum};
use nlaudit::netlink::{ConnectionConfig, ProcEventMask, ProcessWatcher, WatchEvent, WatcherConfig};

/// Event kinds that can be watched.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum EventArg {
    /// Process forked (the child is not followed unless exec is watched).
    Fork,
    /// Process called exec. Forked children are followed.
    Exec,
    /// Process exited.
    Exit,
    /// All event kinds.
    All,
}

impl EventArg {
    fn mask(self) -> ProcEventMask {
        match self {
            EventArg::Fork => ProcEventMask::FORK,
            EventArg::Exec => ProcEventMask::EXEC,
            EventArg::Exit => ProcEventMask::EXIT,
            EventArg::All => ProcEventMask::ALL,
        }
    }
}

#[derive(Args)]
pub struct WatchCmd {
    /// Process IDs to watch.
    #[arg(required = true)]
    pids: Vec<u32>,

    /// Event kinds to report.
    #[arg(short, long, value_delimiter = ',', default_value = "all")]
    events: Vec<EventArg>,

    /// Stop after this many notifications.
    #[arg(short = 'c', long)]
    count: Option<usize>,
}

impl WatchCmd {
    fn mask(&self) -> ProcEventMask {
        self.events
            .iter()
            .fold(ProcEventMask::NONE, |mask, e| mask | e.mask())
    }

    pub async fn run(&self, config: ConnectionConfig, json: bool) -> anyhow::Result<()> {
        let config = WatcherConfig::default().with_connection(config);
        let (watcher, mut events) = ProcessWatcher::with_config(config)
            .await
            .context("failed to open process connector")?;

        let mask = self.mask();
        for &pid in &self.pids {
            watcher.watch(pid, mask)?;
        }

        if !json {
            eprintln!("Watching {} process(es) (Ctrl+C to stop)...", self.pids.len());
        }

        let mut seen = 0usize;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                item = events.recv_result() => {
                    let event = match item {
                        Some(Ok(event)) => event,
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "process watcher error");
                            continue;
                        }
                        None => break,
                    };
                    if json {
                        println!("{}", serde_json::to_string(&event)?);
                    } else {
                        println!("{}", format_event(&event));
                    }
                    seen += 1;
                    if self.count.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
            }
        }

        watcher.close().await?;
        Ok(())
    }
}

fn format_event(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Fork {
            parent_pid,
            child_pid,
        } => format!("fork {} -> {}", parent_pid, child_pid),
        WatchEvent::Exec { pid } => format!("exec {}", pid),
        WatchEvent::Exit {
            pid,
            exit_code,
            exit_signal,
        } => format!("exit {} code {} signal {}", pid, exit_code, exit_signal),
    }
}
