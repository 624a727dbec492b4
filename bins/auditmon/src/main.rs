//! auditmon command - audit status, rules and process watching.

mod commands;

use std::time::Duration;

use clap::{Parser, Subcommand};
use nlaudit::netlink::{ConnectionConfig, RecvMode};

#[derive(Parser)]
#[command(name = "auditmon", version, about = "Linux audit control and process watcher")]
struct Cli {
    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Reply timeout in milliseconds (0 waits forever).
    #[arg(long, global = true, default_value_t = 5000)]
    timeout_ms: u64,

    /// Do not wait for kernel replies. Queries such as `status` will likely fail with EAGAIN.
    #[arg(long, global = true)]
    no_wait: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show audit status.
    #[command(visible_alias = "s")]
    Status,

    /// Enable auditing.
    Enable,

    /// Disable auditing.
    Disable,

    /// Register the audit daemon pid.
    SetPid {
        /// Process ID (defaults to this process).
        pid: Option<u32>,
    },

    /// Set the failure mode.
    SetFailure {
        /// Action taken when an audit record cannot be logged.
        mode: commands::audit::FailureArg,
    },

    /// Set the message rate limit (per second, 0 disables).
    SetRateLimit {
        /// Messages per second.
        limit: u32,
    },

    /// Set the backlog limit.
    SetBacklogLimit {
        /// Queued messages.
        limit: u32,
    },

    /// Install an audit rule.
    AddRule(commands::rule::AddRuleCmd),

    /// Watch processes for fork, exec and exit.
    #[command(visible_alias = "w")]
    Watch(commands::watch::WatchCmd),
}

impl Cli {
    fn connection_config(&self) -> ConnectionConfig {
        let mode = if self.no_wait {
            RecvMode::NoWait
        } else {
            RecvMode::Wait
        };
        let config = ConnectionConfig::new().with_recv_mode(mode);

        match self.timeout_ms {
            0 => config.without_reply_timeout(),
            ms => config.with_reply_timeout(Duration::from_millis(ms)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.connection_config();

    let result = match cli.command {
        Command::Status => commands::audit::status(config, cli.json).await,
        Command::Enable => commands::audit::set_enabled(config, true).await,
        Command::Disable => commands::audit::set_enabled(config, false).await,
        Command::SetPid { pid } => {
            commands::audit::set_pid(config, pid.unwrap_or_else(std::process::id)).await
        }
        Command::SetFailure { mode } => commands::audit::set_failure(config, mode).await,
        Command::SetRateLimit { limit } => commands::audit::set_rate_limit(config, limit).await,
        Command::SetBacklogLimit { limit } => {
            commands::audit::set_backlog_limit(config, limit).await
        }
        Command::AddRule(cmd) => cmd.run(config).await,
        Command::Watch(cmd) => cmd.run(config, cli.json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
