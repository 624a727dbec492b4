//! Audit status queries and updates.

use anyhow::Context;
use clap::ValueEnum;
use nlaudit::netlink::{Audit, AuditFailureMode, AuditStatus, Connection, ConnectionConfig};

/// Failure modes accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FailureArg {
    /// Discard records.
    Silent,
    /// Log to the kernel log.
    Printk,
    /// Panic the kernel.
    Panic,
}

impl FailureArg {
    fn to_mode(self) -> AuditFailureMode {
        match self {
            FailureArg::Silent => AuditFailureMode::Silent,
            FailureArg::Printk => AuditFailureMode::Printk,
            FailureArg::Panic => AuditFailureMode::Panic,
        }
    }
}

fn connect(config: ConnectionConfig) -> anyhow::Result<Connection<Audit>> {
    Connection::<Audit>::with_config(config).context("failed to open audit socket")
}

pub async fn status(config: ConnectionConfig, json: bool) -> anyhow::Result<()> {
    let mut conn = connect(config)?;
    let status = conn.get_status().await?;
    conn.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", format_status(&status));
    }
    Ok(())
}

pub async fn set_enabled(config: ConnectionConfig, enabled: bool) -> anyhow::Result<()> {
    let mut conn = connect(config)?;
    conn.set_enabled(enabled).await?;
    conn.close()?;
    Ok(())
}

pub async fn set_pid(config: ConnectionConfig, pid: u32) -> anyhow::Result<()> {
    let mut conn = connect(config)?;
    conn.set_pid(pid).await?;
    conn.close()?;
    Ok(())
}

pub async fn set_failure(config: ConnectionConfig, mode: FailureArg) -> anyhow::Result<()> {
    let mut conn = connect(config)?;
    conn.set_failure_mode(mode.to_mode()).await?;
    conn.close()?;
    Ok(())
}

pub async fn set_rate_limit(config: ConnectionConfig, limit: u32) -> anyhow::Result<()> {
    let mut conn = connect(config)?;
    conn.set_rate_limit(limit).await?;
    conn.close()?;
    Ok(())
}

pub async fn set_backlog_limit(config: ConnectionConfig, limit: u32) -> anyhow::Result<()> {
    let mut conn = connect(config)?;
    conn.set_backlog_limit(limit).await?;
    conn.close()?;
    Ok(())
}

fn failure_name(mode: AuditFailureMode) -> String {
    match mode {
        AuditFailureMode::Silent => "silent".into(),
        AuditFailureMode::Printk => "printk".into(),
        AuditFailureMode::Panic => "panic".into(),
        AuditFailureMode::Unknown(n) => format!("unknown({})", n),
    }
}

fn format_status(status: &AuditStatus) -> String {
    let enabled = if status.is_locked() {
        "locked"
    } else if status.is_enabled() {
        "yes"
    } else {
        "no"
    };

    format!(
        "enabled {}\nfailure {}\npid {}\nrate_limit {}\nbacklog_limit {}\nlost {}\nbacklog {}\n",
        enabled,
        failure_name(status.failure_mode()),
        status.pid,
        status.rate_limit,
        status.backlog_limit,
        status.lost,
        status.backlog,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text() {
        let status = AuditStatus {
            enabled: 1,
            failure: 1,
            pid: 812,
            backlog_limit: 8192,
            ..Default::default()
        };
        let text = format_status(&status);
        assert!(text.starts_with("enabled yes\nfailure printk\npid 812\n"));
        assert!(text.contains("backlog_limit 8192\n"));
    }

    #[test]
    fn locked_and_unknown() {
        let status = AuditStatus {
            enabled: 2,
            failure: 9,
            ..Default::default()
        };
        let text = format_status(&status);
        assert!(text.contains("enabled locked"));
        assert!(text.contains("failure unknown(9)"));
    }
}
