//! Audit control integration tests.

use std::time::Duration;

use nlaudit::Result;
use nlaudit::netlink::{
    Audit, AuditAction, AuditField, AuditFilter, AuditOperator, AuditRule, Connection,
    ConnectionConfig, Error,
};

#[tokio::test]
async fn test_get_status() -> Result<()> {
    require_root!();

    let mut conn = Connection::<Audit>::new()?;
    let status = conn.get_status().await?;

    assert!(status.enabled <= 2);
    assert_eq!(conn.last_status(), Some(&status));

    conn.close()
}

#[tokio::test]
async fn test_status_is_stable() -> Result<()> {
    require_root!();

    let mut conn = Connection::<Audit>::new()?;
    let first = conn.get_status().await?;
    let second = conn.get_status().await?;

    assert_eq!(first.enabled, second.enabled);
    assert_eq!(first.failure, second.failure);
    assert_eq!(first.backlog_limit, second.backlog_limit);

    conn.close()
}

#[tokio::test]
async fn test_set_backlog_limit_roundtrip() -> Result<()> {
    require_root!();

    let mut conn = Connection::<Audit>::with_config(
        ConnectionConfig::new().with_reply_timeout(Duration::from_secs(2)),
    )?;
    let before = conn.get_status().await?;
    if before.is_locked() {
        eprintln!("Skipping test: audit configuration is locked");
        return conn.close();
    }

    let target = before.backlog_limit.max(64) + 1;
    conn.set_backlog_limit(target).await?;
    assert_eq!(conn.get_status().await?.backlog_limit, target);

    // Restore
    conn.set_backlog_limit(before.backlog_limit).await?;
    assert_eq!(conn.get_status().await?.backlog_limit, before.backlog_limit);

    conn.close()
}

#[tokio::test]
async fn test_entry_filter_rejected_without_io() -> Result<()> {
    require_root!();

    let mut conn = Connection::<Audit>::new()?;
    let mut rule = AuditRule::new();
    rule.add_field(AuditField::Pid, AuditOperator::Equal, 1)?;

    let err = conn
        .add_rule(&mut rule, AuditFilter::Entry, AuditAction::Always)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFilter(AuditFilter::Entry)));

    // The session is still usable
    conn.get_status().await?;
    conn.close()
}

#[tokio::test]
async fn test_invalid_rule_reports_kernel_error() -> Result<()> {
    require_root!();

    let mut conn = Connection::<Audit>::new()?;
    if conn.get_status().await?.is_locked() {
        eprintln!("Skipping test: audit configuration is locked");
        return conn.close();
    }

    // The kernel rejects field ids it does not know
    let mut rule = AuditRule::new();
    rule.set_syscall(59)?;
    rule.add_field(AuditField::Other(300), AuditOperator::Equal, 1)?;
    let err = conn
        .add_rule(&mut rule, AuditFilter::Exit, AuditAction::Always)
        .await
        .unwrap_err();
    assert!(err.errno().is_some(), "unexpected error: {err}");

    conn.close()
}
