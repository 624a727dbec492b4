//! Display Linux audit subsystem status.
//!
//! Run with: sudo cargo run -p nlaudit --example audit_status
//!
//! Note: Reading audit status requires CAP_AUDIT_CONTROL or root.

use nlaudit::netlink::{Audit, AuditFailureMode, AuditStatus, Connection};

#[tokio::main]
async fn main() -> nlaudit::Result<()> {
    let mut conn = Connection::<Audit>::new()?;

    match conn.get_status().await {
        Ok(status) => print_status(&status),
        Err(e) if e.is_permission_denied() => {
            eprintln!("Failed to get audit status: {}", e);
            eprintln!("(Requires CAP_AUDIT_CONTROL or root)");
        }
        Err(e) => return Err(e),
    }

    conn.close()
}

fn print_status(status: &AuditStatus) {
    println!("Audit Status:");
    println!("  Enabled:        {}", format_enabled(status));
    println!(
        "  Failure mode:   {}",
        format_failure_mode(status.failure_mode())
    );
    println!("  Audit daemon:   {}", format_pid(status.pid));
    println!("  Rate limit:     {} msgs/sec", status.rate_limit);
    println!(
        "  Backlog:        {}/{}",
        status.backlog, status.backlog_limit
    );
    println!("  Lost messages:  {}", status.lost);
}

fn format_enabled(status: &AuditStatus) -> &'static str {
    if status.is_locked() {
        "locked (immutable)"
    } else if status.is_enabled() {
        "yes"
    } else {
        "no"
    }
}

fn format_failure_mode(mode: AuditFailureMode) -> &'static str {
    match mode {
        AuditFailureMode::Silent => "silent (discard)",
        AuditFailureMode::Printk => "printk (log to syslog)",
        AuditFailureMode::Panic => "panic (kernel panic)",
        AuditFailureMode::Unknown(_) => "unknown",
    }
}

fn format_pid(pid: u32) -> String {
    if pid == 0 {
        "none".to_string()
    } else {
        format!("PID {}", pid)
    }
}
