//! auditmon add-rule command implementation.

use anyhow::{Context, anyhow, bail};
use clap::Args;
use nlaudit::netlink::{
    Audit, AuditAction, AuditField, AuditFilter, AuditOperator, AuditRule, Connection,
    ConnectionConfig,
};

#[derive(Args)]
pub struct AddRuleCmd {
    /// Filter list (task, exit, user, exclude, filesystem).
    #[arg(long, default_value = "exit")]
    filter: String,

    /// Rule action (never, possible, always).
    #[arg(long, default_value = "always")]
    action: String,

    /// Syscall number to match, or "all". May be repeated.
    #[arg(short = 'S', long = "syscall")]
    syscalls: Vec<String>,

    /// Field comparison as FIELD:OP:VALUE (e.g. pid:=:1234). May be repeated.
    #[arg(short = 'F', long = "field")]
    fields: Vec<String>,
}

impl AddRuleCmd {
    pub async fn run(&self, config: ConnectionConfig) -> anyhow::Result<()> {
        let filter = AuditFilter::from_name(&self.filter)
            .ok_or_else(|| anyhow!("unknown filter list: {}", self.filter))?;
        let action = AuditAction::from_name(&self.action)
            .ok_or_else(|| anyhow!("unknown action: {}", self.action))?;
        let mut rule = self.build()?;

        let mut conn =
            Connection::<Audit>::with_config(config).context("failed to open audit socket")?;
        conn.add_rule(&mut rule, filter, action).await?;
        conn.close()?;
        Ok(())
    }

    fn build(&self) -> anyhow::Result<AuditRule> {
        let mut rule = AuditRule::new();

        for syscall in &self.syscalls {
            if syscall == "all" {
                rule.set_all_syscalls();
                continue;
            }
            let nr: u32 = syscall
                .parse()
                .with_context(|| format!("invalid syscall number: {}", syscall))?;
            rule.set_syscall(nr)?;
        }

        for spec in &self.fields {
            let (field, op, value) = parse_field(spec)?;
            match value.parse::<u32>() {
                Ok(n) => rule.add_field(field, op, n)?,
                Err(_) => rule.add_field_str(field, op, value)?,
            }
        }

        Ok(rule)
    }
}

/// Split `FIELD:OP:VALUE`. The value may itself contain colons.
fn parse_field(spec: &str) -> anyhow::Result<(AuditField, AuditOperator, &str)> {
    let Some((name, rest)) = spec.split_once(':') else {
        bail!("field must be FIELD:OP:VALUE: {}", spec);
    };
    let Some((symbol, value)) = rest.split_once(':') else {
        bail!("field must be FIELD:OP:VALUE: {}", spec);
    };

    let field = match AuditField::from_name(name) {
        Some(field) => field,
        None => name
            .parse::<u32>()
            .map(AuditField::from_u32)
            .map_err(|_| anyhow!("unknown field: {}", name))?,
    };
    let op = AuditOperator::from_symbol(symbol)
        .ok_or_else(|| anyhow!("unknown operator: {}", symbol))?;

    Ok((field, op, value))
}
