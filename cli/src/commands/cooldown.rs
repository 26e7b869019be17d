use std::io::Write;

use acctswap_core::api::{format_duration, CooldownStore, Tool};
use chrono::{Duration, Utc};

use super::cli::CooldownCommand;
use super::Ctx;
use crate::error::CliError;

pub fn handle(ctx: &Ctx, out: &mut impl Write, cmd: CooldownCommand) -> Result<(), CliError> {
    match cmd {
        CooldownCommand::Set {
            tool,
            profile,
            minutes,
            note,
        } => set(ctx, out, tool, &profile, minutes, &note),
        CooldownCommand::Clear { tool, profile } => clear(ctx, out, tool, profile.as_deref()),
        CooldownCommand::List => list(ctx, out),
    }
}

fn set(
    ctx: &Ctx,
    out: &mut impl Write,
    tool: Tool,
    profile: &str,
    minutes: i64,
    note: &str,
) -> Result<(), CliError> {
    if minutes <= 0 {
        return Err(CliError::Usage("--minutes must be positive".into()));
    }
    if !ctx.vault.exists(tool.as_str(), profile)? {
        writeln!(out, "warning: {tool} has no saved profile '{profile}'")?;
    }
    let duration = Duration::minutes(minutes);
    ctx.store
        .set_cooldown(tool.as_str(), profile, Utc::now(), duration, note)?;
    writeln!(
        out,
        "{tool}/{profile} cooling down for {}",
        format_duration(duration)
    )?;
    Ok(())
}

fn clear(ctx: &Ctx, out: &mut impl Write, tool: Tool, profile: Option<&str>) -> Result<(), CliError> {
    let removed = match profile {
        Some(p) => ctx.store.clear_cooldown(tool.as_str(), p)?,
        None => ctx.store.clear_all(Some(tool.as_str()))?,
    };
    writeln!(out, "Cleared {removed} cooldown(s) for {tool}")?;
    Ok(())
}

fn list(ctx: &Ctx, out: &mut impl Write) -> Result<(), CliError> {
    let now = Utc::now();
    let active = ctx.store.list_active(now)?;
    if active.is_empty() {
        writeln!(out, "No active cooldowns")?;
        return Ok(());
    }
    for cd in active {
        write!(
            out,
            "{}/{}  {} left",
            cd.tool,
            cd.profile,
            format_duration(cd.remaining(now))
        )?;
        if !cd.notes.is_empty() {
            write!(out, "  ({})", cd.notes)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
