use std::io::Write;

use acctswap_core::api::{
    activate as activate_profile, format_duration, is_system_profile, ActivateOptions,
    CooldownStore, HealthStore, Tool,
};
use chrono::Utc;
use serde_json::json;

use super::{tools, Ctx};
use crate::error::CliError;

pub fn backup(ctx: &Ctx, out: &mut impl Write, tool: Tool, profile: &str) -> Result<(), CliError> {
    let set = ctx.auth(tool)?;
    ctx.vault.backup(&set, profile)?;
    let files = ctx
        .vault
        .read_meta(tool.as_str(), profile)
        .map(|m| m.files)
        .unwrap_or_default();
    writeln!(out, "Saved {tool} auth as '{profile}' ({files} file(s))")?;
    Ok(())
}

pub fn activate(ctx: &Ctx, out: &mut impl Write, tool: Tool, profile: &str) -> Result<(), CliError> {
    let set = ctx.auth(tool)?;
    let opts = ActivateOptions {
        backup_current: ctx.cfg.backup.backup_current_on_activate,
        max_auto_backups: ctx.cfg.backup.max_auto_backups,
    };
    let report = activate_profile(&ctx.vault, &set, profile, &opts)?;
    if let Err(e) = ctx
        .store
        .record_activation(tool.as_str(), profile, Utc::now())
    {
        tracing::warn!(target: "acctswap.cli", error = %e, "recording activation failed");
    }

    if report.original_created {
        writeln!(out, "Saved pre-existing {tool} auth as '_original'")?;
    }
    if let Some(name) = &report.backup_name {
        writeln!(out, "Saved unsaved {tool} auth as '{name}'")?;
    }
    for name in &report.rotated {
        writeln!(out, "Removed old snapshot '{name}'")?;
    }
    match report.previous.as_deref() {
        Some(prev) if prev != profile => writeln!(out, "Switched {tool}: {prev} -> {profile}")?,
        _ => writeln!(out, "Activated {tool} profile '{profile}'")?,
    }
    Ok(())
}

pub fn status(ctx: &Ctx, out: &mut impl Write, tool: Option<Tool>) -> Result<(), CliError> {
    let now = Utc::now();
    for tool in tools(tool) {
        let set = ctx.auth(tool)?;
        let line = if set.present().next().is_none() {
            "not logged in".to_string()
        } else {
            match ctx.vault.active_profile(&set)? {
                Some(p) => match ctx.store.active_cooldown(tool.as_str(), &p, now)? {
                    Some(cd) => format!("{p} (cooling down, {} left)", format_duration(cd.remaining(now))),
                    None => p,
                },
                None => "logged in, not saved in the vault".to_string(),
            }
        };
        writeln!(out, "{tool}: {line}")?;
    }
    Ok(())
}

pub fn ls(ctx: &Ctx, out: &mut impl Write, tool: Option<Tool>, as_json: bool) -> Result<(), CliError> {
    let now = Utc::now();
    let mut report = Vec::new();
    for tool in tools(tool) {
        let entries = ctx.vault.list_entries(tool.as_str())?;
        if entries.is_empty() && !as_json {
            continue;
        }
        let active = ctx.vault.active_profile(&ctx.auth(tool)?)?;
        let mut rows = Vec::new();
        for entry in entries {
            let cooldown = ctx.store.active_cooldown(tool.as_str(), &entry.name, now)?;
            rows.push((entry, cooldown));
        }

        if as_json {
            let profiles: Vec<_> = rows
                .iter()
                .map(|(e, cd)| {
                    json!({
                        "name": e.name,
                        "active": active.as_deref() == Some(e.name.as_str()),
                        "system": is_system_profile(&e.name),
                        "meta": e.meta,
                        "cooldown_until": cd.as_ref().map(|c| c.cooldown_until),
                    })
                })
                .collect();
            report.push(json!({ "tool": tool.as_str(), "profiles": profiles }));
            continue;
        }

        writeln!(out, "{tool}:")?;
        for (e, cd) in rows {
            let marker = if active.as_deref() == Some(e.name.as_str()) { "*" } else { " " };
            let mut line = format!("  {marker} {}", e.name);
            if let Some(meta) = &e.meta {
                line.push_str(&format!(
                    "  {} file(s), saved {}",
                    meta.files,
                    meta.backed_up_at.format("%Y-%m-%d %H:%M")
                ));
            }
            if let Some(cd) = cd {
                line.push_str(&format!("  [cooldown {}]", format_duration(cd.remaining(now))));
            }
            writeln!(out, "{line}")?;
        }
    }
    if as_json {
        let text = serde_json::to_string_pretty(&report)?;
        writeln!(out, "{text}")?;
    }
    Ok(())
}

pub fn delete(
    ctx: &Ctx,
    out: &mut impl Write,
    tool: Tool,
    profile: &str,
    force: bool,
) -> Result<(), CliError> {
    if force {
        ctx.vault.delete_force(tool.as_str(), profile)?;
    } else {
        ctx.vault.delete(tool.as_str(), profile)?;
    }
    writeln!(out, "Deleted {tool} profile '{profile}'")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Fixture;
    use pretty_assertions::assert_eq;
    use acctswap_core::api::VaultError;

    #[test]
    fn backup_then_activate_switches_live_auth() {
        let f = Fixture::new();
        f.login_codex("work-token");
        backup(&f.ctx, &mut Vec::new(), Tool::Codex, "work").unwrap();
        f.login_codex("home-token");
        backup(&f.ctx, &mut Vec::new(), Tool::Codex, "home").unwrap();

        let mut out = Vec::new();
        activate(&f.ctx, &mut out, Tool::Codex, "work").unwrap();
        assert_eq!(f.live_codex(), "work-token");
        assert!(Fixture::text(out).contains("Switched codex: home -> work"));

        let last = f.ctx.store.last_activation("codex", "work").unwrap();
        assert!(last.is_some());
    }

    #[test]
    fn status_reports_active_profile() {
        let f = Fixture::new();
        let mut out = Vec::new();
        status(&f.ctx, &mut out, Some(Tool::Codex)).unwrap();
        assert_eq!(Fixture::text(out), "codex: not logged in\n");

        f.login_codex("t");
        backup(&f.ctx, &mut Vec::new(), Tool::Codex, "main").unwrap();
        let mut out = Vec::new();
        status(&f.ctx, &mut out, Some(Tool::Codex)).unwrap();
        assert_eq!(Fixture::text(out), "codex: main\n");
    }

    #[test]
    fn ls_json_marks_active_and_system_profiles() {
        let f = Fixture::new();
        f.login_codex("a");
        backup(&f.ctx, &mut Vec::new(), Tool::Codex, "alpha").unwrap();
        f.login_codex("b");
        backup(&f.ctx, &mut Vec::new(), Tool::Codex, "beta").unwrap();
        f.login_codex("unsaved");
        activate(&f.ctx, &mut Vec::new(), Tool::Codex, "alpha").unwrap();

        let mut out = Vec::new();
        ls(&f.ctx, &mut out, Some(Tool::Codex), true).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let profiles = v[0]["profiles"].as_array().unwrap();
        let names: Vec<&str> = profiles.iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"alpha") && names.contains(&"beta"));
        let alpha = profiles.iter().find(|p| p["name"] == "alpha").unwrap();
        assert_eq!(alpha["active"], true);
        assert!(profiles
            .iter()
            .any(|p| p["system"] == true && p["name"].as_str().unwrap().starts_with('_')));
    }

    #[test]
    fn delete_refuses_system_profile_without_force() {
        let f = Fixture::new();
        f.login_codex("before");
        f.ctx.vault.backup_original(&f.ctx.auth(Tool::Codex).unwrap()).unwrap();

        let err = delete(&f.ctx, &mut Vec::new(), Tool::Codex, "_original", false).unwrap_err();
        assert!(matches!(err, CliError::Vault(VaultError::ProtectedProfile { .. })));
        delete(&f.ctx, &mut Vec::new(), Tool::Codex, "_original", true).unwrap();
        assert!(!f.ctx.vault.exists("codex", "_original").unwrap());
    }
}
