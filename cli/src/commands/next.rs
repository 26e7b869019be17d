use std::io::Write;

use acctswap_core::api::{is_system_profile, Algorithm, CooldownStore, SelectError, Tool};
use acctswap_plugins::factory;
use chrono::Utc;

use super::Ctx;
use crate::error::CliError;

/// Pick the best profile other than the live one and switch to it.
pub fn next(
    ctx: &Ctx,
    out: &mut impl Write,
    tool: Tool,
    algorithm: Option<Algorithm>,
    dry_run: bool,
) -> Result<(), CliError> {
    let set = ctx.auth(tool)?;
    let current = ctx.vault.active_profile(&set)?.unwrap_or_default();
    let now = Utc::now();
    let mut cooling = 0;
    let mut candidates = Vec::new();
    for p in ctx.vault.list(tool.as_str())? {
        if p != current && ctx.store.active_cooldown(tool.as_str(), &p, now)?.is_some() {
            cooling += 1;
            continue;
        }
        candidates.push(p);
    }
    let open = candidates
        .iter()
        .filter(|p| **p != current && !is_system_profile(p))
        .count();
    if open == 0 && cooling > 0 {
        return Err(SelectError::AllInCooldown {
            tool: tool.to_string(),
            count: cooling,
        }
        .into());
    }

    let mut selector = factory::build_selector(&ctx.cfg, ctx.store.clone());
    selector.set_exclude_current(true);
    if let Some(alg) = algorithm {
        selector.set_algorithm(alg);
    }
    let result = selector.select_at(tool.as_str(), &candidates, &current, now)?;

    writeln!(out, "{tool} ({}):", result.algorithm)?;
    for s in &result.alternatives {
        let marker = if s.name == result.selected { ">" } else { " " };
        writeln!(out, "  {marker} {:<20} {:>8.1}", s.name, s.score)?;
        for r in &s.reasons {
            writeln!(out, "      {} {}", if r.positive { "+" } else { "-" }, r.text)?;
        }
    }

    if dry_run {
        writeln!(out, "Would switch to '{}'", result.selected)?;
        return Ok(());
    }
    super::vault::activate(ctx, out, tool, &result.selected)
}
