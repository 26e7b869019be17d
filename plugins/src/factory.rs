use std::sync::Arc;

use anyhow::{Context, Result};

use acctswap_core::api::{
    AppConfig, HandoffConfig, HandoffController, HandoffDeps, Notifier, NotifyLevel, NotifySink,
    PtyController, RateLimitDetector, RotationSelector, Tool, Vault,
};

use crate::notify::{LogNotifier, NoopNotifier, TerminalNotifier};
use crate::provider::{auth_file_set, ProviderLogin};
use crate::store::JsonFileStore;

pub fn build_vault(cfg: &AppConfig) -> Vault {
    Vault::new(cfg.vault_path())
}

pub fn build_store(cfg: &AppConfig) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::new(cfg.state_path()))
}

pub fn build_selector(cfg: &AppConfig, store: Arc<JsonFileStore>) -> RotationSelector {
    let mut selector =
        RotationSelector::new(cfg.rotation.algorithm, store.clone()).with_health(store);
    selector.set_avoid_recent(chrono::Duration::minutes(
        cfg.rotation.avoid_recent_minutes.max(0),
    ));
    selector
}

/// Configured pattern override for `tool`, else the built-in set.
pub fn build_detector(cfg: &AppConfig, tool: Tool) -> Result<RateLimitDetector> {
    match cfg.patterns_for(tool.as_str()) {
        Some(patterns) => RateLimitDetector::from_patterns(patterns)
            .with_context(|| format!("invalid rate-limit pattern for {tool}")),
        None => Ok(RateLimitDetector::for_tool(tool.as_str())),
    }
}

pub fn build_notifier(cfg: &AppConfig) -> Arc<dyn Notifier> {
    if !cfg.notify.enabled {
        return Arc::new(NoopNotifier);
    }
    match cfg.notify.sink {
        NotifySink::Log => Arc::new(LogNotifier),
        NotifySink::Terminal => {
            let min_level = cfg.notify.min_level.parse().unwrap_or_else(|e| {
                tracing::warn!(target: "acctswap.notify", error = %e, "falling back to info");
                NotifyLevel::Info
            });
            Arc::new(TerminalNotifier::stderr(min_level))
        }
    }
}

/// Wire a handoff controller for `tool` around an already-built pseudo-terminal.
pub fn build_handoff(
    cfg: &AppConfig,
    tool: Tool,
    pty: Arc<dyn PtyController>,
) -> Result<HandoffController> {
    let store = build_store(cfg);
    let deps = HandoffDeps {
        vault: build_vault(cfg),
        auth: auth_file_set(tool)?,
        pty,
        login: Arc::new(ProviderLogin::for_tool(tool)),
        notifier: build_notifier(cfg),
        selector: build_selector(cfg, store.clone()),
        detector: build_detector(cfg, tool)?,
        cooldowns: Some(store.clone()),
        health: Some(store),
    };
    Ok(HandoffController::new(
        HandoffConfig::from_settings(tool.as_str(), &cfg.handoff),
        deps,
    ))
}
