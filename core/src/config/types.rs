use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rotation::Algorithm;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the profile vault; `~` is expanded on load.
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,

    /// JSON file backing the cooldown/health store.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(default)]
    pub rotation: RotationConfig,

    #[serde(default)]
    pub handoff: HandoffSettings,

    #[serde(default)]
    pub backup: BackupConfig,

    /// Per-tool rate-limit pattern overrides, keyed by tool id.
    #[serde(default)]
    pub patterns: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            state_file: default_state_file(),
            rotation: RotationConfig::default(),
            handoff: HandoffSettings::default(),
            backup: BackupConfig::default(),
            patterns: BTreeMap::new(),
            logging: LoggingConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn vault_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.vault_dir).into_owned())
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.state_file).into_owned())
    }

    /// Pattern override for `tool`, if one is configured and non-empty.
    pub fn patterns_for(&self, tool: &str) -> Option<&[String]> {
        self.patterns
            .get(tool)
            .filter(|p| !p.is_empty())
            .map(Vec::as_slice)
    }
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("acctswap")
}

fn default_vault_dir() -> String {
    data_root().join("vault").to_string_lossy().into_owned()
}

fn default_state_file() -> String {
    data_root().join("state.json").to_string_lossy().into_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default)]
    pub algorithm: Algorithm,

    #[serde(default = "default_avoid_recent_minutes")]
    pub avoid_recent_minutes: i64,
}

fn default_avoid_recent_minutes() -> i64 {
    30
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            avoid_recent_minutes: default_avoid_recent_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffSettings {
    /// When false the controller only notifies on a limit (manual mode).
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,

    #[serde(default)]
    pub login_timeout_secs: Option<u64>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_cooldown_minutes() -> i64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
            cooldown_minutes: default_cooldown_minutes(),
            login_timeout_secs: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl HandoffSettings {
    pub fn login_timeout(&self) -> Option<Duration> {
        self.login_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_true")]
    pub backup_current_on_activate: bool,

    /// Auto-snapshots kept per tool; 0 keeps all.
    #[serde(default = "default_max_auto_backups")]
    pub max_auto_backups: usize,
}

fn default_max_auto_backups() -> usize {
    5
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_current_on_activate: true,
            max_auto_backups: default_max_auto_backups(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<String>,

    /// Default filter when `ACCTSWAP_LOG` is unset.
    #[serde(default)]
    pub level: Option<String>,
}

impl LoggingConfig {
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .map(|f| PathBuf::from(shellexpand::tilde(f).into_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifySink {
    /// Framed line on stderr, also logged.
    #[default]
    Terminal,
    /// Log only.
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub sink: NotifySink,

    #[serde(default = "default_min_level")]
    pub min_level: String,
}

fn default_min_level() -> String {
    "info".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sink: NotifySink::default(),
            min_level: default_min_level(),
        }
    }
}
