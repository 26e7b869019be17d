use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "ACCTSWAP_CONFIG";

/// `$ACCTSWAP_CONFIG`, else `~/.config/acctswap/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&p).into_owned()));
        }
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoDir("home"))?;
    Ok(home.join(".config").join("acctswap").join("config.toml"))
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    let path = default_config_path()?;
    load_from(&path)
}

/// Missing file means defaults; env overrides apply either way.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut cfg = if path.exists() {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        parse(&s, path)?
    } else {
        AppConfig::default()
    };
    apply_env(&mut cfg, |k| std::env::var(k).ok())?;
    Ok(cfg)
}

fn parse(s: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    toml::from_str::<AppConfig>(s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn apply_env(
    cfg: &mut AppConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = var("ACCTSWAP_VAULT_DIR").filter(|v| !v.trim().is_empty()) {
        cfg.vault_dir = v;
    }
    if let Some(v) = var("ACCTSWAP_STATE_FILE").filter(|v| !v.trim().is_empty()) {
        cfg.state_file = v;
    }
    if let Some(v) = var("ACCTSWAP_ALGORITHM").filter(|v| !v.trim().is_empty()) {
        cfg.rotation.algorithm = v.parse().map_err(|_| ConfigError::EnvInvalid {
            key: "ACCTSWAP_ALGORITHM".into(),
            value: v.clone(),
        })?;
    }
    Ok(())
}
