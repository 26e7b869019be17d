use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::vault::fsops::{create_dir_private, write_atomic};
use crate::vault::Vault;

const SESSION_DIR: &str = ".handoff";
const LAST_FILE: &str = "last.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Summary of the most recent handoff attempt for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub from: Option<String>,
    pub to: Option<String>,
    pub outcome: Outcome,
    #[serde(default)]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

fn record_path(vault: &Vault, tool: &str) -> Result<PathBuf, VaultError> {
    Ok(vault.tool_dir(tool)?.join(SESSION_DIR).join(LAST_FILE))
}

pub fn write_last(vault: &Vault, tool: &str, rec: &SessionRecord) -> Result<(), VaultError> {
    let path = record_path(vault, tool)?;
    if let Some(dir) = path.parent() {
        create_dir_private(dir)?;
    }
    let bytes = serde_json::to_vec_pretty(rec).map_err(|source| VaultError::Meta {
        path: path.clone(),
        source,
    })?;
    write_atomic(&path, &bytes)
}

pub fn read_last(vault: &Vault, tool: &str) -> Result<Option<SessionRecord>, VaultError> {
    let path = record_path(vault, tool)?;
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VaultError::io(&path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| VaultError::Meta { path, source })
}
