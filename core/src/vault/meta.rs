use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreatedBy {
    User,
    Auto,
    FirstActivate,
}

/// Contents of `<vault>/<tool>/<profile>/meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub tool: String,
    pub profile: String,
    pub backed_up_at: DateTime<Utc>,
    pub files: usize,
    #[serde(rename = "type")]
    pub kind: ProfileKind,
    pub created_by: CreatedBy,
    #[serde(default)]
    pub original_paths: Vec<String>,
}

pub(crate) fn read_meta(path: &Path) -> Result<ProfileMeta, VaultError> {
    let bytes = std::fs::read(path).map_err(|e| VaultError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| VaultError::Meta {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn encode_meta(path: &Path, meta: &ProfileMeta) -> Result<Vec<u8>, VaultError> {
    serde_json::to_vec_pretty(meta).map_err(|source| VaultError::Meta {
        path: path.to_path_buf(),
        source,
    })
}
