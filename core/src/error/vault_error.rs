use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// A tool or profile name failed path-safety validation.
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("path {path} escapes vault base {base}")]
    PathEscape { path: PathBuf, base: PathBuf },

    /// Distinct from `NotFound` so callers can tell "not allowed" apart from "missing".
    #[error("protected system profile: {tool}/{profile} (use force delete)")]
    ProtectedProfile { tool: String, profile: String },

    #[error("profile not found: {tool}/{profile}")]
    NotFound { tool: String, profile: String },

    #[error("required auth file missing: {}", path.display())]
    MissingRequired { path: PathBuf },

    #[error("no auth files found to back up for {tool}")]
    NothingCopied { tool: String },

    #[error("no auth files restored from {tool}/{profile}")]
    NothingRestored { tool: String, profile: String },

    #[error("io error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profile metadata error at {}", path.display())]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl VaultError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaultError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VaultError::InvalidName { .. } | VaultError::PathEscape { .. }
        )
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, VaultError::ProtectedProfile { .. })
    }
}
