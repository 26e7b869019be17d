use thiserror::Error;

use acctswap_core::api::{ConfigError, PtyError, SelectError, StoreError, VaultError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Vault(e) if e.is_validation() => 2,
            _ => 1,
        }
    }
}
