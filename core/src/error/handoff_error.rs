use std::time::Duration;

use thiserror::Error;

use super::{PtyError, SelectError, VaultError};

/// Why a handoff attempt ended in `HandoffFailed`.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("current profile is unknown, cannot snapshot a rollback point")]
    UnknownCurrentProfile,

    #[error("failed to snapshot current profile {profile}: {source}")]
    Snapshot {
        profile: String,
        #[source]
        source: VaultError,
    },

    #[error("failed to list vault profiles: {0}")]
    List(#[source] VaultError),

    #[error("no backup profile available: {0}")]
    Select(#[source] SelectError),

    #[error("failed to swap auth files to {profile}: {source}")]
    Swap {
        profile: String,
        #[source]
        source: VaultError,
    },

    #[error("failed to inject login command: {0}")]
    TriggerLogin(#[source] PtyError),

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("login did not complete within {0:?}")]
    Timeout(Duration),

    #[error("handoff cancelled")]
    Cancelled,
}
