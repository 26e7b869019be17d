use thiserror::Error;

use super::StoreError;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("no eligible profiles for {tool} (system profiles are never selected)")]
    NoProfiles { tool: String },

    #[error("all {count} profiles for {tool} are in cooldown")]
    AllInCooldown { tool: String, count: usize },

    #[error("cooldown/health lookup failed")]
    Store(#[from] StoreError),
}
