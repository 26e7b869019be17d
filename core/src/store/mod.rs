//! Cooldown and health facts consumed by rotation and written by handoff.
//!
//! The traits are the contract; [`MemoryStore`] is the in-process pool and
//! [`StoreState`] is the serializable snapshot shared by file-backed stores.

mod memory;
mod state;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use state::StoreState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownRecord {
    pub tool: String,
    pub profile: String,
    pub hit_at: DateTime<Utc>,
    pub cooldown_until: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

impl CooldownRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until > now
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.cooldown_until - now).max(Duration::zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileHealth {
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Accumulated penalty from recent errors; 0 means none.
    #[serde(default)]
    pub penalty: f64,
    /// Subscription tier, e.g. "pro", "team", "enterprise".
    #[serde(default)]
    pub plan: Option<String>,
}

pub trait CooldownStore: Send + Sync {
    fn set_cooldown(
        &self,
        tool: &str,
        profile: &str,
        since: DateTime<Utc>,
        duration: Duration,
        note: &str,
    ) -> Result<(), StoreError>;

    fn active_cooldown(
        &self,
        tool: &str,
        profile: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CooldownRecord>, StoreError>;

    /// Returns how many records were removed.
    fn clear_cooldown(&self, tool: &str, profile: &str) -> Result<usize, StoreError>;

    fn clear_all(&self, tool: Option<&str>) -> Result<usize, StoreError>;

    fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<CooldownRecord>, StoreError>;
}

pub trait HealthStore: Send + Sync {
    fn health(&self, tool: &str, profile: &str) -> Result<Option<ProfileHealth>, StoreError>;

    fn last_activation(
        &self,
        tool: &str,
        profile: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn record_activation(
        &self,
        tool: &str,
        profile: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

pub(crate) fn key(tool: &str, profile: &str) -> String {
    format!("{tool}/{profile}")
}
