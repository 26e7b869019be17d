use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::{CooldownRecord, CooldownStore, HealthStore, ProfileHealth, StoreState};
use crate::error::StoreError;

/// Process-local store; also the handoff controller's in-memory cooldown pool.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set_health(&self, tool: &str, profile: &str, health: ProfileHealth) {
        if let Ok(mut s) = self.state.lock() {
            s.set_health(tool, profile, health);
        }
    }

    pub fn snapshot(&self) -> StoreState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> Result<T, StoreError> {
        let mut guard = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut guard))
    }
}

impl CooldownStore for MemoryStore {
    fn set_cooldown(
        &self,
        tool: &str,
        profile: &str,
        since: DateTime<Utc>,
        duration: Duration,
        note: &str,
    ) -> Result<(), StoreError> {
        self.with(|s| s.set_cooldown(tool, profile, since, duration, note))
    }

    fn active_cooldown(
        &self,
        tool: &str,
        profile: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CooldownRecord>, StoreError> {
        self.with(|s| s.active_cooldown(tool, profile, now))
    }

    fn clear_cooldown(&self, tool: &str, profile: &str) -> Result<usize, StoreError> {
        self.with(|s| s.clear_cooldown(tool, profile))
    }

    fn clear_all(&self, tool: Option<&str>) -> Result<usize, StoreError> {
        self.with(|s| s.clear_all(tool))
    }

    fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<CooldownRecord>, StoreError> {
        self.with(|s| s.list_active(now))
    }
}

impl HealthStore for MemoryStore {
    fn health(&self, tool: &str, profile: &str) -> Result<Option<ProfileHealth>, StoreError> {
        self.with(|s| s.health(tool, profile))
    }

    fn last_activation(
        &self,
        tool: &str,
        profile: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.with(|s| s.last_activation(tool, profile))
    }

    fn record_activation(
        &self,
        tool: &str,
        profile: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with(|s| s.record_activation(tool, profile, at))
    }
}
