use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{key, CooldownRecord, ProfileHealth};

/// Plain data behind every store implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub cooldowns: Vec<CooldownRecord>,
    #[serde(default)]
    pub health: BTreeMap<String, ProfileHealth>,
    #[serde(default)]
    pub activations: BTreeMap<String, DateTime<Utc>>,
}

impl StoreState {
    /// Replaces any earlier record for the same profile.
    pub fn set_cooldown(
        &mut self,
        tool: &str,
        profile: &str,
        since: DateTime<Utc>,
        duration: Duration,
        note: &str,
    ) {
        self.cooldowns
            .retain(|c| !(c.tool == tool && c.profile == profile));
        self.cooldowns.push(CooldownRecord {
            tool: tool.to_string(),
            profile: profile.to_string(),
            hit_at: since,
            cooldown_until: since + duration,
            notes: note.to_string(),
        });
    }

    pub fn active_cooldown(
        &self,
        tool: &str,
        profile: &str,
        now: DateTime<Utc>,
    ) -> Option<CooldownRecord> {
        self.cooldowns
            .iter()
            .filter(|c| c.tool == tool && c.profile == profile && c.is_active(now))
            .max_by_key(|c| c.cooldown_until)
            .cloned()
    }

    pub fn clear_cooldown(&mut self, tool: &str, profile: &str) -> usize {
        let before = self.cooldowns.len();
        self.cooldowns
            .retain(|c| !(c.tool == tool && c.profile == profile));
        before - self.cooldowns.len()
    }

    pub fn clear_all(&mut self, tool: Option<&str>) -> usize {
        let before = self.cooldowns.len();
        match tool {
            Some(t) => self.cooldowns.retain(|c| c.tool != t),
            None => self.cooldowns.clear(),
        }
        before - self.cooldowns.len()
    }

    pub fn list_active(&self, now: DateTime<Utc>) -> Vec<CooldownRecord> {
        let mut out: Vec<_> = self
            .cooldowns
            .iter()
            .filter(|c| c.is_active(now))
            .cloned()
            .collect();
        out.sort_by(|a, b| (&a.tool, &a.profile).cmp(&(&b.tool, &b.profile)));
        out
    }

    /// Drop expired cooldowns; returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.cooldowns.len();
        self.cooldowns.retain(|c| c.is_active(now));
        before - self.cooldowns.len()
    }

    pub fn health(&self, tool: &str, profile: &str) -> Option<ProfileHealth> {
        self.health.get(&key(tool, profile)).cloned()
    }

    pub fn set_health(&mut self, tool: &str, profile: &str, health: ProfileHealth) {
        self.health.insert(key(tool, profile), health);
    }

    pub fn last_activation(&self, tool: &str, profile: &str) -> Option<DateTime<Utc>> {
        self.activations.get(&key(tool, profile)).copied()
    }

    pub fn record_activation(&mut self, tool: &str, profile: &str, at: DateTime<Utc>) {
        self.activations.insert(key(tool, profile), at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        "2025-12-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn cooldown_expires() {
        let mut s = StoreState::default();
        s.set_cooldown("claude", "a", t0(), Duration::minutes(60), "auto");
        assert!(s.active_cooldown("claude", "a", t0() + Duration::minutes(59)).is_some());
        assert!(s.active_cooldown("claude", "a", t0() + Duration::minutes(60)).is_none());
        assert!(s.active_cooldown("codex", "a", t0()).is_none());
    }

    #[test]
    fn set_cooldown_replaces_previous_record() {
        let mut s = StoreState::default();
        s.set_cooldown("claude", "a", t0(), Duration::minutes(60), "first");
        s.set_cooldown("claude", "a", t0(), Duration::minutes(5), "second");
        assert_eq!(s.cooldowns.len(), 1);
        assert_eq!(s.cooldowns[0].notes, "second");
    }

    #[test]
    fn clear_all_scopes_to_tool() {
        let mut s = StoreState::default();
        s.set_cooldown("claude", "a", t0(), Duration::minutes(60), "");
        s.set_cooldown("claude", "b", t0(), Duration::minutes(60), "");
        s.set_cooldown("codex", "a", t0(), Duration::minutes(60), "");
        assert_eq!(s.clear_all(Some("claude")), 2);
        assert_eq!(s.list_active(t0()).len(), 1);
        assert_eq!(s.prune(t0() + Duration::hours(2)), 1);
    }
}
