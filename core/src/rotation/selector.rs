use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::smart::{score_profile, Facts, ALL_COOLDOWN_THRESHOLD, COOLDOWN_SCORE};
use super::{format_duration, Algorithm, ProfileScore, ScoreReason, SelectionResult, UsageInfo};
use crate::error::SelectError;
use crate::store::{CooldownStore, HealthStore};
use crate::vault::is_system_profile;

const SINGLE_PROFILE_SCORE: f64 = 100.0;
const JITTER_MAX: f64 = 5.0;

pub struct RotationSelector {
    algorithm: Algorithm,
    cooldowns: Arc<dyn CooldownStore>,
    health: Option<Arc<dyn HealthStore>>,
    avoid_recent: Duration,
    usage: HashMap<String, UsageInfo>,
    exclude_current: bool,
    rng: StdRng,
}

impl RotationSelector {
    pub fn new(algorithm: Algorithm, cooldowns: Arc<dyn CooldownStore>) -> Self {
        Self {
            algorithm,
            cooldowns,
            health: None,
            avoid_recent: Duration::minutes(30),
            usage: HashMap::new(),
            exclude_current: false,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_health(mut self, health: Arc<dyn HealthStore>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    pub fn set_avoid_recent(&mut self, window: Duration) {
        self.avoid_recent = window;
    }

    /// Per-profile live usage for the smart algorithm, keyed by profile name.
    pub fn set_usage_data(&mut self, usage: HashMap<String, UsageInfo>) {
        self.usage = usage;
    }

    /// Never return `current`; it still anchors the round-robin walk.
    pub fn set_exclude_current(&mut self, exclude: bool) {
        self.exclude_current = exclude;
    }

    pub fn set_rng(&mut self, rng: StdRng) {
        self.rng = rng;
    }

    pub fn select(
        &mut self,
        tool: &str,
        profiles: &[String],
        current: &str,
    ) -> Result<SelectionResult, SelectError> {
        self.select_at(tool, profiles, current, Utc::now())
    }

    /// [`select`](Self::select) with an explicit clock.
    pub fn select_at(
        &mut self,
        tool: &str,
        profiles: &[String],
        current: &str,
        now: DateTime<Utc>,
    ) -> Result<SelectionResult, SelectError> {
        let ring: Vec<&String> = profiles
            .iter()
            .filter(|p| !is_system_profile(p))
            .collect();
        let eligible: Vec<&String> = ring
            .iter()
            .copied()
            .filter(|p| !(self.exclude_current && p.as_str() == current))
            .collect();

        match eligible.len() {
            0 => {
                return Err(SelectError::NoProfiles {
                    tool: tool.to_string(),
                })
            }
            1 => {
                let only = eligible[0].clone();
                return Ok(SelectionResult {
                    selected: only.clone(),
                    alternatives: vec![ProfileScore {
                        name: only,
                        score: SINGLE_PROFILE_SCORE,
                        reasons: vec![ScoreReason::good("only available profile")],
                    }],
                    algorithm: self.algorithm,
                });
            }
            _ => {}
        }

        let result = match self.algorithm {
            Algorithm::Random => self.select_random(tool, &eligible, now),
            Algorithm::RoundRobin => self.select_round_robin(tool, &ring, current, now),
            Algorithm::Smart => self.select_smart(tool, &eligible, now),
        }?;

        tracing::debug!(
            target: "acctswap.rotation",
            tool,
            algorithm = %result.algorithm,
            selected = %result.selected,
            candidates = result.alternatives.len(),
            "profile selected"
        );
        Ok(result)
    }

    fn cooldown_score(
        &self,
        tool: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ProfileScore>, SelectError> {
        let Some(cd) = self.cooldowns.active_cooldown(tool, name, now)? else {
            return Ok(None);
        };
        Ok(Some(ProfileScore {
            name: name.to_string(),
            score: COOLDOWN_SCORE,
            reasons: vec![ScoreReason::bad(format!(
                "in cooldown ({} remaining)",
                format_duration(cd.remaining(now))
            ))],
        }))
    }

    fn select_random(
        &mut self,
        tool: &str,
        eligible: &[&String],
        now: DateTime<Utc>,
    ) -> Result<SelectionResult, SelectError> {
        let mut available: Vec<ProfileScore> = Vec::new();
        let mut cooling: Vec<ProfileScore> = Vec::new();
        for name in eligible {
            match self.cooldown_score(tool, name, now)? {
                Some(s) => cooling.push(s),
                None => available.push(ProfileScore {
                    name: name.to_string(),
                    score: 0.0,
                    reasons: vec![ScoreReason::good("not in cooldown")],
                }),
            }
        }
        if available.is_empty() {
            return Err(SelectError::AllInCooldown {
                tool: tool.to_string(),
                count: eligible.len(),
            });
        }

        let pick = self.rng.gen_range(0..available.len());
        let chosen = available.remove(pick);
        let selected = chosen.name.clone();
        let mut alternatives = vec![chosen];
        alternatives.extend(available);
        alternatives.extend(cooling);
        Ok(SelectionResult {
            selected,
            alternatives,
            algorithm: Algorithm::Random,
        })
    }

    /// `ring` holds every non-system name, `current` included, so the walk
    /// starts from its position even when it is excluded from the result.
    fn select_round_robin(
        &mut self,
        tool: &str,
        ring: &[&String],
        current: &str,
        now: DateTime<Utc>,
    ) -> Result<SelectionResult, SelectError> {
        let mut names: Vec<&String> = ring.to_vec();
        names.sort();
        let n = names.len();
        // Unknown current starts the walk at the first name.
        let start = names.iter().position(|p| p.as_str() == current).unwrap_or(n - 1);

        let mut skipped = Vec::new();
        let mut considered = 0;
        for step in 1..=n {
            let name = names[(start + step) % n];
            if self.exclude_current && name.as_str() == current {
                continue;
            }
            considered += 1;
            if let Some(s) = self.cooldown_score(tool, name, now)? {
                skipped.push(s);
                continue;
            }
            let mut alternatives = vec![ProfileScore {
                name: name.clone(),
                score: 0.0,
                reasons: vec![ScoreReason::good("next in rotation")],
            }];
            alternatives.extend(skipped);
            return Ok(SelectionResult {
                selected: name.clone(),
                alternatives,
                algorithm: Algorithm::RoundRobin,
            });
        }

        Err(SelectError::AllInCooldown {
            tool: tool.to_string(),
            count: considered,
        })
    }

    fn select_smart(
        &mut self,
        tool: &str,
        eligible: &[&String],
        now: DateTime<Utc>,
    ) -> Result<SelectionResult, SelectError> {
        let mut scores = Vec::with_capacity(eligible.len());
        for name in eligible {
            let cooldown = self.cooldowns.active_cooldown(tool, name, now)?;
            let (health, last_activation) = match (&self.health, &cooldown) {
                (Some(h), None) => (h.health(tool, name)?, h.last_activation(tool, name)?),
                _ => (None, None),
            };
            let jitter = self.rng.gen_range(0.0..JITTER_MAX);
            scores.push(score_profile(
                name,
                Facts {
                    now,
                    cooldown,
                    health,
                    last_activation,
                    avoid_recent: self.avoid_recent,
                    usage: self.usage.get(name.as_str()),
                    jitter,
                },
            ));
        }

        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        if scores[0].score < ALL_COOLDOWN_THRESHOLD {
            return Err(SelectError::AllInCooldown {
                tool: tool.to_string(),
                count: scores.len(),
            });
        }

        Ok(SelectionResult {
            selected: scores[0].name.clone(),
            alternatives: scores,
            algorithm: Algorithm::Smart,
        })
    }
}
