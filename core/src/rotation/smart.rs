use chrono::{DateTime, Duration, Utc};

use super::{ProfileScore, ScoreReason, UsageInfo};
use crate::store::{CooldownRecord, HealthStatus, ProfileHealth};

pub(super) const COOLDOWN_SCORE: f64 = -10_000.0;
pub(super) const ALL_COOLDOWN_THRESHOLD: f64 = -9_000.0;

const HEALTHY_BONUS: f64 = 100.0;
const WARNING_BONUS: f64 = 50.0;
const CRITICAL_PENALTY: f64 = -50.0;
const PENALTY_WEIGHT: f64 = 10.0;
const ENTERPRISE_BONUS: f64 = 30.0;
const PRO_TEAM_BONUS: f64 = 20.0;
const RECENT_MAX_PENALTY: f64 = 50.0;
const RESTED_MAX_BONUS: f64 = 50.0;
const RESTED_BONUS_PER_HOUR: f64 = 10.0;
const NEVER_USED_BONUS: f64 = 25.0;
const SECONDARY_EXHAUSTED_PENALTY: f64 = -30.0;
const USAGE_ERROR_PENALTY: f64 = -10.0;

/// Inputs for scoring one candidate, gathered by the selector.
pub(super) struct Facts<'a> {
    pub now: DateTime<Utc>,
    pub cooldown: Option<CooldownRecord>,
    pub health: Option<ProfileHealth>,
    pub last_activation: Option<DateTime<Utc>>,
    pub avoid_recent: Duration,
    pub usage: Option<&'a UsageInfo>,
    pub jitter: f64,
}

pub(super) fn score_profile(name: &str, facts: Facts<'_>) -> ProfileScore {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if let Some(cd) = &facts.cooldown {
        reasons.push(ScoreReason::bad(format!(
            "in cooldown ({} remaining)",
            format_duration(cd.remaining(facts.now))
        )));
        return ProfileScore {
            name: name.to_string(),
            score: COOLDOWN_SCORE,
            reasons,
        };
    }

    if let Some(h) = &facts.health {
        let ttl = h
            .token_expires_at
            .map(|exp| exp - facts.now)
            .map(|d| {
                if d > Duration::zero() {
                    format!(" (token valid for {})", format_duration(d))
                } else {
                    " (token expired)".to_string()
                }
            })
            .unwrap_or_default();
        match h.status {
            HealthStatus::Healthy => {
                score += HEALTHY_BONUS;
                reasons.push(ScoreReason::good(format!("healthy{ttl}")));
            }
            HealthStatus::Warning => {
                score += WARNING_BONUS;
                reasons.push(ScoreReason::bad(format!("health warning{ttl}")));
            }
            HealthStatus::Critical => {
                score += CRITICAL_PENALTY;
                reasons.push(ScoreReason::bad(format!("health critical{ttl}")));
            }
            HealthStatus::Unknown => {}
        }

        if h.penalty > 0.0 {
            score -= h.penalty * PENALTY_WEIGHT;
            reasons.push(ScoreReason::bad(format!(
                "recent errors (penalty {:.1})",
                h.penalty
            )));
        }

        match h.plan.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("enterprise") => {
                score += ENTERPRISE_BONUS;
                reasons.push(ScoreReason::good("enterprise plan"));
            }
            Some(p @ ("pro" | "team")) => {
                score += PRO_TEAM_BONUS;
                reasons.push(ScoreReason::good(format!("{p} plan")));
            }
            _ => {}
        }
    }

    match facts.last_activation {
        Some(at) => {
            let elapsed = (facts.now - at).max(Duration::zero());
            let window = facts.avoid_recent;
            if window > Duration::zero() && elapsed < window {
                let remaining = window - elapsed;
                let frac = remaining.num_seconds() as f64 / window.num_seconds() as f64;
                score -= RECENT_MAX_PENALTY * frac;
                reasons.push(ScoreReason::bad(format!(
                    "used {} ago",
                    format_duration(elapsed)
                )));
            } else {
                let hours = elapsed.num_seconds() as f64 / 3600.0;
                score += (hours * RESTED_BONUS_PER_HOUR).min(RESTED_MAX_BONUS);
                reasons.push(ScoreReason::good(format!(
                    "last used {} ago",
                    format_duration(elapsed)
                )));
            }
        }
        None => {
            score += NEVER_USED_BONUS;
            reasons.push(ScoreReason::good("never used"));
        }
    }

    if let Some(u) = facts.usage {
        if let Some(err) = &u.error {
            score += USAGE_ERROR_PENALTY;
            reasons.push(ScoreReason::bad(format!("usage unavailable: {err}")));
        } else {
            score += u.availability_score - 50.0;
            if let Some(p) = u.primary_used_percent {
                if p >= 80.0 {
                    reasons.push(ScoreReason::bad(format!("primary limit {p:.0}% used")));
                } else if p <= 30.0 {
                    reasons.push(ScoreReason::good(format!("primary limit {p:.0}% used")));
                }
            }
            if let Some(s) = u.secondary_used_percent {
                if s >= 80.0 {
                    score += SECONDARY_EXHAUSTED_PENALTY;
                    reasons.push(ScoreReason::bad(format!("secondary limit {s:.0}% used")));
                }
            }
        }
    }

    score += facts.jitter;

    ProfileScore {
        name: name.to_string(),
        score,
        reasons,
    }
}

/// Compact human duration: `2h 5m`, `12m`, `45s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h >= 24 {
        format!("{}d {}h", h / 24, h % 24)
    } else if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m")
    } else {
        format!("{s}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2025-12-01T12:00:00Z".parse().unwrap()
    }

    fn facts<'a>() -> Facts<'a> {
        Facts {
            now: now(),
            cooldown: None,
            health: None,
            last_activation: None,
            avoid_recent: Duration::minutes(30),
            usage: None,
            jitter: 0.0,
        }
    }

    #[test]
    fn cooldown_short_circuits() {
        let mut f = facts();
        f.cooldown = Some(CooldownRecord {
            tool: "claude".into(),
            profile: "a".into(),
            hit_at: now(),
            cooldown_until: now() + Duration::minutes(42),
            notes: String::new(),
        });
        f.health = Some(ProfileHealth {
            status: HealthStatus::Healthy,
            ..Default::default()
        });
        let s = score_profile("a", f);
        assert_eq!(s.score, COOLDOWN_SCORE);
        assert_eq!(s.reasons.len(), 1);
        assert!(s.reasons[0].text.contains("42m"));
    }

    #[test]
    fn health_plan_and_penalty_add_up() {
        let mut f = facts();
        f.health = Some(ProfileHealth {
            status: HealthStatus::Healthy,
            token_expires_at: Some(now() + Duration::hours(3)),
            penalty: 1.5,
            plan: Some("Enterprise".into()),
        });
        let s = score_profile("a", f);
        // 100 - 15 + 30 + 25 (never used)
        assert_eq!(s.score, 140.0);
        assert!(s.reasons[0].text.contains("token valid for 3h 0m"));
    }

    #[test]
    fn recency_penalty_scales_with_remaining_window() {
        let mut f = facts();
        f.last_activation = Some(now());
        assert_eq!(score_profile("a", f).score, -50.0);

        let mut f = facts();
        f.last_activation = Some(now() - Duration::minutes(15));
        assert_eq!(score_profile("a", f).score, -25.0);
    }

    #[test]
    fn rested_bonus_is_capped() {
        let mut f = facts();
        f.last_activation = Some(now() - Duration::hours(2));
        assert_eq!(score_profile("a", f).score, 20.0);

        let mut f = facts();
        f.last_activation = Some(now() - Duration::days(3));
        assert_eq!(score_profile("a", f).score, 50.0);
    }

    #[test]
    fn usage_centers_availability_and_penalizes_secondary() {
        let usage = UsageInfo {
            availability_score: 90.0,
            primary_used_percent: Some(10.0),
            secondary_used_percent: Some(85.0),
            error: None,
        };
        let mut f = facts();
        f.usage = Some(&usage);
        // 25 (never used) + 40 - 30
        assert_eq!(score_profile("a", f).score, 35.0);

        let failed = UsageInfo {
            error: Some("timeout".into()),
            ..Default::default()
        };
        let mut f = facts();
        f.usage = Some(&failed);
        assert_eq!(score_profile("a", f).score, 15.0);
    }

    #[test]
    fn durations_render_compactly() {
        assert_eq!(format_duration(Duration::seconds(45)), "45s");
        assert_eq!(format_duration(Duration::minutes(12)), "12m");
        assert_eq!(format_duration(Duration::minutes(125)), "2h 5m");
        assert_eq!(format_duration(Duration::hours(50)), "2d 2h");
    }
}
