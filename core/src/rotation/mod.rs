//! Choosing which profile to switch to next.

mod selector;
mod smart;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use selector::RotationSelector;
pub use smart::format_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Smart,
    RoundRobin,
    Random,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Smart => "smart",
            Algorithm::RoundRobin => "round_robin",
            Algorithm::Random => "random",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "smart" => Ok(Algorithm::Smart),
            "round_robin" | "roundrobin" => Ok(Algorithm::RoundRobin),
            "random" => Ok(Algorithm::Random),
            other => Err(format!("unknown rotation algorithm: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReason {
    pub text: String,
    pub positive: bool,
}

impl ScoreReason {
    pub fn good(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            positive: true,
        }
    }

    pub fn bad(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            positive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileScore {
    pub name: String,
    /// Higher is better.
    pub score: f64,
    pub reasons: Vec<ScoreReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    pub selected: String,
    /// Every candidate, best first.
    pub alternatives: Vec<ProfileScore>,
    pub algorithm: Algorithm,
}

/// Live usage numbers fetched for a profile, when available.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageInfo {
    /// 0..=100, higher means more headroom.
    pub availability_score: f64,
    pub primary_used_percent: Option<f64>,
    pub secondary_used_percent: Option<f64>,
    /// Set when fetching usage failed; the profile is penalized, not excluded.
    pub error: Option<String>,
}
