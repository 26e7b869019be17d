use std::fmt;

use serde::Serialize;

/// Phase of the live session. Nothing is absorbing: both the success and the
/// failure path end back in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffState {
    #[default]
    Running,
    RateLimited,
    SelectingBackup,
    SwappingAuth,
    LoggingIn,
    LoginComplete,
    HandoffFailed,
    /// Automatic handoff is disabled; the user was told to switch by hand.
    ManualMode,
}

impl HandoffState {
    pub fn as_str(self) -> &'static str {
        match self {
            HandoffState::Running => "running",
            HandoffState::RateLimited => "rate_limited",
            HandoffState::SelectingBackup => "selecting_backup",
            HandoffState::SwappingAuth => "swapping_auth",
            HandoffState::LoggingIn => "logging_in",
            HandoffState::LoginComplete => "login_complete",
            HandoffState::HandoffFailed => "handoff_failed",
            HandoffState::ManualMode => "manual_mode",
        }
    }
}

impl fmt::Display for HandoffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
