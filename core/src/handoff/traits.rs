use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PtyError;

/// A child process attached to a pseudo-terminal.
#[async_trait]
pub trait PtyController: Send + Sync {
    async fn start(&self) -> Result<(), PtyError>;

    /// Whatever output is available after a short wait; empty when idle.
    /// `Err(PtyError::Closed)` once the child side has hung up.
    async fn read_output(&self) -> Result<String, PtyError>;

    async fn write_input(&self, data: &[u8]) -> Result<(), PtyError>;

    /// Exit code of the child.
    async fn wait(&self) -> Result<i32, PtyError>;

    async fn close(&self) -> Result<(), PtyError>;
}

/// Provider-specific login driving.
#[async_trait]
pub trait LoginHandler: Send + Sync {
    fn tool(&self) -> &str;

    async fn trigger_login(&self, pty: &dyn PtyController) -> Result<(), PtyError>;

    fn is_login_complete(&self, output: &str) -> bool;

    /// Failure reason if `output` shows the login failed.
    fn is_login_failed(&self, output: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

impl NotifyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error => "error",
        }
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotifyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(NotifyLevel::Info),
            "warn" | "warning" => Ok(NotifyLevel::Warning),
            "error" => Ok(NotifyLevel::Error),
            other => Err(format!("unknown notify level: {other}")),
        }
    }
}

/// Follow-up the user can take, e.g. a command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyAction {
    pub label: String,
    pub command: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        level: NotifyLevel,
        title: &str,
        message: &str,
        action: Option<&NotifyAction>,
    ) -> anyhow::Result<()>;
}
