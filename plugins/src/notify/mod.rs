//! Notification sinks for handoff events.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use acctswap_core::api::{Notifier, NotifyAction, NotifyLevel};

/// Sends notifications to the tracing log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        level: NotifyLevel,
        title: &str,
        message: &str,
        action: Option<&NotifyAction>,
    ) -> anyhow::Result<()> {
        let command = action.map(|a| a.command.as_str());
        match level {
            NotifyLevel::Info => {
                tracing::info!(target: "acctswap.notify", title, message, ?command)
            }
            NotifyLevel::Warning => {
                tracing::warn!(target: "acctswap.notify", title, message, ?command)
            }
            NotifyLevel::Error => {
                tracing::error!(target: "acctswap.notify", title, message, ?command)
            }
        }
        Ok(())
    }
}

/// Prints a framed line to the terminal, below the wrapped tool's output.
pub struct TerminalNotifier {
    min_level: NotifyLevel,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalNotifier {
    pub fn stderr(min_level: NotifyLevel) -> Self {
        Self::with_writer(min_level, Box::new(std::io::stderr()))
    }

    pub fn with_writer(min_level: NotifyLevel, out: Box<dyn Write + Send>) -> Self {
        Self {
            min_level,
            out: Mutex::new(out),
        }
    }
}

fn render(level: NotifyLevel, title: &str, message: &str, action: Option<&NotifyAction>) -> String {
    // \r\n because the terminal is usually in raw mode while a tool runs.
    let mut s = format!("\r\n[acctswap {level}] {title}: {message}\r\n");
    if let Some(a) = action {
        s.push_str(&format!("  {}: {}\r\n", a.label, a.command));
    }
    s
}

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn notify(
        &self,
        level: NotifyLevel,
        title: &str,
        message: &str,
        action: Option<&NotifyAction>,
    ) -> anyhow::Result<()> {
        LogNotifier.notify(level, title, message, action).await?;
        if level < self.min_level {
            return Ok(());
        }
        let line = render(level, title, message, action);
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier output lock poisoned"))?;
        out.write_all(line.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        _level: NotifyLevel,
        _title: &str,
        _message: &str,
        _action: Option<&NotifyAction>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
