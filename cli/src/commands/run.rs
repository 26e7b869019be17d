use std::io::IsTerminal;
use std::sync::Arc;

use acctswap_core::api::{PtyController, Tool};
use acctswap_plugins::factory;
use acctswap_plugins::pty::{PortablePty, PtyCommand};
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::cli::RunArgs;
use super::Ctx;
use crate::error::CliError;

/// Executable launched when `--bin` is not given.
pub fn default_binary(tool: Tool) -> &'static str {
    match tool {
        Tool::Claude => "claude",
        Tool::Codex => "codex",
        Tool::Gemini => "gemini",
    }
}

/// Restores cooked mode however `run` exits.
struct RawMode;

impl RawMode {
    fn enable() -> Option<Self> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        match crossterm::terminal::enable_raw_mode() {
            Ok(()) => Some(RawMode),
            Err(e) => {
                tracing::warn!(target: "acctswap.cli", error = %e, "raw mode unavailable");
                None
            }
        }
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Wrap the tool in a pseudo-terminal with automatic handoff and return its exit code.
pub async fn run(ctx: &Ctx, args: RunArgs) -> Result<i32, CliError> {
    let bin = args
        .bin
        .clone()
        .unwrap_or_else(|| default_binary(args.tool).to_string());
    let program = which::which(&bin)
        .map_err(|_| CliError::Usage(format!("{bin}: not found on PATH")))?;

    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let command = PtyCommand::new(program.to_string_lossy())
        .args(args.args.iter().cloned())
        .size(rows, cols);
    let pty = Arc::new(PortablePty::new(command));
    let controller = factory::build_handoff(&ctx.cfg, args.tool, pty.clone())?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let raw = RawMode::enable();
    let mut tasks = vec![forward_stdin(pty.clone()), watch_signals(cancel_tx)];
    #[cfg(unix)]
    tasks.push(follow_resize(pty.clone()));

    let mut stdout = std::io::stdout();
    let result = controller.run(&mut stdout, cancel_rx).await;

    for t in &tasks {
        t.abort();
    }
    drop(raw);

    let code = result?;
    tracing::info!(
        target: "acctswap.cli",
        tool = %args.tool,
        exit_code = code,
        handoffs = controller.handoff_count(),
        "run finished"
    );
    Ok(code)
}

fn forward_stdin(pty: Arc<PortablePty>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Err(e) = pty.write_input(&buf[..n]).await {
                        tracing::debug!(target: "acctswap.cli", error = %e, "stdin forward stopped");
                        break;
                    }
                }
            }
        }
    })
}

/// In raw mode Ctrl-C reaches the child as input; these only fire when
/// the wrapper itself is signalled.
fn watch_signals(cancel: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(target: "acctswap.cli", error = %e, "cannot watch SIGTERM");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
        }
        tracing::info!(target: "acctswap.cli", "interrupted, stopping session");
        let _ = cancel.send(true);
    })
}

#[cfg(unix)]
fn follow_resize(pty: Arc<PortablePty>) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};
    tokio::spawn(async move {
        let Ok(mut winch) = signal(SignalKind::window_change()) else {
            return;
        };
        while winch.recv().await.is_some() {
            if let Ok((cols, rows)) = crossterm::terminal::size() {
                if let Err(e) = pty.resize(rows, cols) {
                    tracing::debug!(target: "acctswap.cli", error = %e, "resize failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Fixture;

    #[test]
    fn default_binaries_match_tool_ids() {
        for tool in Tool::ALL {
            assert_eq!(default_binary(tool), tool.as_str());
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_usage_error() {
        let f = Fixture::new();
        let args = RunArgs {
            tool: Tool::Codex,
            bin: Some("acctswap-no-such-binary-xyz".into()),
            args: Vec::new(),
        };
        assert!(matches!(run(&f.ctx, args).await, Err(CliError::Usage(_))));
    }
}
