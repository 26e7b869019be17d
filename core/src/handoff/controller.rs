use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::session::{self, Outcome, SessionRecord};
use super::state::HandoffState;
use super::traits::{LoginHandler, Notifier, NotifyAction, NotifyLevel, PtyController};
use crate::config::HandoffSettings;
use crate::error::{HandoffError, PtyError};
use crate::provider::AuthFileSet;
use crate::ratelimit::{RateLimitDetector, StreamDetector};
use crate::rotation::RotationSelector;
use crate::store::{CooldownStore, HealthStore, MemoryStore};
use crate::text::preview;
use crate::vault::Vault;

const MIN_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
const LOGIN_BUF_CAP: usize = 4096;
const COOLDOWN_NOTE: &str = "automatic rate-limit detection";
const TRIGGER_PREVIEW: usize = 160;

#[derive(Debug, Clone)]
pub struct HandoffConfig {
    pub tool: String,
    /// Off means detection only notifies and the controller enters manual mode.
    pub enabled: bool,
    pub debounce: Duration,
    pub cooldown: chrono::Duration,
    /// Overrides the timeout derived from `debounce`.
    pub login_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl HandoffConfig {
    pub fn new(tool: impl Into<String>) -> Self {
        Self::from_settings(tool, &HandoffSettings::default())
    }

    pub fn from_settings(tool: impl Into<String>, s: &HandoffSettings) -> Self {
        Self {
            tool: tool.into(),
            enabled: s.enabled,
            debounce: Duration::from_millis(s.debounce_ms),
            cooldown: chrono::Duration::minutes(s.cooldown_minutes),
            login_timeout: s.login_timeout(),
            poll_interval: Duration::from_millis(s.poll_interval_ms.max(1)),
        }
    }

    /// Ten debounce periods, never under 30s, unless overridden.
    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
            .unwrap_or_else(|| (self.debounce * 10).max(MIN_LOGIN_TIMEOUT))
    }
}

/// Collaborators the controller drives.
pub struct HandoffDeps {
    pub vault: Vault,
    pub auth: AuthFileSet,
    pub pty: Arc<dyn PtyController>,
    pub login: Arc<dyn LoginHandler>,
    pub notifier: Arc<dyn Notifier>,
    pub selector: RotationSelector,
    pub detector: RateLimitDetector,
    /// External cooldown store, written alongside the in-memory pool.
    pub cooldowns: Option<Arc<dyn CooldownStore>>,
    pub health: Option<Arc<dyn HealthStore>>,
}

#[derive(Debug)]
enum LoginSignal {
    Complete,
    Failed(String),
}

enum Dispatch {
    Nothing,
    Handoff(String),
    Manual(String),
}

struct Shared {
    phase: HandoffState,
    current_profile: Option<String>,
    handoff_count: u32,
    /// Set when a detection has been dispatched; cleared when the cycle ends.
    dispatched: bool,
    detector: StreamDetector,
    transitions: Vec<HandoffState>,
    completion: Option<mpsc::Sender<LoginSignal>>,
    login_buf: String,
    session_ended: bool,
}

struct Inner {
    cfg: HandoffConfig,
    vault: Vault,
    auth: AuthFileSet,
    pty: Arc<dyn PtyController>,
    login: Arc<dyn LoginHandler>,
    notifier: Arc<dyn Notifier>,
    selector: Mutex<RotationSelector>,
    pool: MemoryStore,
    cooldowns: Option<Arc<dyn CooldownStore>>,
    health: Option<Arc<dyn HealthStore>>,
    shared: Mutex<Shared>,
}

struct Attempt {
    from: Option<String>,
    to: Option<String>,
    snapshot_taken: bool,
}

/// Runs one child in a pseudo-terminal and swaps accounts when it hits a rate limit.
///
/// The monitor loop in [`run`](Self::run) owns output routing; each detection
/// spawns one handler task that walks the handoff states and always leaves the
/// controller back in `Running`.
pub struct HandoffController {
    inner: Arc<Inner>,
}

impl HandoffController {
    pub fn new(cfg: HandoffConfig, deps: HandoffDeps) -> Self {
        let mut selector = deps.selector;
        // The profile that just hit the limit is never its own backup.
        selector.set_exclude_current(true);
        let shared = Shared {
            phase: HandoffState::Running,
            current_profile: None,
            handoff_count: 0,
            dispatched: false,
            detector: StreamDetector::new(deps.detector),
            transitions: vec![HandoffState::Running],
            completion: None,
            login_buf: String::new(),
            session_ended: false,
        };
        Self {
            inner: Arc::new(Inner {
                cfg,
                vault: deps.vault,
                auth: deps.auth,
                pty: deps.pty,
                login: deps.login,
                notifier: deps.notifier,
                selector: Mutex::new(selector),
                pool: MemoryStore::new(),
                cooldowns: deps.cooldowns,
                health: deps.health,
                shared: Mutex::new(shared),
            }),
        }
    }

    /// Skip detecting the active profile from live auth files.
    pub fn set_current_profile(&self, profile: impl Into<String>) {
        self.inner.lock().current_profile = Some(profile.into());
    }

    pub fn state(&self) -> HandoffState {
        self.inner.lock().phase
    }

    pub fn current_profile(&self) -> Option<String> {
        self.inner.lock().current_profile.clone()
    }

    pub fn handoff_count(&self) -> u32 {
        self.inner.lock().handoff_count
    }

    /// Every state entered so far, starting with `Running`.
    pub fn transitions(&self) -> Vec<HandoffState> {
        self.inner.lock().transitions.clone()
    }

    pub fn cooldown_pool(&self) -> &MemoryStore {
        &self.inner.pool
    }

    /// Start the child, forward its output to `out` and return its exit code.
    ///
    /// Handoff failures never change the exit code; only pseudo-terminal
    /// errors around start/wait are returned.
    pub async fn run<W: Write + Send>(
        &self,
        out: &mut W,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<i32, PtyError> {
        let inner = &self.inner;
        inner.pty.start().await?;
        inner.resolve_current_profile();
        tracing::info!(
            target: "acctswap.handoff",
            tool = %inner.cfg.tool,
            profile = ?inner.lock().current_profile,
            "session started"
        );

        let mut handler: Option<JoinHandle<()>> = None;
        let mut was_cancelled = false;
        loop {
            if *cancel.borrow() {
                was_cancelled = true;
                break;
            }
            let chunk = match inner.pty.read_output().await {
                Ok(c) => c,
                Err(PtyError::Closed) => break,
                Err(e) => {
                    tracing::warn!(target: "acctswap.handoff", error = %e, "read from pseudo-terminal failed");
                    break;
                }
            };
            if chunk.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(inner.cfg.poll_interval) => {}
                    _ = cancelled(&mut cancel) => {}
                }
                continue;
            }

            match inner.route_output(&chunk) {
                Dispatch::Handoff(trigger) => {
                    let task = Arc::clone(inner);
                    let task_cancel = cancel.clone();
                    handler = Some(tokio::spawn(task.handoff(trigger, task_cancel)));
                }
                Dispatch::Manual(trigger) => inner.enter_manual_mode(&trigger).await,
                Dispatch::Nothing => {}
            }

            if let Err(e) = out.write_all(chunk.as_bytes()).and_then(|_| out.flush()) {
                tracing::debug!(target: "acctswap.handoff", error = %e, "output forward failed");
            }
        }

        inner.end_session(!was_cancelled);
        if let Some(h) = handler.take() {
            if let Err(e) = h.await {
                tracing::warn!(target: "acctswap.handoff", error = %e, "handoff task aborted");
            }
        }

        let code = if was_cancelled {
            if let Err(e) = inner.pty.close().await {
                tracing::warn!(target: "acctswap.handoff", error = %e, "close after cancel failed");
            }
            inner.pty.wait().await?
        } else {
            let code = inner.pty.wait().await?;
            if let Err(e) = inner.pty.close().await {
                tracing::debug!(target: "acctswap.handoff", error = %e, "close failed");
            }
            code
        };
        tracing::info!(
            target: "acctswap.handoff",
            tool = %inner.cfg.tool,
            exit_code = code,
            handoffs = inner.lock().handoff_count,
            "session ended"
        );
        Ok(code)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, sh: &mut Shared, next: HandoffState) {
        let prev = std::mem::replace(&mut sh.phase, next);
        sh.transitions.push(next);
        tracing::info!(
            target: "acctswap.handoff",
            tool = %self.cfg.tool,
            from = %prev,
            to = %next,
            "state transition"
        );
    }

    fn transition(&self, next: HandoffState) {
        let mut sh = self.lock();
        self.set_phase(&mut sh, next);
    }

    fn resolve_current_profile(&self) {
        if self.lock().current_profile.is_some() {
            return;
        }
        match self.vault.active_profile(&self.auth) {
            Ok(found) => self.lock().current_profile = found,
            Err(e) => {
                tracing::warn!(target: "acctswap.handoff", error = %e, "cannot detect active profile");
            }
        }
    }

    /// Output routing depends on the phase: rate-limit checks while running,
    /// login markers while logging in, nothing otherwise.
    fn route_output(&self, chunk: &str) -> Dispatch {
        let mut guard = self.lock();
        let sh = &mut *guard;
        match sh.phase {
            HandoffState::Running => {
                if sh.dispatched || !sh.detector.feed(chunk) {
                    return Dispatch::Nothing;
                }
                sh.dispatched = true;
                let matched = sh.detector.matched_line().unwrap_or_default();
                let trigger = preview(matched, TRIGGER_PREVIEW);
                if self.cfg.enabled {
                    self.set_phase(sh, HandoffState::RateLimited);
                    Dispatch::Handoff(trigger)
                } else {
                    self.set_phase(sh, HandoffState::ManualMode);
                    Dispatch::Manual(trigger)
                }
            }
            HandoffState::LoggingIn => {
                sh.login_buf.push_str(chunk);
                trim_front(&mut sh.login_buf, LOGIN_BUF_CAP);
                let signal = match self.login.is_login_failed(&sh.login_buf) {
                    Some(reason) => Some(LoginSignal::Failed(reason)),
                    None if self.login.is_login_complete(&sh.login_buf) => {
                        Some(LoginSignal::Complete)
                    }
                    None => None,
                };
                if let Some(signal) = signal {
                    if let Some(tx) = sh.completion.take() {
                        let _ = tx.try_send(signal);
                    }
                }
                Dispatch::Nothing
            }
            _ => Dispatch::Nothing,
        }
    }

    /// A pending login wait is failed unless cancellation already covers it.
    fn end_session(&self, fail_pending_login: bool) {
        let mut sh = self.lock();
        sh.session_ended = true;
        if !fail_pending_login {
            return;
        }
        if let Some(tx) = sh.completion.take() {
            let _ = tx.try_send(LoginSignal::Failed("session ended".into()));
        }
    }

    fn recovery_action(&self) -> NotifyAction {
        let tool = &self.cfg.tool;
        NotifyAction {
            label: "Switch manually".into(),
            command: format!("acctswap ls {tool} && acctswap activate {tool} <profile>"),
        }
    }

    async fn notify(
        &self,
        level: NotifyLevel,
        title: &str,
        message: &str,
        action: Option<&NotifyAction>,
    ) {
        if let Err(e) = self.notifier.notify(level, title, message, action).await {
            tracing::warn!(target: "acctswap.handoff", error = %e, title, "notification failed");
        }
    }

    async fn enter_manual_mode(&self, trigger: &str) {
        let current = self.lock().current_profile.clone();
        if let Some(profile) = &current {
            self.mark_cooldown(profile, Utc::now());
        }
        let message = format!(
            "{}: {trigger}. Automatic handoff is disabled; switch accounts manually.",
            self.cfg.tool
        );
        let action = self.recovery_action();
        self.notify(NotifyLevel::Warning, "Rate limit detected", &message, Some(&action))
            .await;
    }

    fn mark_cooldown(&self, profile: &str, now: DateTime<Utc>) {
        let tool = &self.cfg.tool;
        if let Err(e) = self
            .pool
            .set_cooldown(tool, profile, now, self.cfg.cooldown, COOLDOWN_NOTE)
        {
            tracing::warn!(target: "acctswap.handoff", error = %e, profile, "cooldown pool update failed");
        }
        if let Some(store) = &self.cooldowns {
            if let Err(e) = store.set_cooldown(tool, profile, now, self.cfg.cooldown, COOLDOWN_NOTE) {
                tracing::warn!(target: "acctswap.handoff", error = %e, profile, "cooldown store update failed");
            }
        }
    }

    /// Cooling in the in-memory pool or the external store. A failing store
    /// lookup counts as not cooling; the selector re-checks the store anyway.
    fn is_cooling(&self, profile: &str, now: DateTime<Utc>) -> bool {
        let tool = &self.cfg.tool;
        if matches!(self.pool.active_cooldown(tool, profile, now), Ok(Some(_))) {
            return true;
        }
        match &self.cooldowns {
            Some(store) => match store.active_cooldown(tool, profile, now) {
                Ok(found) => found.is_some(),
                Err(e) => {
                    tracing::warn!(target: "acctswap.handoff", error = %e, profile, "cooldown lookup failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Handler task: one full handoff cycle, ending in `Running` either way.
    async fn handoff(self: Arc<Self>, trigger: String, mut cancel: watch::Receiver<bool>) {
        let tool = self.cfg.tool.clone();
        let mut attempt = Attempt {
            from: self.lock().current_profile.clone(),
            to: None,
            snapshot_taken: false,
        };
        self.notify(
            NotifyLevel::Warning,
            "Rate limit detected",
            &format!("{tool}: {trigger}. Selecting backup profile."),
            None,
        )
        .await;

        match self.attempt(&mut attempt, &mut cancel).await {
            Ok(next) => {
                {
                    let mut sh = self.lock();
                    self.set_phase(&mut sh, HandoffState::LoginComplete);
                    sh.current_profile = Some(next.clone());
                    sh.handoff_count += 1;
                    finish_cycle(&mut sh);
                }
                if let Some(h) = &self.health {
                    if let Err(e) = h.record_activation(&tool, &next, Utc::now()) {
                        tracing::warn!(target: "acctswap.handoff", error = %e, "record activation failed");
                    }
                }
                self.notify(
                    NotifyLevel::Info,
                    "Switched account",
                    &format!("{tool}: now using profile {next}"),
                    None,
                )
                .await;
                self.save_record(&attempt, Outcome::Success, None);
            }
            Err(e) => {
                self.transition(HandoffState::HandoffFailed);
                tracing::warn!(target: "acctswap.handoff", tool = %tool, error = %e, "handoff failed");
                let action = self.recovery_action();
                self.notify(
                    NotifyLevel::Warning,
                    "Account handoff failed",
                    &format!(
                        "{e}. Run `acctswap ls {tool}` then `acctswap activate {tool} <profile>` to switch manually."
                    ),
                    Some(&action),
                )
                .await;
                if attempt.snapshot_taken {
                    if let Some(prev) = &attempt.from {
                        self.rollback(prev);
                    }
                }
                {
                    let mut sh = self.lock();
                    sh.current_profile = attempt.from.clone();
                    finish_cycle(&mut sh);
                }
                self.save_record(&attempt, Outcome::Failed, Some(e.to_string()));
            }
        }
        self.transition(HandoffState::Running);
    }

    async fn attempt(
        &self,
        a: &mut Attempt,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<String, HandoffError> {
        let tool = self.cfg.tool.as_str();
        let from = a.from.clone().ok_or(HandoffError::UnknownCurrentProfile)?;

        self.vault
            .backup(&self.auth, &from)
            .map_err(|source| HandoffError::Snapshot {
                profile: from.clone(),
                source,
            })?;
        a.snapshot_taken = true;

        self.transition(HandoffState::SelectingBackup);
        let now = Utc::now();
        let candidates: Vec<String> = self
            .vault
            .list(tool)
            .map_err(HandoffError::List)?
            .into_iter()
            .filter(|p| *p == from || !self.is_cooling(p, now))
            .collect();
        let selection = {
            let mut selector = self.selector.lock().unwrap_or_else(|e| e.into_inner());
            selector.select_at(tool, &candidates, &from, now)
        }
        .map_err(HandoffError::Select)?;
        let next = selection.selected;
        a.to = Some(next.clone());
        tracing::info!(
            target: "acctswap.handoff",
            tool,
            from = %from,
            to = %next,
            algorithm = %selection.algorithm,
            "backup profile selected"
        );

        self.mark_cooldown(&from, now);

        self.transition(HandoffState::SwappingAuth);
        self.vault
            .restore(&self.auth, &next)
            .map_err(|source| HandoffError::Swap {
                profile: next.clone(),
                source,
            })?;

        let mut rx = self.begin_login()?;
        self.login
            .trigger_login(self.pty.as_ref())
            .await
            .map_err(HandoffError::TriggerLogin)?;

        let timeout = self.cfg.login_timeout();
        tokio::select! {
            res = tokio::time::timeout(timeout, rx.recv()) => match res {
                Ok(Some(LoginSignal::Complete)) => Ok(next),
                Ok(Some(LoginSignal::Failed(reason))) => Err(HandoffError::LoginFailed(reason)),
                Ok(None) => Err(HandoffError::LoginFailed("session ended".into())),
                Err(_) => Err(HandoffError::Timeout(timeout)),
            },
            _ = cancelled(cancel) => Err(HandoffError::Cancelled),
        }
    }

    /// Enter `LoggingIn` with a fresh completion slot, before any login output can arrive.
    fn begin_login(&self) -> Result<mpsc::Receiver<LoginSignal>, HandoffError> {
        let mut sh = self.lock();
        if sh.session_ended {
            return Err(HandoffError::LoginFailed("session ended".into()));
        }
        let (tx, rx) = mpsc::channel(1);
        sh.completion = Some(tx);
        sh.login_buf.clear();
        self.set_phase(&mut sh, HandoffState::LoggingIn);
        Ok(rx)
    }

    fn rollback(&self, prev: &str) {
        match self.vault.restore(&self.auth, prev) {
            Ok(()) => tracing::info!(
                target: "acctswap.handoff",
                tool = %self.cfg.tool,
                profile = prev,
                "rolled back to previous profile"
            ),
            Err(e) => tracing::warn!(
                target: "acctswap.handoff",
                tool = %self.cfg.tool,
                profile = prev,
                error = %e,
                "rollback failed"
            ),
        }
    }

    fn save_record(&self, a: &Attempt, outcome: Outcome, reason: Option<String>) {
        let rec = SessionRecord {
            from: a.from.clone(),
            to: a.to.clone(),
            outcome,
            reason,
            at: Utc::now(),
        };
        if let Err(e) = session::write_last(&self.vault, &self.cfg.tool, &rec) {
            tracing::warn!(target: "acctswap.handoff", error = %e, "saving handoff record failed");
        }
    }
}

/// Re-arm detection for the next cycle.
fn finish_cycle(sh: &mut Shared) {
    sh.detector.reset();
    sh.dispatched = false;
    sh.completion = None;
    sh.login_buf.clear();
}

fn trim_front(buf: &mut String, cap: usize) {
    if buf.len() <= cap {
        return;
    }
    let mut cut = buf.len() - cap;
    while !buf.is_char_boundary(cut) {
        cut += 1;
    }
    buf.drain(..cut);
}

/// Resolves once cancellation is requested; never if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
