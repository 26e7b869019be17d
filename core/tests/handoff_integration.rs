//! End-to-end handoff scenarios against a scripted pseudo-terminal.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use acctswap_core::api::{
    Algorithm, AuthFileSet, AuthFileSpec, CooldownStore, HandoffConfig, HandoffController,
    HandoffDeps, HandoffState, LoginHandler, MemoryStore, Notifier, NotifyAction, NotifyLevel,
    Outcome, PtyController, PtyError, RateLimitDetector, RotationSelector, Vault,
};
use acctswap_core::handoff::read_last;
use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio::sync::watch;

/// Child that replays queued output and reacts to an injected login command.
struct ScriptedPty {
    queue: Mutex<VecDeque<String>>,
    /// Output for the n-th login; the last script repeats.
    on_login: Vec<Vec<String>>,
    logins: Mutex<usize>,
    /// Chunks released once their instant has passed.
    timed: Mutex<Vec<(Instant, String)>>,
    /// Hang up once the queue drains after login was injected.
    hangup_after_login: bool,
    /// Hang up at this instant regardless of the queue.
    deadline: Option<Instant>,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedPty {
    fn new(initial: &[&str], on_login: &[&str]) -> Self {
        Self {
            queue: Mutex::new(initial.iter().map(|s| s.to_string()).collect()),
            on_login: vec![on_login.iter().map(|s| s.to_string()).collect()],
            logins: Mutex::new(0),
            timed: Mutex::new(Vec::new()),
            hangup_after_login: true,
            deadline: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Output for the following login attempt.
    fn then_login(mut self, chunks: &[&str]) -> Self {
        self.on_login
            .push(chunks.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Emit `chunk` once `after` has elapsed.
    fn emit_after(self, after: Duration, chunk: &str) -> Self {
        self.timed
            .lock()
            .unwrap()
            .push((Instant::now() + after, chunk.to_string()));
        self
    }

    fn hang_up_at(mut self, after: Duration) -> Self {
        self.hangup_after_login = false;
        self.deadline = Some(Instant::now() + after);
        self
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl PtyController for ScriptedPty {
    async fn start(&self) -> Result<(), PtyError> {
        Ok(())
    }

    async fn read_output(&self) -> Result<String, PtyError> {
        {
            let now = Instant::now();
            let mut timed = self.timed.lock().unwrap();
            if let Some(i) = timed.iter().position(|(at, _)| *at <= now) {
                let (_, chunk) = timed.remove(i);
                self.queue.lock().unwrap().push_back(chunk);
            }
        }
        if let Some(chunk) = self.queue.lock().unwrap().pop_front() {
            return Ok(chunk);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(PtyError::Closed);
        }
        if self.hangup_after_login && *self.logins.lock().unwrap() > 0 {
            return Err(PtyError::Closed);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(String::new())
    }

    async fn write_input(&self, data: &[u8]) -> Result<(), PtyError> {
        let text = String::from_utf8_lossy(data).into_owned();
        self.inputs.lock().unwrap().push(text.clone());
        if text.starts_with("/login") {
            let mut n = self.logins.lock().unwrap();
            let script = &self.on_login[(*n).min(self.on_login.len() - 1)];
            self.queue.lock().unwrap().extend(script.iter().cloned());
            *n += 1;
        }
        Ok(())
    }

    async fn wait(&self) -> Result<i32, PtyError> {
        Ok(0)
    }

    async fn close(&self) -> Result<(), PtyError> {
        Ok(())
    }
}

struct TestLogin;

#[async_trait]
impl LoginHandler for TestLogin {
    fn tool(&self) -> &str {
        "codex"
    }

    async fn trigger_login(&self, pty: &dyn PtyController) -> Result<(), PtyError> {
        pty.write_input(b"/login\r").await
    }

    fn is_login_complete(&self, output: &str) -> bool {
        output.contains("Successfully logged in")
    }

    fn is_login_failed(&self, output: &str) -> Option<String> {
        output
            .contains("Login failed")
            .then(|| "provider rejected the login".to_string())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<(NotifyLevel, String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        level: NotifyLevel,
        title: &str,
        message: &str,
        _action: Option<&NotifyAction>,
    ) -> anyhow::Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((level, title.to_string(), message.to_string()));
        Ok(())
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    vault: Vault,
    set: AuthFileSet,
    live: PathBuf,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
}

/// One saved profile per name, each holding `"<name>-token"`, with `work` live.
fn fixture(profiles: &[&str]) -> Fixture {
    fixture_live(profiles, "work")
}

fn fixture_live(profiles: &[&str], live_profile: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("home").join(".codex").join("auth.json");
    fs::create_dir_all(live.parent().unwrap()).unwrap();
    let set = AuthFileSet::new(
        "codex",
        vec![AuthFileSpec::new("codex", &live, "Codex auth", true)],
    );
    let vault = Vault::new(dir.path().join("vault"));
    for p in profiles {
        fs::write(&live, format!("{p}-token")).unwrap();
        vault.backup(&set, p).unwrap();
    }
    fs::write(&live, format!("{live_profile}-token")).unwrap();
    Fixture {
        _dir: dir,
        vault,
        set,
        live,
        store: Arc::new(MemoryStore::new()),
        notifier: Arc::new(RecordingNotifier::default()),
    }
}

fn controller(f: &Fixture, pty: Arc<ScriptedPty>, cfg: HandoffConfig) -> HandoffController {
    controller_with(f, pty, cfg, Algorithm::Smart)
}

fn controller_with(
    f: &Fixture,
    pty: Arc<ScriptedPty>,
    cfg: HandoffConfig,
    algorithm: Algorithm,
) -> HandoffController {
    HandoffController::new(
        cfg,
        HandoffDeps {
            vault: f.vault.clone(),
            auth: f.set.clone(),
            pty,
            login: Arc::new(TestLogin),
            notifier: f.notifier.clone(),
            selector: RotationSelector::new(algorithm, f.store.clone())
                .with_health(f.store.clone()),
            detector: RateLimitDetector::for_tool("codex"),
            cooldowns: Some(f.store.clone()),
            health: Some(f.store.clone()),
        },
    )
}

fn quick_config() -> HandoffConfig {
    let mut cfg = HandoffConfig::new("codex");
    cfg.poll_interval = Duration::from_millis(5);
    cfg
}

async fn run(ctl: &HandoffController) -> (i32, String) {
    let (_tx, rx) = watch::channel(false);
    let mut out: Vec<u8> = Vec::new();
    let code = tokio::time::timeout(Duration::from_secs(10), ctl.run(&mut out, rx))
        .await
        .expect("session did not finish")
        .unwrap();
    (code, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn rate_limit_hands_off_to_backup_profile() {
    let f = fixture(&["personal", "work"]);
    let pty = Arc::new(ScriptedPty::new(
        &["Working on it...\n", "Error: rate li", "mit exceeded\n"],
        &["Successfully logged in\n", "back to work\n"],
    ));
    let ctl = controller(&f, pty.clone(), quick_config());

    let (code, out) = run(&ctl).await;

    assert_eq!(code, 0);
    assert_eq!(
        ctl.transitions(),
        vec![
            HandoffState::Running,
            HandoffState::RateLimited,
            HandoffState::SelectingBackup,
            HandoffState::SwappingAuth,
            HandoffState::LoggingIn,
            HandoffState::LoginComplete,
            HandoffState::Running,
        ]
    );
    assert_eq!(ctl.state(), HandoffState::Running);
    assert_eq!(ctl.current_profile().as_deref(), Some("personal"));
    assert_eq!(ctl.handoff_count(), 1);
    assert_eq!(fs::read(&f.live).unwrap(), b"personal-token");
    assert_eq!(pty.inputs(), vec!["/login\r".to_string()]);
    assert!(out.contains("Working on it...") && out.contains("back to work"));

    let now = Utc::now();
    let cd = f.store.active_cooldown("codex", "work", now).unwrap().unwrap();
    assert!(cd.remaining(now) > chrono::Duration::minutes(59));
    assert!(ctl
        .cooldown_pool()
        .active_cooldown("codex", "work", now)
        .unwrap()
        .is_some());

    let rec = read_last(&f.vault, "codex").unwrap().unwrap();
    assert_eq!(rec.outcome, Outcome::Success);
    assert_eq!(rec.from.as_deref(), Some("work"));
    assert_eq!(rec.to.as_deref(), Some("personal"));

    let seen = f.notifier.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].2.contains("Error: rate limit exceeded"), "{}", seen[0].2);
    assert_eq!(seen[1].0, NotifyLevel::Info);
}

#[tokio::test]
async fn login_timeout_rolls_back_to_previous_profile() {
    let f = fixture(&["personal", "work"]);
    let pty = Arc::new(
        ScriptedPty::new(&["429 Too Many Requests\n"], &["Opening browser...\n"])
            .hang_up_at(Duration::from_millis(600)),
    );
    let mut cfg = quick_config();
    cfg.login_timeout = Some(Duration::from_millis(150));
    let ctl = controller(&f, pty.clone(), cfg);

    let (code, _) = run(&ctl).await;

    assert_eq!(code, 0);
    let states = ctl.transitions();
    assert!(states.contains(&HandoffState::LoggingIn));
    assert!(!states.contains(&HandoffState::LoginComplete));
    assert_eq!(states[states.len() - 2], HandoffState::HandoffFailed);
    assert_eq!(ctl.state(), HandoffState::Running);
    assert_eq!(ctl.current_profile().as_deref(), Some("work"));
    assert_eq!(ctl.handoff_count(), 0);
    assert_eq!(fs::read(&f.live).unwrap(), b"work-token");

    let rec = read_last(&f.vault, "codex").unwrap().unwrap();
    assert_eq!(rec.outcome, Outcome::Failed);
    assert!(rec.reason.unwrap().contains("did not complete"));

    let seen = f.notifier.seen.lock().unwrap();
    let (level, _, msg) = seen.last().unwrap();
    assert_eq!(*level, NotifyLevel::Warning);
    assert!(msg.contains("acctswap activate codex"), "{msg}");
}

#[tokio::test]
async fn login_failure_marker_rolls_back() {
    let f = fixture(&["personal", "work"]);
    let pty = Arc::new(ScriptedPty::new(
        &["rate limit exceeded\n"],
        &["Login ", "failed: invalid grant\n"],
    ));
    let ctl = controller(&f, pty, quick_config());

    run(&ctl).await;

    assert!(ctl.transitions().contains(&HandoffState::HandoffFailed));
    assert_eq!(ctl.current_profile().as_deref(), Some("work"));
    assert_eq!(fs::read(&f.live).unwrap(), b"work-token");
    let rec = read_last(&f.vault, "codex").unwrap().unwrap();
    assert_eq!(
        rec.reason.as_deref(),
        Some("login failed: provider rejected the login")
    );
}

#[tokio::test]
async fn no_other_profile_fails_without_swapping() {
    let f = fixture(&["work", "_original"]);
    let pty = Arc::new(
        ScriptedPty::new(&["rate limit exceeded\n"], &[]).hang_up_at(Duration::from_millis(200)),
    );
    let ctl = controller(&f, pty.clone(), quick_config());

    run(&ctl).await;

    let states = ctl.transitions();
    assert!(!states.contains(&HandoffState::SwappingAuth));
    assert!(states.contains(&HandoffState::HandoffFailed));
    assert_eq!(ctl.state(), HandoffState::Running);
    assert_eq!(fs::read(&f.live).unwrap(), b"work-token");
    assert!(pty.inputs().is_empty());
}

#[tokio::test]
async fn disabled_handoff_only_notifies_once() {
    let f = fixture(&["personal", "work"]);
    let pty = Arc::new(
        ScriptedPty::new(&["rate limit exceeded\n", "rate limit exceeded again\n"], &[])
            .hang_up_at(Duration::from_millis(100)),
    );
    let mut cfg = quick_config();
    cfg.enabled = false;
    let ctl = controller(&f, pty.clone(), cfg);

    run(&ctl).await;

    assert_eq!(
        ctl.transitions(),
        vec![HandoffState::Running, HandoffState::ManualMode]
    );
    assert_eq!(f.notifier.seen.lock().unwrap().len(), 1);
    assert!(pty.inputs().is_empty());
    assert_eq!(fs::read(&f.live).unwrap(), b"work-token");
    assert!(f
        .store
        .active_cooldown("codex", "work", Utc::now())
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn cancellation_during_login_rolls_back() {
    let f = fixture(&["personal", "work"]);
    let pty = Arc::new(
        ScriptedPty::new(&["rate limit exceeded\n"], &[]).hang_up_at(Duration::from_secs(5)),
    );
    let ctl = controller(&f, pty, quick_config());

    let (tx, rx) = watch::channel(false);
    let mut out: Vec<u8> = Vec::new();
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
    };
    let (res, _) = tokio::join!(ctl.run(&mut out, rx), cancel);

    assert_eq!(res.unwrap(), 0);
    let rec = read_last(&f.vault, "codex").unwrap().unwrap();
    assert_eq!(rec.reason.as_deref(), Some("handoff cancelled"));
    assert_eq!(fs::read(&f.live).unwrap(), b"work-token");
    assert_eq!(ctl.current_profile().as_deref(), Some("work"));
}

#[tokio::test]
async fn round_robin_hands_off_to_the_next_name() {
    let f = fixture_live(&["a", "b", "c"], "b");
    let pty = Arc::new(ScriptedPty::new(
        &["rate limit exceeded\n"],
        &["Successfully logged in\n"],
    ));
    let ctl = controller_with(&f, pty, quick_config(), Algorithm::RoundRobin);

    run(&ctl).await;

    assert_eq!(ctl.current_profile().as_deref(), Some("c"));
    assert_eq!(fs::read(&f.live).unwrap(), b"c-token");
}

#[tokio::test]
async fn stored_cooldown_disqualifies_the_only_backup() {
    let f = fixture(&["personal", "work"]);
    f.store
        .set_cooldown(
            "codex",
            "personal",
            Utc::now(),
            chrono::Duration::minutes(45),
            "earlier limit",
        )
        .unwrap();
    let pty = Arc::new(
        ScriptedPty::new(&["rate limit exceeded\n"], &["Successfully logged in\n"])
            .hang_up_at(Duration::from_millis(300)),
    );
    let ctl = controller(&f, pty.clone(), quick_config());

    run(&ctl).await;

    let states = ctl.transitions();
    assert!(states.contains(&HandoffState::HandoffFailed));
    assert!(!states.contains(&HandoffState::SwappingAuth));
    assert_eq!(ctl.current_profile().as_deref(), Some("work"));
    assert_eq!(fs::read(&f.live).unwrap(), b"work-token");
    assert!(pty.inputs().is_empty());
}

#[tokio::test]
async fn second_limit_triggers_a_second_handoff() {
    let f = fixture(&["personal", "spare", "work"]);
    let pty = Arc::new(
        ScriptedPty::new(&["rate limit exceeded\n"], &["Successfully logged in\n"])
            .emit_after(Duration::from_millis(400), "Error: 429 Too Many Requests\n")
            .hang_up_at(Duration::from_millis(1200)),
    );
    let ctl = controller_with(&f, pty.clone(), quick_config(), Algorithm::RoundRobin);

    run(&ctl).await;

    assert_eq!(ctl.handoff_count(), 2);
    assert_eq!(ctl.current_profile().as_deref(), Some("spare"));
    assert_eq!(fs::read(&f.live).unwrap(), b"spare-token");
    assert_eq!(pty.inputs().len(), 2);
    let completes = ctl
        .transitions()
        .iter()
        .filter(|s| **s == HandoffState::LoginComplete)
        .count();
    assert_eq!(completes, 2);
    let now = Utc::now();
    for p in ["work", "personal"] {
        assert!(f.store.active_cooldown("codex", p, now).unwrap().is_some(), "{p}");
    }
}

#[tokio::test]
async fn detection_rearms_after_a_failed_attempt() {
    let f = fixture(&["personal", "spare", "work"]);
    let pty = Arc::new(
        ScriptedPty::new(&["rate limit exceeded\n"], &["Login failed: denied\n"])
            .then_login(&["Successfully logged in\n"])
            .emit_after(Duration::from_millis(400), "rate limit exceeded\n")
            .hang_up_at(Duration::from_millis(1200)),
    );
    let ctl = controller_with(&f, pty.clone(), quick_config(), Algorithm::RoundRobin);

    run(&ctl).await;

    let states = ctl.transitions();
    let failed_at = states
        .iter()
        .position(|s| *s == HandoffState::HandoffFailed)
        .unwrap();
    let complete_at = states
        .iter()
        .position(|s| *s == HandoffState::LoginComplete)
        .unwrap();
    assert!(failed_at < complete_at, "{states:?}");
    assert_eq!(ctl.handoff_count(), 1);
    assert_eq!(pty.inputs().len(), 2);
    // A failed login does not cool the rejected profile, so the walk lands on it again.
    assert_eq!(ctl.current_profile().as_deref(), Some("personal"));
    assert_eq!(fs::read(&f.live).unwrap(), b"personal-token");
}

#[tokio::test]
async fn limits_seen_mid_handoff_do_not_dispatch_again() {
    let f = fixture(&["personal", "work"]);
    let pty = Arc::new(ScriptedPty::new(
        &["rate limit exceeded\n", "429 Too Many Requests\n"],
        &["usage limit: rate limit exceeded\n", "Successfully logged in\n"],
    ));
    let ctl = controller(&f, pty.clone(), quick_config());

    run(&ctl).await;

    assert_eq!(ctl.handoff_count(), 1);
    assert_eq!(pty.inputs(), vec!["/login\r".to_string()]);
    assert_eq!(
        ctl.transitions(),
        vec![
            HandoffState::Running,
            HandoffState::RateLimited,
            HandoffState::SelectingBackup,
            HandoffState::SwappingAuth,
            HandoffState::LoggingIn,
            HandoffState::LoginComplete,
            HandoffState::Running,
        ]
    );
}
