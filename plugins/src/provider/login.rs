use async_trait::async_trait;
use acctswap_core::api::{LoginHandler, PtyController, PtyError, Tool};
use acctswap_core::text::strip_ansi;
use lazy_static::lazy_static;
use regex::Regex;

struct Markers {
    command: &'static [u8],
    complete: Vec<Regex>,
    failed: Vec<Regex>,
}

impl Markers {
    fn new(command: &'static [u8], complete: &[&str], failed: &[&str]) -> Self {
        let compile = |ps: &[&str]| -> Vec<Regex> {
            ps.iter()
                .map(|p| Regex::new(&format!("(?i){p}")).expect("static login marker"))
                .collect()
        };
        Self {
            command,
            complete: compile(complete),
            failed: compile(failed),
        }
    }
}

lazy_static! {
    static ref CLAUDE: Markers = Markers::new(
        b"/login\r",
        &[r"\blogin successful\b", r"\blogged in as\b"],
        &[r"\blogin failed\b", r"\bauthentication failed\b", r"\boauth error\b"],
    );
    static ref CODEX: Markers = Markers::new(
        b"/login\r",
        &[r"\bsuccessfully logged in\b", r"\blogged in\b"],
        &[r"\blogin failed\b", r"\berror logging in\b"],
    );
    // Word boundaries keep "unauthenticated" from reading as "authenticated".
    static ref GEMINI: Markers = Markers::new(
        b"/auth\r",
        &[r"\bauthenticated\b", r"\blogged in\b"],
        &[r"\bauthentication failed\b", r"\bfailed to log ?in\b"],
    );
    /// Status lines that contain a success phrase but report the opposite.
    static ref NEGATED: Regex = Regex::new(
        r"(?i)\b(not|never|no longer)\s+(yet\s+)?(logged|signed)\s+in\b|\bnot\s+(yet\s+)?authenticated\b"
    )
    .expect("static login marker");
}

/// Login driver for each supported tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderLogin {
    Claude,
    Codex,
    Gemini,
}

impl ProviderLogin {
    pub fn for_tool(tool: Tool) -> Self {
        match tool {
            Tool::Claude => ProviderLogin::Claude,
            Tool::Codex => ProviderLogin::Codex,
            Tool::Gemini => ProviderLogin::Gemini,
        }
    }

    fn markers(self) -> &'static Markers {
        match self {
            ProviderLogin::Claude => &*CLAUDE,
            ProviderLogin::Codex => &*CODEX,
            ProviderLogin::Gemini => &*GEMINI,
        }
    }
}

#[async_trait]
impl LoginHandler for ProviderLogin {
    fn tool(&self) -> &str {
        match self {
            ProviderLogin::Claude => "claude",
            ProviderLogin::Codex => "codex",
            ProviderLogin::Gemini => "gemini",
        }
    }

    async fn trigger_login(&self, pty: &dyn PtyController) -> Result<(), PtyError> {
        tracing::debug!(target: "acctswap.login", tool = self.tool(), "injecting login command");
        pty.write_input(self.markers().command).await
    }

    fn is_login_complete(&self, output: &str) -> bool {
        if self.is_login_failed(output).is_some() {
            return false;
        }
        let clean = strip_ansi(output);
        let markers = self.markers();
        clean.lines().any(|line| {
            !NEGATED.is_match(line) && markers.complete.iter().any(|m| m.is_match(line))
        })
    }

    fn is_login_failed(&self, output: &str) -> Option<String> {
        let clean = strip_ansi(output);
        let markers = self.markers();
        clean.lines().find_map(|line| {
            markers
                .failed
                .iter()
                .any(|m| m.is_match(line))
                .then(|| line.trim().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<u8>>);

    #[async_trait]
    impl PtyController for Capture {
        async fn start(&self) -> Result<(), PtyError> {
            Ok(())
        }
        async fn read_output(&self) -> Result<String, PtyError> {
            Ok(String::new())
        }
        async fn write_input(&self, data: &[u8]) -> Result<(), PtyError> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(())
        }
        async fn wait(&self) -> Result<i32, PtyError> {
            Ok(0)
        }
        async fn close(&self) -> Result<(), PtyError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn injects_provider_command() {
        let pty = Capture::default();
        ProviderLogin::Gemini.trigger_login(&pty).await.unwrap();
        ProviderLogin::Claude.trigger_login(&pty).await.unwrap();
        assert_eq!(pty.0.lock().unwrap().as_slice(), b"/auth\r/login\r");
    }

    #[test]
    fn completion_sees_through_ansi() {
        let h = ProviderLogin::Claude;
        assert!(h.is_login_complete("\x1b[32mLogin\x1b[0m successful. Press Enter"));
        assert!(!h.is_login_complete("Opening browser to sign in..."));
    }

    #[test]
    fn failure_reports_the_offending_line() {
        let h = ProviderLogin::Gemini;
        let out = "Waiting for auth...\r\n\x1b[31mAuthentication failed: token expired\x1b[0m\r\n";
        assert_eq!(
            h.is_login_failed(out).as_deref(),
            Some("Authentication failed: token expired")
        );
        assert!(!h.is_login_complete(out));
        assert!(h.is_login_complete("Authenticated via Google"));
    }

    #[test]
    fn codex_markers() {
        let h = ProviderLogin::for_tool(Tool::Codex);
        assert_eq!(h.tool(), "codex");
        assert!(h.is_login_complete("Successfully logged in"));
        assert_eq!(
            h.is_login_failed("Error logging in: denied").as_deref(),
            Some("Error logging in: denied")
        );
    }

    #[test]
    fn negative_status_lines_are_not_success() {
        let codex = ProviderLogin::Codex;
        assert!(!codex.is_login_complete("Not logged in. Run /login to continue."));
        assert!(!codex.is_login_complete("You are not yet signed in\r\nnot logged in"));
        assert!(codex.is_login_complete("Not logged in\r\nSuccessfully logged in as dev"));

        let gemini = ProviderLogin::Gemini;
        assert!(!gemini.is_login_complete("Error: unauthenticated request"));
        assert!(!gemini.is_login_complete("Session is not authenticated"));
        assert!(gemini.is_login_complete("\x1b[1mAuthenticated\x1b[0m with Google"));

        let claude = ProviderLogin::Claude;
        assert!(!claude.is_login_complete("Never logged in as this user"));
        assert!(claude.is_login_complete("Logged in as dev@example.com"));
    }
}
