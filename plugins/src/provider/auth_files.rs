use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use acctswap_core::api::{AuthFileSet, AuthFileSpec, Tool};

/// Live auth files for `tool`, rooted at the current user's home.
pub fn auth_file_set(tool: Tool) -> Result<AuthFileSet> {
    let home = dirs::home_dir().context("cannot determine home directory")?;
    let codex_home = std::env::var_os("CODEX_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    Ok(auth_file_set_in(tool, &home, codex_home.as_deref()))
}

/// Same as [`auth_file_set`] with explicit roots.
pub fn auth_file_set_in(tool: Tool, home: &Path, codex_home: Option<&Path>) -> AuthFileSet {
    let id = tool.as_str();
    let spec = |path: PathBuf, description: &str, required: bool| {
        AuthFileSpec::new(id, path, description, required)
    };
    let files = match tool {
        Tool::Claude => vec![
            spec(
                home.join(".claude").join(".credentials.json"),
                "Claude OAuth credentials",
                true,
            ),
            spec(home.join(".claude.json"), "Claude account state", false),
            spec(
                home.join(".config").join("claude-code").join("auth.json"),
                "Claude Code auth (XDG location)",
                false,
            ),
        ],
        Tool::Codex => {
            let root = codex_home
                .map(Path::to_path_buf)
                .unwrap_or_else(|| home.join(".codex"));
            vec![spec(root.join("auth.json"), "Codex auth tokens", true)]
        }
        Tool::Gemini => vec![
            spec(
                home.join(".gemini").join("oauth_creds.json"),
                "Gemini OAuth credentials",
                true,
            ),
            spec(
                home.join(".gemini").join("settings.json"),
                "Gemini CLI settings",
                false,
            ),
        ],
    };
    AuthFileSet::new(id, files)
}
