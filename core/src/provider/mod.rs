//! What counts as "auth" for each supported CLI.
//!
//! The concrete file locations are owned by the plugins crate; core only
//! knows the shape of an auth-file set and the closed set of tool ids.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The coding-assistant CLIs acctswap knows how to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Claude,
    Codex,
    Gemini,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Claude, Tool::Codex, Tool::Gemini];

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Claude => "claude",
            Tool::Codex => "codex",
            Tool::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl fmt::Display for UnknownTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown tool {:?} (expected one of: claude, codex, gemini)",
            self.0
        )
    }
}

impl std::error::Error for UnknownTool {}

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "claude-code" => Ok(Tool::Claude),
            "codex" => Ok(Tool::Codex),
            "gemini" => Ok(Tool::Gemini),
            _ => Err(UnknownTool(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFileSpec {
    pub tool: String,
    /// Absolute path of the live auth file.
    pub path: PathBuf,
    pub description: String,
    pub required: bool,
}

impl AuthFileSpec {
    pub fn new(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            tool: tool.into(),
            path: path.into(),
            description: description.into(),
            required,
        }
    }

    /// Name the file is stored under inside a profile directory.
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFileSet {
    pub tool: String,
    pub files: Vec<AuthFileSpec>,
}

impl AuthFileSet {
    pub fn new(tool: impl Into<String>, files: Vec<AuthFileSpec>) -> Self {
        Self {
            tool: tool.into(),
            files,
        }
    }

    /// Specs whose live file currently exists on disk.
    pub fn present(&self) -> impl Iterator<Item = &AuthFileSpec> {
        self.files.iter().filter(|f| f.path.is_file())
    }

    /// True when at least one required file exists (or, for a set with no
    /// required files, when anything exists at all).
    pub fn any_required_present(&self) -> bool {
        if !self.files.iter().any(|f| f.required) {
            return self.present().next().is_some();
        }
        self.present().any(|f| f.required)
    }
}
