const COMMON: &[&str] = &[
    r"(?i)rate[ _-]?limit",
    r"(?i)too many requests",
    r"\b429\b",
    r"(?i)quota exceeded",
];

const CLAUDE: &[&str] = &[r"(?i)usage limit", r"(?i)limit (will )?resets?"];

const CODEX: &[&str] = &[r"(?i)you'?ve hit your usage limit"];

// A bare "quota" also shows up in usage summaries and help text.
const GEMINI: &[&str] = &[
    r"(?i)resource[ _-]?exhausted",
    r"(?i)\bquota (has been |was )?(exhausted|reached|used up)",
    r"(?i)exceeded (your |the )?(current |daily )?quota",
];

/// Built-in patterns for `tool`; unknown tools get the common set only.
pub fn default_patterns(tool: &str) -> Vec<String> {
    let specific: &[&str] = match tool {
        "claude" => CLAUDE,
        "codex" => CODEX,
        "gemini" => GEMINI,
        _ => &[],
    };
    COMMON
        .iter()
        .chain(specific.iter())
        .map(|s| s.to_string())
        .collect()
}
