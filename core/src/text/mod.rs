//! Small helpers for working with raw terminal output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // CSI sequences, OSC sequences (BEL or ST terminated) and lone two-byte escapes.
    static ref ANSI_RE: Regex =
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
            .expect("static ansi regex");
}

/// Remove terminal escape sequences so text matchers see what the user sees.
pub fn strip_ansi(s: &str) -> String {
    if !s.contains('\x1b') {
        return s.to_string();
    }
    ANSI_RE.replace_all(s, "").into_owned()
}

/// Truncate to at most `max` chars, appending an ellipsis when shortened.
pub fn preview(s: &str, max: usize) -> String {
    let t = s.trim();
    if t.chars().count() <= max {
        return t.to_string();
    }
    let mut out: String = t.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_and_cursor_codes() {
        let raw = "\x1b[31mRate\x1b[0m limit \x1b[2K\x1b[1Greached";
        assert_eq!(strip_ansi(raw), "Rate limit reached");
    }

    #[test]
    fn strips_osc_title() {
        assert_eq!(strip_ansi("\x1b]0;claude\x07hello"), "hello");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo world", 5), "héll…");
        assert_eq!(preview("  short  ", 10), "short");
    }
}
