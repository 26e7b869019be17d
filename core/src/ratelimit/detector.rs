use regex::Regex;

use super::line_buffer::LineBuffer;
use super::patterns::default_patterns;
use crate::text::strip_ansi;

/// Line matcher that latches on the first rate-limit hit until [`reset`].
///
/// [`reset`]: RateLimitDetector::reset
#[derive(Debug, Clone)]
pub struct RateLimitDetector {
    patterns: Vec<Regex>,
    detected: bool,
    matched: Option<String>,
}

impl RateLimitDetector {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self {
            patterns,
            detected: false,
            matched: None,
        }
    }

    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(compiled))
    }

    /// Detector with the built-in patterns for `tool`.
    pub fn for_tool(tool: &str) -> Self {
        let compiled = default_patterns(tool)
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self::new(compiled)
    }

    /// Test one complete logical line.
    pub fn check(&mut self, line: &str) -> bool {
        if self.detected {
            return true;
        }
        let clean = strip_ansi(line);
        if self.patterns.iter().any(|re| re.is_match(&clean)) {
            self.detected = true;
            self.matched = Some(clean);
        }
        self.detected
    }

    pub fn detected(&self) -> bool {
        self.detected
    }

    /// The line that tripped the detector, ANSI-stripped.
    pub fn matched_line(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    pub fn reset(&mut self) {
        self.detected = false;
        self.matched = None;
    }
}

/// [`RateLimitDetector`] fed by a [`LineBuffer`], for raw chunked output.
#[derive(Debug)]
pub struct StreamDetector {
    lines: LineBuffer,
    detector: RateLimitDetector,
}

impl StreamDetector {
    pub fn new(detector: RateLimitDetector) -> Self {
        Self {
            lines: LineBuffer::new(),
            detector,
        }
    }

    /// Feed a raw chunk; true once any completed line has matched.
    pub fn feed(&mut self, chunk: &str) -> bool {
        for line in self.lines.push(chunk.as_bytes()) {
            if self.detector.check(&line) {
                break;
            }
        }
        self.detector.detected()
    }

    /// Check the buffered partial line too (e.g. at end of stream).
    pub fn flush(&mut self) -> bool {
        if let Some(line) = self.lines.flush() {
            self.detector.check(&line);
        }
        self.detector.detected()
    }

    pub fn detected(&self) -> bool {
        self.detector.detected()
    }

    pub fn matched_line(&self) -> Option<&str> {
        self.detector.matched_line()
    }

    /// Clear the latch and any buffered partial line.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.lines.clear();
    }
}
