/// Hard cap on a buffered partial line before it is flushed as-is.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Reassembles chunked output into complete lines.
///
/// Bytes are held until a `\n` arrives; the emitted line has its trailing
/// `\r` removed. A partial line that grows past the cap is emitted anyway
/// so memory stays bounded.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    cap: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_cap(MAX_LINE_BYTES)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap: cap.max(1),
        }
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in chunk {
            if b == b'\n' {
                lines.push(self.take_line());
                continue;
            }
            self.buf.push(b);
            if self.buf.len() >= self.cap {
                lines.push(self.take_line());
            }
        }
        lines
    }

    /// Emit whatever partial line is buffered.
    pub fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn take_line(&mut self) -> String {
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_split_writes() {
        let mut lb = LineBuffer::new();
        assert!(lb.push(b"Error: rate li").is_empty());
        assert_eq!(lb.push(b"mit exceeded\r\nnext"), vec!["Error: rate limit exceeded"]);
        assert_eq!(lb.pending(), 4);
        assert_eq!(lb.flush().as_deref(), Some("next"));
        assert_eq!(lb.flush(), None);
    }

    #[test]
    fn caps_runaway_lines() {
        let mut lb = LineBuffer::with_cap(8);
        let lines = lb.push(b"0123456789abcdef01");
        assert_eq!(lines, vec!["01234567", "89abcdef"]);
        assert_eq!(lb.pending(), 2);
    }

    #[test]
    fn utf8_split_across_chunks_is_reassembled() {
        let mut lb = LineBuffer::new();
        let s = "ünïcode\n".as_bytes();
        assert!(lb.push(&s[..2]).is_empty());
        assert_eq!(lb.push(&s[2..]), vec!["ünïcode"]);
    }
}
