//! Newline framing of raw pipe chunks

use serde::{Deserialize, Serialize};

/// What happens to output that never received a trailing newline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingLine {
    /// Discard it: neither logged nor captured
    #[default]
    Drop,
    /// Emit it as a final record once the child has exited
    Flush,
}

/// Bytes read from one pipe that are not yet terminated by a newline.
///
/// The pending buffer never contains `\n`: every push splits off and returns
/// all complete lines. Only the new chunk is searched for a newline, so a long
/// unterminated line costs time linear in its length.
///
/// Lines are decoded with [`String::from_utf8_lossy`]; invalid UTF-8 becomes
/// U+FFFD.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without newlines
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let start = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let Some(last) = chunk.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let last = start + last;
        let rest = self.pending.split_off(last + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last]
            .split(|&b| b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Bytes still waiting for a newline
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Returns true if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the unterminated residue, if any
    pub fn take_residue(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let residue = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&residue).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push(b"hel").is_empty());
        assert_eq!(buffer.push(b"lo\nwor"), vec!["hello"]);
        assert_eq!(buffer.pending(), b"wor");
        assert_eq!(buffer.push(b"ld\n\nlast\n"), vec!["world", "", "last"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_pending_never_holds_newline() {
        let mut buffer = LineBuffer::new();
        for chunk in [&b"a\nb"[..], b"\nc\nd", b"e", b"\n\n"] {
            buffer.push(chunk);
            assert!(!buffer.pending().contains(&b'\n'));
        }
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let mut buffer = LineBuffer::new();
        let text = "grüße\n".as_bytes();

        assert!(buffer.push(&text[..3]).is_empty());
        assert_eq!(buffer.push(&text[3..]), vec!["grüße"]);
    }

    #[test]
    fn test_carriage_return_is_kept() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"dos\r\n"), vec!["dos\r"]);
    }

    #[test]
    fn test_long_unterminated_line_stays_linear() {
        let mut buffer = LineBuffer::new();
        let chunk = vec![b'x'; 1024];
        let started = std::time::Instant::now();

        // 16 MiB without a newline; rescanning the whole buffer per chunk
        // would take minutes.
        for _ in 0..16 * 1024 {
            assert!(buffer.push(&chunk).is_empty());
        }
        let lines = buffer.push(b"\n");

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 16 * 1024 * 1024);
        assert!(buffer.is_empty());
        assert!(
            started.elapsed() < std::time::Duration::from_secs(20),
            "pushing took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"ok \xff\n"), vec!["ok \u{FFFD}"]);
    }

    #[test]
    fn test_take_residue() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"done\npartial");

        assert_eq!(buffer.take_residue().as_deref(), Some("partial"));
        assert_eq!(buffer.take_residue(), None);
    }
}
