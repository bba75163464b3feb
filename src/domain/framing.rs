//! Delimiter framing for inbound serial data.
//!
//! Bytes accumulate until the delimiter arrives or the buffer fills up,
//! whichever comes first. The delimiter is dropped from the emitted line.

use crate::domain::settings::BluetoothConfig;

#[derive(Debug, Clone)]
pub struct LineFramer {
    delimiter: Vec<u8>,
    capacity: usize,
    buffer: Vec<u8>,
    // Set by a capacity flush; a delimiter arriving right after it closes
    // the line that was already emitted.
    flushed_full: bool,
}

impl LineFramer {
    pub fn new(delimiter: char, capacity: usize) -> Self {
        let mut encoded = [0u8; 4];
        Self {
            delimiter: delimiter.encode_utf8(&mut encoded).as_bytes().to_vec(),
            capacity: capacity.max(1),
            buffer: Vec::with_capacity(capacity),
            flushed_full: false,
        }
    }

    pub fn from_config(config: &BluetoothConfig) -> Self {
        Self::new(config.line_delimiter, config.buffer_size.get())
    }

    /// Feed raw bytes, returning every line completed by them.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in data {
            self.buffer.push(byte);

            if self.buffer.ends_with(&self.delimiter) {
                let end = self.buffer.len() - self.delimiter.len();
                self.buffer.truncate(end);
                if end == 0 && self.flushed_full {
                    self.flushed_full = false;
                } else {
                    lines.push(self.take_line(end));
                }
                continue;
            }

            let content = self.buffer.len() - self.partial_delimiter_len();
            if content >= self.capacity {
                lines.push(self.take_line(content));
                self.flushed_full = true;
            } else if content > 0 {
                self.flushed_full = false;
            }
        }

        lines
    }

    /// Bytes received since the last emitted line.
    #[cfg(test)]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Length of the buffer tail that could still grow into the delimiter.
    fn partial_delimiter_len(&self) -> usize {
        (1..self.delimiter.len())
            .rev()
            .find(|&k| self.buffer.ends_with(&self.delimiter[..k]))
            .unwrap_or(0)
    }

    /// Emit the first `len` buffered bytes, keeping the rest.
    fn take_line(&mut self, len: usize) -> String {
        let line = String::from_utf8_lossy(&self.buffer[..len]).into_owned();
        self.buffer.drain(..len);
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_delimiter() {
        let mut framer = LineFramer::new('\n', 1024);
        assert_eq!(framer.push(b"hello\nwor"), vec!["hello".to_string()]);
        assert_eq!(framer.pending(), b"wor");
        assert_eq!(framer.push(b"ld\n\n"), vec!["world".to_string(), String::new()]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_flushes_when_buffer_full() {
        let mut framer = LineFramer::new('\n', 4);
        assert_eq!(
            framer.push(b"abcdefg\n"),
            vec!["abcd".to_string(), "efg".to_string()]
        );
    }

    #[test]
    fn test_multibyte_delimiter() {
        let mut framer = LineFramer::new('§', 64);
        assert_eq!(framer.push("a§b".as_bytes()), vec!["a".to_string()]);
        assert_eq!(framer.pending(), b"b");
    }

    #[test]
    fn test_full_line_followed_by_delimiter() {
        let mut framer = LineFramer::new('\n', 4);
        assert_eq!(framer.push(b"abcd\n"), vec!["abcd".to_string()]);
        assert!(framer.pending().is_empty());

        // Split across reads, then an empty line is still honoured.
        assert_eq!(framer.push(b"wxyz"), vec!["wxyz".to_string()]);
        assert!(framer.push(b"\n").is_empty());
        assert_eq!(framer.push(b"\n"), vec![String::new()]);
    }

    #[test]
    fn test_multibyte_delimiter_at_capacity() {
        let mut framer = LineFramer::new('§', 2);
        assert_eq!(
            framer.push("a§b§".as_bytes()),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(framer.pending().is_empty());

        let mut framer = LineFramer::new('§', 2);
        assert_eq!(framer.push("ab§c".as_bytes()), vec!["ab".to_string()]);
        assert_eq!(framer.pending(), b"c");
    }
}
