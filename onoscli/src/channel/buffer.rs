//! Pattern buffer for accumulating shell output.
//!
//! Output is kept raw (escape codes included) until a pattern matches.
//! Everything up to the end of the match is then handed out and removed,
//! so the next wait starts exactly after the previous prompt.

use regex::bytes::Regex;

/// Where the earliest of several patterns matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    /// Index of the pattern in the list that was searched.
    pub index: usize,

    /// Byte offset where the match starts.
    pub start: usize,

    /// Byte offset one past the end of the match.
    pub end: usize,
}

/// Buffer for accumulating output and searching it for prompts.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated output buffer.
    buffer: Vec<u8>,
}

impl PatternBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Append newly read data.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Find the earliest match among `patterns`.
    ///
    /// When two patterns match at the same offset the one listed first wins.
    pub fn first_match(&self, patterns: &[&Regex]) -> Option<Found> {
        let mut best: Option<Found> = None;
        for (index, pattern) in patterns.iter().enumerate() {
            if let Some(m) = pattern.find(&self.buffer) {
                let earlier = match best {
                    Some(found) => m.start() < found.start,
                    None => true,
                };
                if earlier {
                    best = Some(Found {
                        index,
                        start: m.start(),
                        end: m.end(),
                    });
                }
            }
        }
        best
    }

    /// Remove everything through the end of `found`.
    ///
    /// Returns the text before the match and the matched text.
    pub fn consume(&mut self, found: Found) -> (Vec<u8>, Vec<u8>) {
        let mut head: Vec<u8> = self.buffer.drain(..found.end).collect();
        let matched = head.split_off(found.start);
        (head, matched)
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new()
    }
}
