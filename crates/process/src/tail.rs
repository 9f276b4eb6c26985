// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded output capture and line reassembly.

/// Longest partial line held before it is force-split.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Keeps the most recent `max_chars` characters of a stream; oldest data is dropped first.
#[derive(Debug, Clone)]
pub struct OutputTail {
    buf: String,
    chars: usize,
    max_chars: usize,
}

impl OutputTail {
    pub fn new(max_chars: usize) -> Self {
        Self { buf: String::new(), chars: 0, max_chars }
    }

    pub fn push(&mut self, s: &str) {
        self.buf.push_str(s);
        self.chars += s.chars().count();
        if self.chars > self.max_chars {
            let excess = self.chars - self.max_chars;
            let cut = self.buf.char_indices().nth(excess).map(|(i, _)| i).unwrap_or(self.buf.len());
            self.buf.drain(..cut);
            self.chars -= excess;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Reassembles newline-terminated lines from arbitrary read chunks.
///
/// A trailing `\r` is stripped so CRLF output classifies the same as LF.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(self.take_pending());
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);
        if self.pending.len() > MAX_LINE_BYTES {
            lines.push(self.take_pending());
        }
        lines
    }

    /// Flush an unterminated final line at EOF.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_pending())
        }
    }

    fn take_pending(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// A splitter feeding a tail: what one captured stream needs.
#[derive(Debug)]
pub(crate) struct CapturedStream {
    pub(crate) splitter: LineSplitter,
    pub(crate) tail: OutputTail,
}

impl CapturedStream {
    pub(crate) fn new(max_chars: usize) -> Self {
        Self { splitter: LineSplitter::new(), tail: OutputTail::new(max_chars) }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let lines = self.splitter.push(chunk);
        for line in &lines {
            self.tail.push(line);
            self.tail.push("\n");
        }
        lines
    }

    pub(crate) fn finish(&mut self) -> Option<String> {
        let line = self.splitter.finish()?;
        self.tail.push(&line);
        Some(line)
    }
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
