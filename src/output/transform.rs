// src/output/transform.rs

//! Byte-stream rewriting applied to a worker's output before it reaches the
//! terminal.
//!
//! Tools that redraw progress lines emit `ESC[2K` (clear line) and then
//! `ESC[1G` (cursor to column one) before writing the new line content,
//! which wipes any prefix that was printed in front of the line.
//! [`ClearLinePrefixer`] puts the prefix back right after the cursor move.
//! [`LineTagger`] then prefixes every complete line with a tag.

pub const CLEAR_LINE: &[u8] = b"\x1b[2K";
pub const CURSOR_TO_COLUMN_ONE: &[u8] = b"\x1b[1G";

/// Re-inserts a prefix after a cursor-to-column-one sequence that follows a
/// clear-line chunk.
///
/// Detection is whole-chunk: the clear-line sequence must arrive as a chunk
/// on its own. A sequence split across chunk boundaries is not recognised.
#[derive(Debug, Clone)]
pub struct ClearLinePrefixer {
    prefix: Vec<u8>,
    previous_was_clear_line: bool,
}

impl ClearLinePrefixer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().into_bytes(),
            previous_was_clear_line: false,
        }
    }

    pub fn transform(&mut self, chunk: &[u8]) -> Vec<u8> {
        let current = if self.previous_was_clear_line {
            insert_after_each(chunk, CURSOR_TO_COLUMN_ONE, &self.prefix)
        } else {
            chunk.to_vec()
        };
        self.previous_was_clear_line = current == CLEAR_LINE;
        current
    }
}

fn insert_after_each(haystack: &[u8], needle: &[u8], insert: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len() + insert.len());
    let mut rest = haystack;
    while let Some(pos) = find(rest, needle) {
        let end = pos + needle.len();
        out.extend_from_slice(&rest[..end]);
        out.extend_from_slice(insert);
        rest = &rest[end..];
    }
    out.extend_from_slice(rest);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Line buffer that emits complete lines, each optionally preceded by a tag
/// and a space.
#[derive(Debug, Clone, Default)]
pub struct LineTagger {
    tag: Option<Vec<u8>>,
    pending: Vec<u8>,
}

impl LineTagger {
    pub fn untagged() -> Self {
        Self::default()
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into().into_bytes()),
            pending: Vec::new(),
        }
    }

    /// Feed a chunk; returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&mut out, &line[..line.len() - 1]);
        }
        out
    }

    /// Flush a trailing partial line, terminating it with a newline.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&mut out, &line);
        }
        out
    }

    fn emit(&self, out: &mut Vec<u8>, line: &[u8]) {
        if let Some(tag) = &self.tag {
            out.extend_from_slice(tag);
            out.push(b' ');
        }
        out.extend_from_slice(line);
        out.push(b'\n');
    }
}

/// The full chain for one output stream: optional prefix repair, then line
/// tagging.
#[derive(Debug, Clone, Default)]
pub struct OutputPipeline {
    prefixer: Option<ClearLinePrefixer>,
    tagger: LineTagger,
}

impl OutputPipeline {
    /// Lines pass through unchanged apart from newline termination.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Prefix repair with `label + " "`, then every line tagged with `label`.
    pub fn prefixed(label: &str) -> Self {
        Self {
            prefixer: Some(ClearLinePrefixer::new(format!("{label} "))),
            tagger: LineTagger::tagged(label),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        match self.prefixer.as_mut() {
            Some(prefixer) => {
                let repaired = prefixer.transform(chunk);
                self.tagger.push(&repaired)
            }
            None => self.tagger.push(chunk),
        }
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.tagger.finish()
    }
}
