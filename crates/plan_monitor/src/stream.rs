//! Rebuilds readable text from the executor's raw output chunks.
//!
//! Chunks arrive split at arbitrary points and interleaved with control chunks: a pure
//! `[Tool: name]` marker or the assistant-boundary sentinel. Control chunks are never shown;
//! they arm a pending separator so the next real text starts after a blank line.

use std::collections::VecDeque;

use plan_executor::ASSISTANT_BOUNDARY;
use plan_tui::core::text::ansi::strip_ansi;
use plan_tui::wrap_plain;

pub const OUTPUT_LINE_CAP: usize = 5000;
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone)]
pub struct StreamReconstructor {
    lines: VecDeque<String>,
    wrapped: VecDeque<Option<Vec<String>>>,
    wrap_width: usize,
    cap: usize,
    has_content: bool,
    pending_separator: bool,
}

impl Default for StreamReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReconstructor {
    pub fn new() -> Self {
        Self::with_cap(OUTPUT_LINE_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            wrapped: VecDeque::new(),
            wrap_width: 0,
            cap: cap.max(1),
            has_content: false,
            pending_separator: false,
        }
    }

    /// True until some visible text has been appended.
    pub fn is_empty(&self) -> bool {
        !self.has_content
    }

    pub fn pending_separator(&self) -> bool {
        self.pending_separator
    }

    /// Logical lines, oldest first. The last one is still open for appends.
    pub fn logical_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Arms the separator for the next real chunk. No-op while output is empty.
    pub fn mark_boundary(&mut self) {
        if !self.is_empty() {
            self.pending_separator = true;
        }
    }

    pub fn push_chunk(&mut self, chunk: &str) {
        if chunk == ASSISTANT_BOUNDARY || is_tool_marker(chunk) {
            self.mark_boundary();
            return;
        }

        let text = sanitize(chunk);
        let separate = std::mem::take(&mut self.pending_separator);
        if text.is_empty() {
            return;
        }

        if separate {
            let prefix = if text.starts_with("\n\n") {
                ""
            } else if text.starts_with('\n') {
                "\n"
            } else {
                "\n\n"
            };
            self.append(&format!("{prefix}{text}"));
        } else {
            self.append(&text);
        }
    }

    fn append(&mut self, text: &str) {
        if text.chars().any(|ch| ch != '\n') {
            self.has_content = true;
        }
        let mut pieces = text.split('\n');
        if let Some(first) = pieces.next() {
            match self.lines.back_mut() {
                Some(open) => {
                    open.push_str(first);
                    if let Some(cache) = self.wrapped.back_mut() {
                        *cache = None;
                    }
                }
                None => {
                    self.lines.push_back(first.to_string());
                    self.wrapped.push_back(None);
                }
            }
        }
        for piece in pieces {
            self.lines.push_back(piece.to_string());
            self.wrapped.push_back(None);
        }

        while self.lines.len() > self.cap {
            self.lines.pop_front();
            self.wrapped.pop_front();
        }
    }

    /// Display rows for a pane `width` columns wide. Lines are wrapped lazily and cached
    /// until they change or the width does.
    pub fn wrapped_lines(&mut self, width: usize) -> Vec<String> {
        let width = width.max(1);
        if width != self.wrap_width {
            self.wrap_width = width;
            self.wrapped.iter_mut().for_each(|cache| *cache = None);
        }

        let mut rows = Vec::with_capacity(self.lines.len());
        for (line, cache) in self.lines.iter().zip(self.wrapped.iter_mut()) {
            let wrapped = cache.get_or_insert_with(|| wrap_plain(line, width));
            rows.extend(wrapped.iter().cloned());
        }
        rows
    }
}

/// A free-standing `[Tool: name]`, optionally surrounded by line breaks.
pub fn is_tool_marker(chunk: &str) -> bool {
    let trimmed = chunk.trim_matches(|ch| ch == '\n' || ch == '\r');
    trimmed
        .strip_prefix("[Tool: ")
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|name| !name.is_empty() && !name.contains(['[', ']', '\n']))
}

fn sanitize(chunk: &str) -> String {
    let without_cr = chunk.replace('\r', "");
    strip_ansi(&without_cr).replace('\t', &" ".repeat(TAB_WIDTH))
}
