//! Capped chronological log of tool activity and task boundaries.

use std::collections::VecDeque;

use plan_tui::truncate_to_width;
use time::OffsetDateTime;

use crate::render::{dim, green};

pub const ACTIVITY_CAP: usize = 2000;
/// Narrower panes drop the timestamp prefix.
pub const TIMESTAMP_MIN_WIDTH: usize = 40;

const DONE_GLYPH: &str = "✓";
const PENDING_GLYPH: &str = "○";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub text: String,
    pub timestamp: OffsetDateTime,
    pub is_done: bool,
    pub is_separator: bool,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    entries: VecDeque<ActivityEntry>,
    cap: usize,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::with_cap(ACTIVITY_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn push_tool(&mut self, text: impl Into<String>, timestamp: OffsetDateTime) {
        self.push(ActivityEntry {
            text: text.into(),
            timestamp,
            is_done: false,
            is_separator: false,
        });
    }

    pub fn push_separator(&mut self, text: impl Into<String>, timestamp: OffsetDateTime) {
        self.push(ActivityEntry {
            text: text.into(),
            timestamp,
            is_done: false,
            is_separator: true,
        });
    }

    fn push(&mut self, entry: ActivityEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Marks the most recent entry done. Separators and entries already done are left
    /// alone, so a stray completion never touches an older tool.
    pub fn mark_latest_done(&mut self) -> bool {
        match self.entries.back_mut() {
            Some(entry) if !entry.is_separator && !entry.is_done => {
                entry.is_done = true;
                true
            }
            _ => false,
        }
    }

    /// One display line per entry, truncated to `content_width`.
    ///
    /// `spinner` is the live glyph for the newest open entry; `None` once the run is over.
    pub fn render_lines(&self, content_width: usize, spinner: Option<&str>) -> Vec<String> {
        let latest_open = self
            .entries
            .iter()
            .rposition(|entry| !entry.is_separator && !entry.is_done);
        let show_time = content_width >= TIMESTAMP_MIN_WIDTH;

        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let prefix = if show_time {
                    format!("{} ", format_clock(entry.timestamp))
                } else {
                    String::new()
                };
                let line = if entry.is_separator {
                    dim(&format!("{prefix}── {} ──", entry.text))
                } else {
                    let glyph = if entry.is_done {
                        green(DONE_GLYPH)
                    } else if Some(index) == latest_open {
                        spinner.unwrap_or(PENDING_GLYPH).to_string()
                    } else {
                        PENDING_GLYPH.to_string()
                    };
                    format!("{}{glyph} {}", dim(&prefix), entry.text)
                };
                truncate_to_width(&line, content_width, "…", false)
            })
            .collect()
    }
}

fn format_clock(timestamp: OffsetDateTime) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second()
    )
}

/// Wall-clock time in the local offset, falling back to UTC when it cannot be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
