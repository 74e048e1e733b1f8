//! Full-screen diff renderer.
//!
//! The root component returns one string per screen row. The renderer remembers the last
//! frame and repaints only rows whose content changed, each addressed absolutely so the
//! cursor position never has to be tracked between frames.

use crate::core::output::TerminalCmd;
use crate::core::text::utils::truncate_to_width;
use crate::core::text::width::visible_width;

const LINE_RESET: &str = "\x1b[0m";
const CLEAR_LINE: &str = "\x1b[2K";

#[derive(Debug, Default)]
pub struct DiffRenderer {
    previous_lines: Vec<String>,
    previous_width: usize,
    previous_height: usize,
    force_full_redraw_next: bool,
}

impl DiffRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next frame to clear the screen and repaint every row.
    pub fn request_full_redraw_next(&mut self) {
        self.force_full_redraw_next = true;
    }

    pub fn previous_lines_len(&self) -> usize {
        self.previous_lines.len()
    }

    /// Renders `lines` into a `width` x `height` screen.
    ///
    /// Rows past `height` are dropped, missing rows render blank and overlong rows are
    /// clamped to `width`. With `always_full` every frame is a full repaint.
    pub fn render(
        &mut self,
        lines: Vec<String>,
        width: usize,
        height: usize,
        always_full: bool,
    ) -> Vec<TerminalCmd> {
        let lines = normalize_lines(lines, width, height);

        let size_changed = self.previous_width != width || self.previous_height != height;
        let first_frame = self.previous_width == 0 && self.previous_height == 0;
        let force = std::mem::take(&mut self.force_full_redraw_next);

        if first_frame || size_changed || force || always_full {
            tracing::trace!(
                first_frame,
                size_changed,
                force,
                always_full,
                rows = lines.len(),
                "full redraw"
            );
            let cmds = full_render(&lines);
            self.remember(lines, width, height);
            return cmds;
        }

        let mut buffer = String::new();
        let mut changed_rows = 0usize;
        for (row, line) in lines.iter().enumerate() {
            let previous = self.previous_lines.get(row).map(String::as_str);
            if previous == Some(line.as_str()) {
                continue;
            }
            push_row(&mut buffer, row, line);
            changed_rows += 1;
        }

        self.remember(lines, width, height);
        if changed_rows == 0 {
            return Vec::new();
        }

        tracing::trace!(changed_rows, "diff redraw");
        vec![
            TerminalCmd::SyncBegin,
            TerminalCmd::Bytes(buffer),
            TerminalCmd::SyncEnd,
        ]
    }

    fn remember(&mut self, lines: Vec<String>, width: usize, height: usize) {
        self.previous_lines = lines;
        self.previous_width = width;
        self.previous_height = height;
    }
}

fn normalize_lines(mut lines: Vec<String>, width: usize, height: usize) -> Vec<String> {
    lines.truncate(height);
    lines.resize(height, String::new());
    for line in &mut lines {
        if visible_width(line) > width {
            *line = truncate_to_width(line, width, "", false);
        }
    }
    lines
}

fn full_render(lines: &[String]) -> Vec<TerminalCmd> {
    let mut buffer = String::new();
    for (row, line) in lines.iter().enumerate() {
        push_row(&mut buffer, row, line);
    }
    vec![
        TerminalCmd::SyncBegin,
        TerminalCmd::ClearScreen,
        TerminalCmd::Bytes(buffer),
        TerminalCmd::SyncEnd,
    ]
}

fn push_row(buffer: &mut String, row: usize, line: &str) {
    buffer.push_str(&format!("\x1b[{};1H", row + 1));
    buffer.push_str(CLEAR_LINE);
    buffer.push_str(line);
    buffer.push_str(LINE_RESET);
}
