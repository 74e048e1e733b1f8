//! Frame-building helpers: styling, number formatting and bordered boxes.

use std::time::Duration;

use plan_tui::core::text::utils::fit_to_width;
use plan_tui::{truncate_to_width, visible_width};

use crate::layout::{Rect, PANE_CHROME_WIDTH};

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Tool targets longer than this are shortened.
pub const TARGET_MAX_WIDTH: usize = 40;

fn ansi_wrap(text: &str, prefix: &str, suffix: &str) -> String {
    format!("{prefix}{text}{suffix}")
}

pub fn dim(text: &str) -> String {
    ansi_wrap(text, "\x1b[2m", "\x1b[22m")
}

pub fn bold(text: &str) -> String {
    ansi_wrap(text, "\x1b[1m", "\x1b[22m")
}

pub fn cyan(text: &str) -> String {
    ansi_wrap(text, "\x1b[36m", "\x1b[39m")
}

pub fn green(text: &str) -> String {
    ansi_wrap(text, "\x1b[32m", "\x1b[39m")
}

pub fn red(text: &str) -> String {
    ansi_wrap(text, "\x1b[31m", "\x1b[39m")
}

pub fn yellow(text: &str) -> String {
    ansi_wrap(text, "\x1b[33m", "\x1b[39m")
}

pub fn spinner_glyph(frame: usize) -> &'static str {
    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]
}

/// `950`, `12.3k`, `4.1M`.
pub fn format_tokens(tokens: u64) -> String {
    if tokens < 1_000 {
        tokens.to_string()
    } else if tokens < 1_000_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    }
}

pub fn format_cost(cost: f64) -> String {
    format!("${cost:.2}")
}

/// `45s`, `3m 07s`, `1h 02m`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3_600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3_600, secs % 3_600 / 60)
    }
}

/// First line of a tool target, shortened for the activity log.
///
/// Paths keep their last two components behind `…/`; anything else is cut with an ellipsis.
pub fn shorten_target(target: &str) -> String {
    let first = target.lines().next().unwrap_or("").trim();
    if visible_width(first) <= TARGET_MAX_WIDTH {
        return first.to_string();
    }

    let looks_like_path = first.contains('/') && !first.contains(char::is_whitespace);
    if looks_like_path {
        let components: Vec<&str> = first.split('/').filter(|part| !part.is_empty()).collect();
        if components.len() > 2 {
            let tail = components[components.len() - 2..].join("/");
            return truncate_to_width(&format!("…/{tail}"), TARGET_MAX_WIDTH, "…", false);
        }
    }

    truncate_to_width(first, TARGET_MAX_WIDTH, "…", false)
}

pub fn progress_bar(done: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (done.min(total) * width / total).min(width)
    };
    format!(
        "{}{}",
        green(&"█".repeat(filled)),
        dim(&"░".repeat(width - filled))
    )
}

/// Draws a rounded box exactly `rect.width` columns wide and `rect.height` rows tall.
///
/// Interior rows are `│ ` + content + scrollbar glyph + `│`. Boxes too small for chrome come
/// back blank.
pub fn render_box(
    rect: Rect,
    title: &str,
    content: &[String],
    scrollbar: &[&str],
    focused: bool,
) -> Vec<String> {
    let width = rect.width;
    let height = rect.height;
    if width < 2 || height < 2 {
        return vec![" ".repeat(width); height];
    }

    let border = |text: &str| if focused { cyan(text) } else { dim(text) };
    let inner = width - 2;
    let mut rows = Vec::with_capacity(height);

    let label = if title.is_empty() || inner < 4 {
        String::new()
    } else {
        truncate_to_width(title, inner - 3, "…", false)
    };
    let top = if label.is_empty() {
        border(&format!("╭{}╮", "─".repeat(inner)))
    } else {
        let fill = inner - 3 - visible_width(&label).min(inner - 3);
        format!(
            "{}{}{}",
            border("╭─ "),
            bold(&label),
            border(&format!(" {}╮", "─".repeat(fill)))
        )
    };
    rows.push(top);

    let content_width = width.saturating_sub(PANE_CHROME_WIDTH);
    for index in 0..height - 2 {
        let body = if width <= PANE_CHROME_WIDTH {
            " ".repeat(inner)
        } else {
            let line = content.get(index).map(String::as_str).unwrap_or("");
            let bar = scrollbar.get(index).copied().unwrap_or(" ");
            format!(" {}{}", fit_to_width(line, content_width), dim(bar))
        };
        rows.push(format!("{}{body}{}", border("│"), border("│")));
    }

    rows.push(border(&format!("╰{}╯", "─".repeat(inner))));
    rows
}

/// Assembles full-screen rows from positioned blocks. Blocks on the same row must not
/// overlap; gaps are filled with spaces.
pub fn compose_rows(width: usize, height: usize, blocks: &[(Rect, Vec<String>)]) -> Vec<String> {
    let mut ordered: Vec<&(Rect, Vec<String>)> = blocks.iter().collect();
    ordered.sort_by_key(|(rect, _)| rect.x);

    (0..height)
        .map(|y| {
            let mut row = String::new();
            let mut column = 0;
            for (rect, lines) in ordered.iter().filter(|(rect, _)| y >= rect.y && y < rect.bottom()) {
                if rect.x > column {
                    row.push_str(&" ".repeat(rect.x - column));
                }
                row.push_str(lines.get(y - rect.y).map(String::as_str).unwrap_or(""));
                column = column.max(rect.right());
            }
            if column > width {
                truncate_to_width(&row, width, "", false)
            } else {
                row
            }
        })
        .collect()
}
