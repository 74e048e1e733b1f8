//! Width-bounded string helpers.

use unicode_segmentation::UnicodeSegmentation;

use super::ansi::extract_ansi_code;
use super::width::{grapheme_width, next_ansi_or_end, visible_width};

const ANSI_RESET: &str = "\x1b[0m";

/// Truncates `text` to `max_width` columns, appending `ellipsis` when cut.
///
/// Escape sequences are preserved up to the cut point and followed by a reset so styles do
/// not bleed into the ellipsis. With `pad`, the result is space-filled to `max_width`.
pub fn truncate_to_width(text: &str, max_width: usize, ellipsis: &str, pad: bool) -> String {
    if max_width == 0 {
        return String::new();
    }

    let text_width = visible_width(text);
    if text_width <= max_width {
        if pad {
            return format!("{text}{}", " ".repeat(max_width - text_width));
        }
        return text.to_string();
    }

    let ellipsis_width = visible_width(ellipsis);
    if ellipsis_width >= max_width {
        return ellipsis
            .graphemes(true)
            .scan(0usize, |used, grapheme| {
                *used += grapheme_width(grapheme);
                (*used <= max_width).then_some(grapheme)
            })
            .collect();
    }
    let target_width = max_width - ellipsis_width;

    let mut truncated = String::with_capacity(text.len());
    let mut current_width = 0;
    let mut idx = 0;
    let mut styled = false;
    'outer: while idx < text.len() {
        if let Some(code) = extract_ansi_code(text, idx) {
            truncated.push_str(&text[idx..idx + code.length]);
            styled = true;
            idx += code.length;
            continue;
        }

        let end = next_ansi_or_end(text, idx);
        for grapheme in text[idx..end].graphemes(true) {
            let width = grapheme_width(grapheme);
            if current_width + width > target_width {
                break 'outer;
            }
            truncated.push_str(grapheme);
            current_width += width;
        }
        idx = end;
    }

    if styled {
        truncated.push_str(ANSI_RESET);
    }
    truncated.push_str(ellipsis);

    if pad {
        let result_width = current_width + ellipsis_width;
        if result_width < max_width {
            truncated.push_str(&" ".repeat(max_width - result_width));
        }
    }

    truncated
}

/// Truncates with a single-column ellipsis and pads to exactly `width` columns.
pub fn fit_to_width(text: &str, width: usize) -> String {
    truncate_to_width(text, width, "…", true)
}
