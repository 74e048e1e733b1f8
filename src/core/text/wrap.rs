//! Word wrapping for unstyled text.

use unicode_segmentation::UnicodeSegmentation;

use super::width::{grapheme_width, visible_width};

/// Wraps `text` (no embedded newlines, no escapes) into rows of at most `width` columns.
///
/// Breaks at the last space that fits and drops it; words longer than a row are split at
/// grapheme boundaries. Always returns at least one row.
pub fn wrap_plain(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    if visible_width(text) <= width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    let mut last_space: Option<usize> = None;

    for grapheme in text.graphemes(true) {
        let grapheme_cols = grapheme_width(grapheme);

        if grapheme == " " {
            if current_width + grapheme_cols > width {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
                last_space = None;
                continue;
            }
            last_space = Some(current.len());
            current.push(' ');
            current_width += grapheme_cols;
            continue;
        }

        if current_width + grapheme_cols > width {
            match last_space.take() {
                Some(space) if space > 0 => {
                    let rest = current.split_off(space + 1);
                    current.truncate(space);
                    lines.push(std::mem::take(&mut current));
                    current = rest;
                    current_width = visible_width(&current);
                }
                _ => {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
            }

            if current_width + grapheme_cols > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
        }

        current.push_str(grapheme);
        current_width += grapheme_cols;
    }

    lines.push(current);
    lines
}
