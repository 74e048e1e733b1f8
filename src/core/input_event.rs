//! Structured input events produced by the runtime.

use crate::core::input::{parse_key, parse_text};
use crate::core::mouse::{parse_mouse, MouseEvent};

/// Input event delivered to components.
///
/// Notes:
/// - `raw` is the exact sequence received from the terminal (UTF-8 decoded).
/// - `key_id` is the normalized identifier from [`parse_key`].
/// - Mouse events carry zero-based cell coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key { raw: String, key_id: String },
    Text { raw: String, text: String },
    Mouse(MouseEvent),
    Resize { columns: u16, rows: u16 },
    UnknownRaw { raw: String },
}

/// Converts one complete stdin sequence into an event.
pub fn parse_input_event(data: &str) -> Option<InputEvent> {
    if data.is_empty() {
        return None;
    }

    if let Some(mouse) = parse_mouse(data) {
        return Some(InputEvent::Mouse(mouse));
    }

    if let Some(key_id) = parse_key(data) {
        return Some(InputEvent::Key {
            raw: data.to_string(),
            key_id,
        });
    }

    if let Some(text) = parse_text(data) {
        return Some(InputEvent::Text {
            raw: data.to_string(),
            text,
        });
    }

    Some(InputEvent::UnknownRaw {
        raw: data.to_string(),
    })
}
