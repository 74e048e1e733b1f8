//! SGR (1006) mouse report parsing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
    Press(MouseButton),
    Release,
    Drag,
    WheelUp,
    WheelDown,
}

impl MouseKind {
    pub fn is_wheel(self) -> bool {
        matches!(self, Self::WheelUp | Self::WheelDown)
    }
}

/// Mouse event with zero-based cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseKind,
    pub column: usize,
    pub row: usize,
}

const BUTTON_MASK: u16 = 0b11;
const DRAG_FLAG: u16 = 32;
const WHEEL_FLAG: u16 = 64;
// Shift (4), alt/meta (8) and ctrl (16) bits.
const MODIFIER_MASK: u16 = 4 | 8 | 16;

/// Parses `ESC [ < b ; x ; y (M|m)`.
pub fn parse_mouse(data: &str) -> Option<MouseEvent> {
    let payload = data.strip_prefix("\x1b[<")?;
    let (body, pressed) = if let Some(body) = payload.strip_suffix('M') {
        (body, true)
    } else {
        (payload.strip_suffix('m')?, false)
    };

    let mut parts = body.split(';');
    let code: u16 = parts.next()?.parse().ok()?;
    let column: usize = parts.next()?.parse().ok()?;
    let row: usize = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let code = code & !MODIFIER_MASK;
    let kind = if code & WHEEL_FLAG != 0 {
        match code & BUTTON_MASK {
            0 => MouseKind::WheelUp,
            1 => MouseKind::WheelDown,
            _ => return None,
        }
    } else if !pressed {
        MouseKind::Release
    } else if code & DRAG_FLAG != 0 {
        MouseKind::Drag
    } else {
        match code & BUTTON_MASK {
            0 => MouseKind::Press(MouseButton::Left),
            1 => MouseKind::Press(MouseButton::Middle),
            2 => MouseKind::Press(MouseButton::Right),
            _ => MouseKind::Release,
        }
    };

    Some(MouseEvent {
        kind,
        column: column.saturating_sub(1),
        row: row.saturating_sub(1),
    })
}
