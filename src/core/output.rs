//! Typed terminal output commands and a single output gate.
//!
//! Invariant: all terminal writes must flow through `OutputGate::flush(..)`.

use crate::core::terminal::Terminal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCmd {
    /// Raw bytes/control sequences (UTF-8 string) to be written to the terminal.
    Bytes(String),

    /// Cursor visibility.
    HideCursor,
    ShowCursor,

    /// Screen toggles.
    AltScreenEnter,
    AltScreenLeave,
    ClearScreen,

    /// SGR mouse reporting (button + wheel events, extended coordinates).
    MouseEnable,
    MouseDisable,

    /// Synchronized update brackets.
    SyncBegin,
    SyncEnd,
}

impl TerminalCmd {
    pub fn bytes(data: impl Into<String>) -> Self {
        Self::Bytes(data.into())
    }

    /// Escape sequence emitted for this command.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bytes(data) => data,
            Self::HideCursor => "\x1b[?25l",
            Self::ShowCursor => "\x1b[?25h",
            Self::AltScreenEnter => "\x1b[?1049h",
            Self::AltScreenLeave => "\x1b[?1049l",
            Self::ClearScreen => "\x1b[2J\x1b[H",
            Self::MouseEnable => "\x1b[?1000h\x1b[?1006h",
            Self::MouseDisable => "\x1b[?1006l\x1b[?1000l",
            Self::SyncBegin => "\x1b[?2026h",
            Self::SyncEnd => "\x1b[?2026l",
        }
    }
}

#[derive(Debug, Default)]
pub struct OutputGate {
    cmds: Vec<TerminalCmd>,
}

impl OutputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: TerminalCmd) {
        self.cmds.push(cmd);
    }

    pub fn extend<I>(&mut self, cmds: I)
    where
        I: IntoIterator<Item = TerminalCmd>,
    {
        self.cmds.extend(cmds);
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    /// Flush buffered commands to the terminal as a single write.
    ///
    /// This is the single write gate: `Terminal::write(..)` must not be called
    /// from anywhere else.
    pub fn flush<T: Terminal + ?Sized>(&mut self, term: &mut T) {
        if self.cmds.is_empty() {
            return;
        }
        let mut buffer = String::new();
        for cmd in self.cmds.drain(..) {
            buffer.push_str(cmd.as_str());
        }
        term.write(&buffer);
    }
}
