//! Environment configuration.

use std::env;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Tee every terminal write into this file.
    pub write_log: Option<String>,
    pub mouse: bool,
    pub alt_screen: bool,
    /// Repaint every row on every frame instead of diffing.
    pub debug_redraw: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            write_log: None,
            mouse: true,
            alt_screen: true,
            debug_redraw: false,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            write_log: env_string_opt("PLAN_TUI_WRITE_LOG"),
            mouse: !env_flag("PLAN_TUI_NO_MOUSE"),
            alt_screen: !env_flag("PLAN_TUI_NO_ALT_SCREEN"),
            debug_redraw: env_flag("PLAN_TUI_DEBUG_REDRAW"),
        }
    }
}

pub fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

pub fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
