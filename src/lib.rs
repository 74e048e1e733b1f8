//! Full-screen terminal runtime used by the plan monitor.
//!
//! Invariant: single output gate. Only `core::output::OutputGate::flush(..)` writes to the
//! terminal.
//!
//! # Public API Overview
//! - Implement [`Component`] for the root view and hand it to [`TUI`].
//! - Drive the runtime with `run_blocking_once`; post work from other threads through
//!   [`RuntimeHandle::dispatch`] with a [`Command`].
//! - Parse input with [`parse_key`] / [`parse_mouse`], or consume [`InputEvent`]s.
//! - Use the text helpers for ANSI-safe width math and truncation.

#![allow(clippy::type_complexity)]

pub mod config;
pub mod logging;

pub mod core;
pub mod platform;
pub mod render;
pub mod runtime;

pub use crate::config::EnvConfig;

/// Keyboard and mouse parsing helpers.
pub use crate::core::input::parse_key;
pub use crate::core::input_event::InputEvent;
pub use crate::core::mouse::{parse_mouse, MouseEvent, MouseKind};

/// Input buffering for chunked terminal streams.
pub use crate::platform::stdin_buffer::StdinBuffer;

/// Terminal interfaces and the process-backed implementation.
pub use crate::core::terminal::Terminal;
#[cfg(unix)]
pub use crate::platform::process_terminal::ProcessTerminal;

pub use crate::core::component::Component;

/// Runtime command types.
pub use crate::runtime::{Command, CustomCommand, CustomCommandCtx, CustomCommandError, RuntimeHandle};

/// Alias for the main runtime type.
pub type TUI<T> = crate::runtime::tui::TuiRuntime<T>;

/// ANSI-aware truncation helper.
pub use crate::core::text::utils::truncate_to_width;
/// Visible width helper that ignores ANSI control sequences.
pub use crate::core::text::width::visible_width;
/// Plain-text word wrapping.
pub use crate::core::text::wrap::wrap_plain;
