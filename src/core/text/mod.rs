//! Text helpers (ANSI parsing, width calculations, truncation, wrapping).
//!
//! These helpers are pure (string in/string out) and live under `core` so views can depend
//! on them without importing anything from the render layer.

pub mod ansi;
pub mod utils;
pub mod width;
pub mod wrap;
