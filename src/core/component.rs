//! Component trait.

use crate::core::input_event::InputEvent;

/// Renderable component interface.
///
/// The runtime renders the root component once per frame and treats the returned lines as
/// the full screen, top to bottom.
pub trait Component {
    /// Render to a list of lines at the given width.
    fn render(&mut self, width: usize) -> Vec<String>;

    /// Handle input events.
    fn handle_event(&mut self, _event: &InputEvent) {}

    /// Invalidate any cached state.
    fn invalidate(&mut self) {}

    /// Provide the current terminal row count before each render.
    fn set_terminal_rows(&mut self, _rows: usize) {}
}
