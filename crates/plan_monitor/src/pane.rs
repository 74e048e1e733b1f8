//! Scrollable pane state.

/// Thumb and track glyphs of the scrollbar column.
pub const SCROLLBAR_THUMB: &str = "┃";
pub const SCROLLBAR_TRACK: &str = "│";

/// A window of `height` rows over an ordered list of display lines.
///
/// Invariant: `y_offset <= max(0, lines.len() - height)`. With auto-scroll on, every
/// [`ScrollPane::set_lines`] repositions the window at the tail.
#[derive(Debug, Clone)]
pub struct ScrollPane {
    lines: Vec<String>,
    width: usize,
    height: usize,
    y_offset: usize,
    auto_scroll: bool,
}

impl Default for ScrollPane {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollPane {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            width: 1,
            height: 1,
            y_offset: 0,
            auto_scroll: true,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn y_offset(&self) -> usize {
        self.y_offset
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    pub fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }

    pub fn at_tail(&self) -> bool {
        self.y_offset == self.max_offset()
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.settle();
    }

    pub fn set_lines(&mut self, lines: Vec<String>) {
        self.lines = lines;
        self.settle();
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
        self.settle();
    }

    /// Rows currently in view.
    pub fn visible_lines(&self) -> &[String] {
        let end = (self.y_offset + self.height).min(self.lines.len());
        &self.lines[self.y_offset.min(end)..end]
    }

    /// Scrolls minimally so `index` is in view.
    ///
    /// Unless `force` is set, the pane only moves while auto-scroll is on, so a reader who
    /// scrolled away keeps their position. Auto-scroll itself is left untouched.
    pub fn ensure_visible(&mut self, index: usize, force: bool) {
        if !force && !self.auto_scroll {
            return;
        }
        if self.lines.is_empty() {
            return;
        }
        let index = index.min(self.lines.len() - 1);
        if index < self.y_offset {
            self.y_offset = index;
        } else if index >= self.y_offset + self.height {
            self.y_offset = index + 1 - self.height;
        }
        self.clamp_offset();
    }

    /// Applies a scroll key. Returns `false` for keys that are not scroll keys.
    pub fn handle_scroll_key(&mut self, key_id: &str) -> bool {
        match key_id {
            "up" | "k" => self.scroll_up(1),
            "down" | "j" => self.scroll_down(1),
            "pageUp" | "ctrl+u" => self.scroll_up(self.height),
            "pageDown" | "ctrl+d" => self.scroll_down(self.height),
            "home" | "g" => {
                self.y_offset = 0;
                self.auto_scroll = self.at_tail();
            }
            "end" | "G" => {
                self.y_offset = self.max_offset();
                self.auto_scroll = true;
            }
            _ => return false,
        }
        true
    }

    /// Scrolls by `delta` rows; negative moves toward the top.
    pub fn scroll_by(&mut self, delta: isize) {
        if delta < 0 {
            self.scroll_up(delta.unsigned_abs());
        } else if delta > 0 {
            self.scroll_down(delta.unsigned_abs());
        }
    }

    fn scroll_up(&mut self, rows: usize) {
        self.auto_scroll = false;
        self.y_offset = self.y_offset.saturating_sub(rows);
    }

    fn scroll_down(&mut self, rows: usize) {
        self.y_offset = (self.y_offset + rows).min(self.max_offset());
        if self.at_tail() {
            self.auto_scroll = true;
        }
    }

    fn settle(&mut self) {
        if self.auto_scroll {
            self.y_offset = self.max_offset();
        } else {
            self.clamp_offset();
        }
    }

    fn clamp_offset(&mut self) {
        self.y_offset = self.y_offset.min(self.max_offset());
    }

    /// One glyph per visible row: a blank gutter when everything fits, otherwise a thumb
    /// sized `max(1, view^2 / content)` positioned proportionally to the offset.
    pub fn scrollbar(&self) -> Vec<&'static str> {
        let view = self.height;
        let content = self.lines.len();
        if content <= view {
            return vec![" "; view];
        }

        let thumb = (view * view / content).clamp(1, view);
        let travel = view - thumb;
        let top = (self.y_offset * travel / (content - view)).min(travel);
        (0..view)
            .map(|row| {
                if row >= top && row < top + thumb {
                    SCROLLBAR_THUMB
                } else {
                    SCROLLBAR_TRACK
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ScrollPane, SCROLLBAR_THUMB, SCROLLBAR_TRACK};

    fn numbered(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("line {i}")).collect()
    }

    fn filled_pane(count: usize, height: usize) -> ScrollPane {
        let mut pane = ScrollPane::new();
        pane.set_size(20, height);
        pane.set_lines(numbered(count));
        pane
    }

    #[test]
    fn auto_scroll_follows_the_tail() {
        let mut pane = filled_pane(10, 4);
        assert_eq!(pane.y_offset(), 6);
        pane.set_lines(numbered(12));
        assert_eq!(pane.y_offset(), 8);
        assert_eq!(pane.visible_lines().last().map(String::as_str), Some("line 11"));
    }

    #[test]
    fn scrolling_up_disables_auto_scroll_and_keeps_position() {
        let mut pane = filled_pane(10, 4);
        assert!(pane.handle_scroll_key("k"));
        assert!(!pane.auto_scroll());
        assert_eq!(pane.y_offset(), 5);

        pane.set_lines(numbered(20));
        assert_eq!(pane.y_offset(), 5);
    }

    #[test]
    fn reaching_the_tail_re_enables_auto_scroll() {
        let mut pane = filled_pane(10, 4);
        pane.handle_scroll_key("pageUp");
        assert_eq!(pane.y_offset(), 2);
        pane.handle_scroll_key("j");
        assert!(!pane.auto_scroll());
        pane.handle_scroll_key("ctrl+d");
        assert_eq!(pane.y_offset(), 6);
        assert!(pane.auto_scroll());
    }

    #[test]
    fn home_and_end() {
        let mut pane = filled_pane(10, 4);
        pane.handle_scroll_key("g");
        assert_eq!(pane.y_offset(), 0);
        assert!(!pane.auto_scroll());
        pane.handle_scroll_key("G");
        assert_eq!(pane.y_offset(), 6);
        assert!(pane.auto_scroll());
    }

    #[test]
    fn up_at_top_floors_at_zero() {
        let mut pane = filled_pane(3, 4);
        pane.handle_scroll_key("up");
        assert_eq!(pane.y_offset(), 0);
        assert!(!pane.handle_scroll_key("x"));
    }

    #[test]
    fn shrinking_content_clamps_offset() {
        let mut pane = filled_pane(10, 4);
        pane.handle_scroll_key("k");
        pane.set_lines(numbered(5));
        assert_eq!(pane.y_offset(), 1);
        pane.set_lines(Vec::new());
        assert_eq!(pane.y_offset(), 0);
        assert!(pane.visible_lines().is_empty());
    }

    #[test]
    fn ensure_visible_scrolls_minimally_and_respects_manual_scroll() {
        let mut pane = filled_pane(10, 4);
        pane.ensure_visible(1, false);
        assert_eq!(pane.y_offset(), 1);
        pane.ensure_visible(3, false);
        assert_eq!(pane.y_offset(), 1);
        pane.ensure_visible(9, false);
        assert_eq!(pane.y_offset(), 6);

        pane.handle_scroll_key("g");
        pane.ensure_visible(9, false);
        assert_eq!(pane.y_offset(), 0);
        pane.ensure_visible(9, true);
        assert_eq!(pane.y_offset(), 6);
    }

    #[test]
    fn wheel_scroll_by_delta() {
        let mut pane = filled_pane(10, 4);
        pane.scroll_by(-3);
        assert_eq!(pane.y_offset(), 3);
        assert!(!pane.auto_scroll());
        pane.scroll_by(3);
        assert_eq!(pane.y_offset(), 6);
        assert!(pane.auto_scroll());
    }

    #[test]
    fn scrollbar_is_blank_when_content_fits() {
        let pane = filled_pane(3, 4);
        assert_eq!(pane.scrollbar(), vec![" "; 4]);
    }

    #[test]
    fn scrollbar_thumb_size_and_position() {
        let mut pane = filled_pane(20, 4);
        // thumb = max(1, 16 / 20) = 1, travel = 3
        assert_eq!(
            pane.scrollbar(),
            vec![SCROLLBAR_TRACK, SCROLLBAR_TRACK, SCROLLBAR_TRACK, SCROLLBAR_THUMB]
        );
        pane.handle_scroll_key("g");
        assert_eq!(pane.scrollbar()[0], SCROLLBAR_THUMB);

        let mut pane = filled_pane(8, 4);
        pane.handle_scroll_key("g");
        // thumb = 16 / 8 = 2
        assert_eq!(
            pane.scrollbar(),
            vec![SCROLLBAR_THUMB, SCROLLBAR_THUMB, SCROLLBAR_TRACK, SCROLLBAR_TRACK]
        );
    }
}
