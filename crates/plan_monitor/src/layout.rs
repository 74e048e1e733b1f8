//! Pane geometry.
//!
//! [`compute_layout`] is a pure function of the terminal size. Every rectangle it returns is
//! at least 1x1, even for a 0x0 terminal; rows that fall below the screen are clipped by the
//! renderer.

pub const TITLE_ROWS: usize = 1;
pub const STATUS_ROWS: usize = 1;

/// Two border columns, one padding column and the scrollbar column.
pub const PANE_CHROME_WIDTH: usize = 4;
/// Top and bottom border.
pub const PANE_CHROME_HEIGHT: usize = 2;

pub const OUTPUT_MIN_CONTENT_WIDTH: usize = 40;
pub const LEFT_MIN_CONTENT_WIDTH: usize = 28;
pub const MIN_TWO_COL_WIDTH: usize =
    OUTPUT_MIN_CONTENT_WIDTH + LEFT_MIN_CONTENT_WIDTH + 2 * PANE_CHROME_WIDTH;
pub const LEFT_COLUMN_PERCENT: usize = 35;

pub const PROGRESS_PERCENT: usize = 40;
/// Static lines above the task list: progress bar, current task, tokens.
pub const PROGRESS_HEADER_LINES: usize = 3;
pub const PROGRESS_MIN_HEIGHT: usize = PROGRESS_HEADER_LINES + 1 + PANE_CHROME_HEIGHT;
pub const ACTIVITY_MIN_HEIGHT: usize = 5;

pub const NARROW_OUTPUT_PERCENT: usize = 50;
pub const NARROW_PROGRESS_PERCENT: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Columns available for text inside a bordered pane.
    pub fn content_width(&self) -> usize {
        self.width.saturating_sub(PANE_CHROME_WIDTH).max(1)
    }

    /// Rows available for text inside a bordered pane.
    pub fn content_height(&self) -> usize {
        self.height.saturating_sub(PANE_CHROME_HEIGHT).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Wide,
    Narrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub mode: LayoutMode,
    pub title: Rect,
    pub output: Rect,
    pub progress: Rect,
    pub activity: Rect,
    pub status: Rect,
}

impl Layout {
    /// Rows of the task list below the static progress header.
    pub fn task_list_height(&self) -> usize {
        self.progress
            .content_height()
            .saturating_sub(PROGRESS_HEADER_LINES)
            .max(1)
    }
}

impl Default for Layout {
    fn default() -> Self {
        compute_layout(0, 0)
    }
}

pub fn compute_layout(width: usize, height: usize) -> Layout {
    let width = width.max(1);
    let height = height.max(1);

    let body_y = TITLE_ROWS;
    let body_height = height.saturating_sub(TITLE_ROWS + STATUS_ROWS).max(1);
    let title = Rect::new(0, 0, width, TITLE_ROWS);
    let status = Rect::new(0, body_y + body_height, width, STATUS_ROWS);

    if width >= MIN_TWO_COL_WIDTH {
        wide_layout(width, body_y, body_height, title, status)
    } else {
        narrow_layout(width, body_y, body_height, title, status)
    }
}

fn wide_layout(width: usize, body_y: usize, body_height: usize, title: Rect, status: Rect) -> Layout {
    let left_min = LEFT_MIN_CONTENT_WIDTH + PANE_CHROME_WIDTH;
    let output_min = OUTPUT_MIN_CONTENT_WIDTH + PANE_CHROME_WIDTH;

    let mut left_width = (width * LEFT_COLUMN_PERCENT / 100).max(left_min);
    if width.saturating_sub(left_width) < output_min {
        left_width = width.saturating_sub(output_min).max(1);
    }
    let output_width = width.saturating_sub(left_width).max(1);

    let mut progress_height = (body_height * PROGRESS_PERCENT / 100).max(PROGRESS_MIN_HEIGHT);
    let mut activity_height = body_height.saturating_sub(progress_height);
    if activity_height < ACTIVITY_MIN_HEIGHT {
        activity_height = ACTIVITY_MIN_HEIGHT
            .min(body_height.saturating_sub(1))
            .max(1);
        progress_height = body_height.saturating_sub(activity_height).max(1);
    }

    let body_bottom = body_y + body_height;
    Layout {
        mode: LayoutMode::Wide,
        title,
        progress: Rect::new(0, body_y, left_width, progress_height),
        activity: Rect::new(
            0,
            fit_above(body_y + progress_height, activity_height, body_bottom),
            left_width,
            activity_height,
        ),
        output: Rect::new(left_width, body_y, output_width, body_height),
        status,
    }
}

fn narrow_layout(
    width: usize,
    body_y: usize,
    body_height: usize,
    title: Rect,
    status: Rect,
) -> Layout {
    let output_height = (body_height * NARROW_OUTPUT_PERCENT / 100).max(1);
    let rest = body_height.saturating_sub(output_height);
    let progress_height = (rest * NARROW_PROGRESS_PERCENT / 100).max(1);
    let activity_height = rest.saturating_sub(progress_height).max(1);

    let body_bottom = body_y + body_height;
    let progress_y = fit_above(body_y + output_height, progress_height, body_bottom);
    Layout {
        mode: LayoutMode::Narrow,
        title,
        output: Rect::new(0, body_y, width, output_height),
        progress: Rect::new(0, progress_y, width, progress_height),
        activity: Rect::new(
            0,
            fit_above(progress_y + progress_height, activity_height, body_bottom),
            width,
            activity_height,
        ),
        status,
    }
}

/// Moves a pane up so it ends at `bottom` when the body is too short for every pane's
/// one-row floor. The pane then overlaps its neighbour above instead of the status row.
fn fit_above(y: usize, height: usize, bottom: usize) -> usize {
    y.min(bottom.saturating_sub(height))
}
