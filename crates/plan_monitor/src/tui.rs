//! Root component: draws the session as a full-screen frame and feeds it input.

use std::sync::{Arc, Mutex, MutexGuard};

use plan_tui::core::text::utils::fit_to_width;
use plan_tui::{visible_width, Command, Component, InputEvent, RuntimeHandle};

use crate::layout::Rect;
use crate::render::{
    bold, compose_rows, cyan, dim, format_cost, format_duration, format_tokens, green,
    progress_bar, red, render_box, spinner_glyph, yellow,
};
use crate::session::{Focus, RunSession, RunState};

pub struct MonitorComponent {
    session: Arc<Mutex<RunSession>>,
    runtime_handle: RuntimeHandle,
    rows: usize,
}

impl MonitorComponent {
    pub fn new(session: Arc<Mutex<RunSession>>, runtime_handle: RuntimeHandle) -> Self {
        Self {
            session,
            runtime_handle,
            rows: 24,
        }
    }
}

impl Component for MonitorComponent {
    fn render(&mut self, width: usize) -> Vec<String> {
        let mut session = lock_unpoisoned(&self.session);
        session.resize(width, self.rows);
        render_frame(&session, width, self.rows)
    }

    fn set_terminal_rows(&mut self, rows: usize) {
        self.rows = rows;
    }

    fn handle_event(&mut self, event: &InputEvent) {
        let signalled = {
            let mut session = lock_unpoisoned(&self.session);
            session.handle_event(event);
            session.signal().is_some()
        };
        if signalled {
            self.runtime_handle.dispatch(Command::RequestStop);
        }
    }
}

/// Builds every row of the screen for the session's current layout.
pub fn render_frame(session: &RunSession, width: usize, height: usize) -> Vec<String> {
    let layout = *session.layout();
    let focus = session.focus();

    let output = session.pane(Focus::Output);
    let output_box = render_box(
        layout.output,
        &output_title(session),
        output.visible_lines(),
        &output.scrollbar(),
        focus == Focus::Output,
    );

    let activity = session.pane(Focus::Activity);
    let activity_box = render_box(
        layout.activity,
        "Activity",
        activity.visible_lines(),
        &activity.scrollbar(),
        focus == Focus::Activity,
    );

    let tasks = session.pane(Focus::Tasks);
    let mut task_content = progress_header(session, layout.progress);
    let mut task_scrollbar = vec![" "; task_content.len()];
    task_content.extend(tasks.visible_lines().iter().cloned());
    task_scrollbar.extend(tasks.scrollbar());
    let tasks_box = render_box(
        layout.progress,
        "Tasks",
        &task_content,
        &task_scrollbar,
        focus == Focus::Tasks,
    );

    let blocks = [
        (layout.title, vec![fit_to_width(&title_row(session), width)]),
        (layout.output, output_box),
        (layout.progress, tasks_box),
        (layout.activity, activity_box),
        (layout.status, vec![fit_to_width(&status_row(session), width)]),
    ];
    compose_rows(width, height, &blocks)
}

fn title_row(session: &RunSession) -> String {
    let badge = match session.state() {
        RunState::Running => cyan(&format!(
            "{} Running",
            spinner_glyph(session.spinner_frame())
        )),
        RunState::Cancelling => yellow("■ Stopping…"),
        RunState::Done if session.final_success() => green("✓ Plan Completed"),
        RunState::Done => red("✗ Plan Failed"),
        RunState::Cancelled => yellow("■ Stopped"),
    };
    format!(
        " {}  {badge}  {}",
        bold(session.plan_name()),
        dim(&format_duration(session.elapsed()))
    )
}

/// Pane title with the live indicator while the executor is working.
fn output_title(session: &RunSession) -> String {
    if session.state() != RunState::Running {
        return "Output".to_string();
    }
    let spinner = spinner_glyph(session.spinner_frame());
    match session.active_tool_count() {
        0 => format!("Output {spinner} thinking"),
        1 => format!("Output {spinner} 1 tool running"),
        count => format!("Output {spinner} {count} tools running"),
    }
}

fn progress_header(session: &RunSession, rect: Rect) -> Vec<String> {
    let content_width = rect.content_width();
    let total = session.tasks().len();
    let done = session.completed_count();

    let counts = format!(" {done}/{total}");
    let bar_width = content_width.saturating_sub(visible_width(&counts));
    let progress = format!("{}{counts}", progress_bar(done, total, bar_width));

    let current = match session.current_task() {
        Some(task) => format!(
            "{} {} {}",
            bold(&format!("{}.", session.current_task_index())),
            task.title,
            dim(&format!(
                "(attempt {}/{})",
                session.attempt(),
                session.max_attempts()
            ))
        ),
        None => dim("Waiting for the executor…"),
    };

    let tokens = format!(
        "{} {} task · {} total · {}",
        dim("Tokens"),
        format_tokens(session.task_tokens()),
        format_tokens(session.total_tokens()),
        format_cost(session.estimated_cost())
    );

    vec![progress, current, tokens]
}

fn status_row(session: &RunSession) -> String {
    let hints = "tab focus · ↑↓ pgup pgdn scroll";
    match session.state() {
        RunState::Running => format!(" {}", dim(&format!("s stop · {hints}"))),
        RunState::Cancelling => format!(" {} {}", yellow("Stopping…"), dim(hints)),
        RunState::Done | RunState::Cancelled => {
            let message = session.final_message().unwrap_or_default();
            let message = match session.state() {
                RunState::Cancelled => yellow(message),
                _ if session.final_success() => green(message),
                _ => red(message),
            };
            format!(" {message}  {}", dim("enter home · q quit"))
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
