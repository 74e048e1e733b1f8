//! Run session: the root state machine of one plan run.
//!
//! Owned by the render loop. Worker-side code never touches it directly; it posts
//! [`MonitorMessage`]s that are applied here in order.

use std::time::{Duration, Instant};

use plan_executor::{CancelHandle, Plan};
use plan_tui::{truncate_to_width, InputEvent};

use crate::layout::{compute_layout, Layout};
use crate::messages::{MonitorMessage, PlanResult};
use crate::pane::ScrollPane;
use crate::render::{dim, format_duration, green, red, shorten_target, spinner_glyph, yellow};
use crate::stream::StreamReconstructor;
use crate::timeline::{self, Timeline};

/// Fallback blended rate when the executor reports no cost: $6.00 per million tokens.
pub const BLENDED_RATE_PER_TOKEN: f64 = 6.0 / 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Cancelling,
    Done,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Output,
    Activity,
    Tasks,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Self::Output => Self::Activity,
            Self::Activity => Self::Tasks,
            Self::Tasks => Self::Output,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Output => Self::Tasks,
            Self::Activity => Self::Output,
            Self::Tasks => Self::Activity,
        }
    }
}

/// Requests for the host once the run is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSignal {
    NavigateHome,
    Quit,
}

#[derive(Debug)]
pub struct RunSession {
    state: RunState,
    plan_id: String,
    plan_name: String,
    tasks: Vec<TaskEntry>,
    current_task_index: usize,
    attempt: u32,
    max_attempts: u32,
    start_time: Instant,
    end_time: Option<Instant>,

    timeline: Timeline,
    stream: StreamReconstructor,

    task_tokens: u64,
    total_tokens: u64,
    estimated_cost: f64,
    active_tool_count: usize,

    final_success: bool,
    final_message: Option<String>,

    cancel: Option<CancelHandle>,
    cancel_requested: bool,

    focus: Focus,
    output_pane: ScrollPane,
    activity_pane: ScrollPane,
    tasks_pane: ScrollPane,
    layout: Layout,
    size: Option<(usize, usize)>,
    spinner_frame: usize,
    signal: Option<MonitorSignal>,
}

impl RunSession {
    pub fn new(plan: &Plan, max_attempts: u32) -> Self {
        let mut session = Self {
            state: RunState::Running,
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            tasks: plan
                .tasks
                .iter()
                .map(|task| TaskEntry {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    status: TaskStatus::Pending,
                })
                .collect(),
            current_task_index: 0,
            attempt: 0,
            max_attempts: max_attempts.max(1),
            start_time: Instant::now(),
            end_time: None,
            timeline: Timeline::new(),
            stream: StreamReconstructor::new(),
            task_tokens: 0,
            total_tokens: 0,
            estimated_cost: 0.0,
            active_tool_count: 0,
            final_success: false,
            final_message: None,
            cancel: None,
            cancel_requested: false,
            focus: Focus::Output,
            output_pane: ScrollPane::new(),
            activity_pane: ScrollPane::new(),
            tasks_pane: ScrollPane::new(),
            layout: Layout::default(),
            size: None,
            spinner_frame: 0,
            signal: None,
        };
        session.sync_all();
        session
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    pub fn tasks(&self) -> &[TaskEntry] {
        &self.tasks
    }

    pub fn completed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Completed)
            .count()
    }

    /// 1-based; 0 until the first task starts.
    pub fn current_task_index(&self) -> usize {
        self.current_task_index
    }

    pub fn current_task(&self) -> Option<&TaskEntry> {
        self.current_task_index
            .checked_sub(1)
            .and_then(|index| self.tasks.get(index))
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.end_time
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.start_time)
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn stream(&self) -> &StreamReconstructor {
        &self.stream
    }

    pub fn task_tokens(&self) -> u64 {
        self.task_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn estimated_cost(&self) -> f64 {
        self.estimated_cost
    }

    pub fn active_tool_count(&self) -> usize {
        self.active_tool_count
    }

    pub fn final_success(&self) -> bool {
        self.final_success
    }

    pub fn final_message(&self) -> Option<&str> {
        self.final_message.as_deref()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn has_cancel_handle(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn spinner_frame(&self) -> usize {
        self.spinner_frame
    }

    pub fn pane(&self, focus: Focus) -> &ScrollPane {
        match focus {
            Focus::Output => &self.output_pane,
            Focus::Activity => &self.activity_pane,
            Focus::Tasks => &self.tasks_pane,
        }
    }

    pub fn pane_mut(&mut self, focus: Focus) -> &mut ScrollPane {
        match focus {
            Focus::Output => &mut self.output_pane,
            Focus::Activity => &mut self.activity_pane,
            Focus::Tasks => &mut self.tasks_pane,
        }
    }

    pub fn set_signal(&mut self, signal: MonitorSignal) {
        self.signal = Some(signal);
    }

    pub fn signal(&self) -> Option<MonitorSignal> {
        self.signal
    }

    pub fn take_signal(&mut self) -> Option<MonitorSignal> {
        self.signal.take()
    }

    pub fn handle_event(&mut self, event: &InputEvent) {
        crate::input::handle_event(self, event);
    }

    /// Applies one worker message.
    pub fn apply(&mut self, message: MonitorMessage) {
        match message {
            MonitorMessage::ExecutorStarted(handle) => self.on_executor_started(handle),
            MonitorMessage::TaskStarted {
                index,
                total,
                task_id,
                title,
                attempt,
            } => self.on_task_started(index, total, &task_id, &title, attempt),
            MonitorMessage::TaskCompleted { task_id } => self.on_task_completed(&task_id),
            MonitorMessage::TaskFailed {
                task_id,
                attempt,
                error,
            } => self.on_task_failed(&task_id, attempt, &error),
            MonitorMessage::ToolUse { name, target } => self.on_tool_use(&name, target.as_deref()),
            MonitorMessage::ToolResult => self.on_tool_result(),
            MonitorMessage::Usage {
                input_tokens,
                output_tokens,
                cost_usd,
            } => self.on_usage(input_tokens, output_tokens, cost_usd),
            MonitorMessage::AssistantBoundary => self.on_assistant_boundary(),
            MonitorMessage::Output(chunk) => self.on_output(&chunk),
            MonitorMessage::PlanDone(result) => self.on_plan_done(result),
            MonitorMessage::PlanCancelled => self.on_plan_cancelled(),
            MonitorMessage::SpinnerTick => self.on_spinner_tick(),
        }
    }

    /// User stop request. Idempotent; only a running session moves to Cancelling.
    pub fn request_stop(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        self.state = RunState::Cancelling;
        self.cancel_requested = true;
        match self.cancel.take() {
            Some(handle) => {
                tracing::info!(plan = %self.plan_id, "stop requested; cancelling executor");
                handle.cancel();
            }
            None => {
                tracing::info!(plan = %self.plan_id, "stop requested before executor started");
            }
        }
        true
    }

    pub fn on_executor_started(&mut self, handle: CancelHandle) {
        match self.state {
            RunState::Running => self.cancel = Some(handle),
            RunState::Cancelling => {
                tracing::info!(plan = %self.plan_id, "executor started after stop; cancelling");
                handle.cancel();
            }
            RunState::Done | RunState::Cancelled => {}
        }
    }

    pub fn on_task_started(
        &mut self,
        index: usize,
        total: usize,
        task_id: &str,
        title: &str,
        attempt: u32,
    ) {
        if self.state.is_terminal() {
            return;
        }
        self.current_task_index = index;
        self.attempt = attempt;

        let position = self
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .or_else(|| index.checked_sub(1).filter(|index| *index < self.tasks.len()));
        if let Some(task) = position.and_then(|position| self.tasks.get_mut(position)) {
            if matches!(task.status, TaskStatus::Pending | TaskStatus::Running) {
                task.status = TaskStatus::Running;
            }
        }

        self.timeline.push_separator(
            format!(
                "Task {index}/{total}: {title} (Attempt {attempt}/{})",
                self.max_attempts
            ),
            timeline::now(),
        );
        self.task_tokens = 0;
        self.active_tool_count = 0;
        tracing::debug!(task = task_id, index, attempt, "task started");

        self.sync_activity();
        self.sync_tasks();
    }

    pub fn on_task_completed(&mut self, task_id: &str) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(task) = self
            .tasks
            .iter_mut()
            .find(|task| task.status == TaskStatus::Running)
        {
            task.status = TaskStatus::Completed;
        }
        tracing::debug!(task = task_id, "task completed");
        self.sync_tasks();
    }

    /// A failed attempt only fails the task once retries are exhausted.
    pub fn on_task_failed(&mut self, task_id: &str, attempt: u32, error: &str) {
        if self.state.is_terminal() {
            return;
        }
        tracing::debug!(task = task_id, attempt, error, "task attempt failed");
        if attempt < self.max_attempts {
            return;
        }
        if let Some(task) = self
            .tasks
            .iter_mut()
            .find(|task| task.status == TaskStatus::Running)
        {
            task.status = TaskStatus::Failed;
        }
        self.sync_tasks();
    }

    pub fn on_tool_use(&mut self, name: &str, target: Option<&str>) {
        if self.state.is_terminal() {
            return;
        }
        let target = target.map(shorten_target).filter(|target| !target.is_empty());
        let text = match target {
            Some(target) => format!("{name}: {target}"),
            None => name.to_string(),
        };
        self.timeline.push_tool(text, timeline::now());
        self.active_tool_count += 1;
        self.sync_activity();
    }

    pub fn on_tool_result(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.timeline.mark_latest_done();
        self.active_tool_count = self.active_tool_count.saturating_sub(1);
        self.sync_activity();
    }

    pub fn on_usage(&mut self, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        if self.state.is_terminal() {
            return;
        }
        let tokens = input_tokens.saturating_add(output_tokens);
        self.task_tokens = tokens;
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        if cost_usd > 0.0 {
            self.estimated_cost += cost_usd;
        } else {
            self.estimated_cost = self.total_tokens as f64 * BLENDED_RATE_PER_TOKEN;
        }
    }

    pub fn on_assistant_boundary(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.stream.mark_boundary();
    }

    pub fn on_output(&mut self, chunk: &str) {
        if self.state.is_terminal() {
            return;
        }
        self.stream.push_chunk(chunk);
        self.sync_output();
    }

    pub fn on_plan_done(&mut self, result: PlanResult) {
        if self.state.is_terminal() {
            return;
        }
        let (success, message) = match result {
            PlanResult::Completed {
                succeeded,
                total,
                duration,
            } => (
                true,
                format!(
                    "Completed {succeeded}/{total} tasks in {}",
                    format_duration(duration)
                ),
            ),
            PlanResult::Failed { message } => (false, message),
        };
        tracing::info!(plan = %self.plan_id, success, %message, "plan finished");
        self.finish(RunState::Done, success, message);
    }

    /// Executor acknowledged cancellation.
    pub fn on_plan_cancelled(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let message = format!(
            "Stopped. Completed {}/{} tasks.",
            self.completed_count(),
            self.tasks.len()
        );
        tracing::info!(plan = %self.plan_id, %message, "plan cancelled");
        self.finish(RunState::Cancelled, false, message);
    }

    fn finish(&mut self, state: RunState, success: bool, message: String) {
        self.state = state;
        self.active_tool_count = 0;
        self.final_success = success;
        self.final_message = Some(message);
        self.end_time = Some(Instant::now());
        self.cancel = None;
        self.sync_activity();
        self.sync_tasks();
    }

    pub fn on_spinner_tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
        self.sync_activity();
        if !self.state.is_terminal() {
            self.sync_tasks();
        }
    }

    /// Recomputes the layout for a new terminal size and resizes the panes.
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.size == Some((width, height)) {
            return;
        }
        self.size = Some((width, height));
        self.layout = compute_layout(width, height);

        let output = self.layout.output;
        let activity = self.layout.activity;
        self.output_pane
            .set_size(output.content_width(), output.content_height());
        self.activity_pane
            .set_size(activity.content_width(), activity.content_height());
        self.tasks_pane.set_size(
            self.layout.progress.content_width(),
            self.layout.task_list_height(),
        );
        self.sync_all();
    }

    fn sync_all(&mut self) {
        self.sync_output();
        self.sync_activity();
        self.sync_tasks();
    }

    fn sync_output(&mut self) {
        let lines = self.stream.wrapped_lines(self.output_pane.width());
        self.output_pane.set_lines(lines);
    }

    fn sync_activity(&mut self) {
        let spinner = (self.state == RunState::Running).then(|| spinner_glyph(self.spinner_frame));
        let lines = self
            .timeline
            .render_lines(self.activity_pane.width(), spinner);
        self.activity_pane.set_lines(lines);
    }

    fn sync_tasks(&mut self) {
        let width = self.tasks_pane.width();
        let spinner = spinner_glyph(self.spinner_frame);
        let running = self.state == RunState::Running;
        let lines = self
            .tasks
            .iter()
            .map(|task| {
                let glyph = match task.status {
                    TaskStatus::Pending => dim("○"),
                    TaskStatus::Running if running => yellow(spinner),
                    TaskStatus::Running => yellow("●"),
                    TaskStatus::Completed => green("✓"),
                    TaskStatus::Failed => red("✗"),
                };
                truncate_to_width(&format!("{glyph} {}", task.title), width, "…", false)
            })
            .collect();
        self.tasks_pane.set_lines(lines);
        self.tasks_pane
            .ensure_visible(self.current_task_index.saturating_sub(1), false);
    }
}
