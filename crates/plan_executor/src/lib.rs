//! Contract between a plan executor and the views that supervise it.
//!
//! An executor runs the tasks of a [`Plan`] in order, possibly retrying each one, and reports
//! progress through [`ExecutorCallbacks`], optional [`StreamHooks`], and a bounded stream of
//! raw output chunks. Once its background run has actually started it hands back a
//! [`CancelHandle`]. How tasks are executed or retried is up to the implementation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Capacity of the raw output channel created by [`output_channel`].
pub const OUTPUT_CHANNEL_CAPACITY: usize = 100;

/// Sentinel chunk marking the end of one assistant turn in the output stream.
pub const ASSISTANT_BOUNDARY: &str = "\u{1e}assistant-boundary\u{1e}";

/// Shared cancellation flag observed by an executor between steps.
pub type CancelSignal = Arc<AtomicBool>;

/// One unit of work in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTask {
    pub id: String,
    pub title: String,
}

impl PlanTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// An ordered list of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub tasks: Vec<PlanTask>,
}

/// Lifecycle callbacks. Task numbers are 1-based; attempts are 1-based.
pub trait ExecutorCallbacks: Send + Sync {
    fn on_task_start(&self, task_num: usize, total: usize, task: &PlanTask, attempt: u32);

    fn on_task_complete(&self, task: &PlanTask);

    /// Called for every failed attempt, including the last one.
    fn on_task_failed(&self, task: &PlanTask, attempt: u32, error: &str);

    fn on_plan_complete(&self, succeeded: usize, total: usize, duration: Duration);

    /// Called once when a task exhausted its attempts and the plan stopped.
    fn on_plan_failed(&self, task: &PlanTask, reason: &str);
}

/// Optional telemetry from the agent stream. Every hook defaults to a no-op.
pub trait StreamHooks: Send + Sync {
    fn on_tool_use(&self, _name: &str, _target: Option<&str>) {}

    fn on_tool_result(&self) {}

    fn on_usage(&self, _input_tokens: u64, _output_tokens: u64, _cost_usd: f64) {}

    fn on_assistant_boundary(&self) {}
}

/// Hooks that ignore everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl StreamHooks for NoopHooks {}

/// One-shot cancellation. Consumed when invoked, so it cannot run twice.
pub struct CancelHandle(Box<dyn FnOnce() + Send>);

impl CancelHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(cancel))
    }

    /// A handle that raises `signal`.
    pub fn from_signal(signal: CancelSignal) -> Self {
        Self::new(move || signal.store(true, Ordering::SeqCst))
    }

    pub fn cancel(self) {
        (self.0)()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelHandle(..)")
    }
}

/// Formats the control chunk an executor writes when a tool is invoked.
pub fn tool_marker(name: &str) -> String {
    format!("\n[Tool: {name}]")
}

/// Sending half of the raw output stream.
///
/// Sends block while the channel is full and are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct OutputSink {
    sender: SyncSender<String>,
}

impl OutputSink {
    pub fn new(sender: SyncSender<String>) -> Self {
        Self { sender }
    }

    pub fn send(&self, chunk: impl Into<String>) {
        let _ = self.sender.send(chunk.into());
    }

    pub fn assistant_boundary(&self) {
        self.send(ASSISTANT_BOUNDARY);
    }
}

/// Creates the bounded output channel shared by an executor and its listener.
pub fn output_channel() -> (OutputSink, Receiver<String>) {
    let (sender, receiver) = sync_channel(OUTPUT_CHANNEL_CAPACITY);
    (OutputSink::new(sender), receiver)
}

type StartedFn = Box<dyn FnOnce(CancelHandle) + Send>;

/// Everything an executor reports into for one run.
///
/// Dropping the context drops its [`OutputSink`]; once every clone is gone the output stream
/// is closed.
pub struct ExecutionContext {
    pub callbacks: Arc<dyn ExecutorCallbacks>,
    pub hooks: Arc<dyn StreamHooks>,
    pub output: OutputSink,
    on_started: Option<StartedFn>,
}

impl ExecutionContext {
    pub fn new(
        callbacks: Arc<dyn ExecutorCallbacks>,
        hooks: Arc<dyn StreamHooks>,
        output: OutputSink,
        on_started: impl FnOnce(CancelHandle) + Send + 'static,
    ) -> Self {
        Self {
            callbacks,
            hooks,
            output,
            on_started: Some(Box::new(on_started)),
        }
    }

    /// Hands the cancellation handle to the supervisor. Only the first call is delivered.
    pub fn report_started(&mut self, handle: CancelHandle) {
        if let Some(on_started) = self.on_started.take() {
            on_started(handle);
        }
    }

    pub fn has_reported_started(&self) -> bool {
        self.on_started.is_none()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("output", &self.output)
            .field("reported_started", &self.has_reported_started())
            .finish_non_exhaustive()
    }
}

/// How a run ended when the executor itself did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The plan ran to completion or failure; a plan callback was issued.
    Finished,
    /// The run unwound after cancellation.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor setup failed: {0}")]
    Setup(String),

    #[error("internal executor error: {0}")]
    Internal(String),
}

pub trait PlanExecutor: Send + Sync + 'static {
    /// Attempts allowed per task, shown as "Attempt a/max".
    fn max_attempts(&self) -> u32;

    /// Runs `plan` to completion, failure or cancellation on the calling thread.
    fn run(&self, plan: &Plan, ctx: ExecutionContext) -> Result<RunOutcome, ExecutorError>;
}
