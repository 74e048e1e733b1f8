//! Worker side of a run: drives the executor off the render loop and posts messages back.
//!
//! The session is only mutated by [`DrainMessagesCommand`] on the render loop thread (or by
//! [`MessageQueue::flush_pending_messages`] for headless callers). Worker, listener and
//! ticker threads only ever touch the queue.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use plan_executor::{
    output_channel, CancelHandle, ExecutionContext, ExecutorCallbacks, OutputSink, Plan,
    PlanExecutor, PlanTask, RunOutcome, StreamHooks,
};
use plan_tui::{Command, CustomCommand, CustomCommandCtx, CustomCommandError, RuntimeHandle};

use crate::messages::{MonitorMessage, PlanResult};
use crate::session::RunSession;

const MISSING_RESULT: &str = "Executor finished without reporting a plan result";

/// Ordered hand-off from worker threads to the render loop.
pub struct MessageQueue {
    pending: Mutex<VecDeque<MonitorMessage>>,
    session: Arc<Mutex<RunSession>>,
    runtime_handle: RuntimeHandle,
}

impl MessageQueue {
    pub fn new(session: Arc<Mutex<RunSession>>, runtime_handle: RuntimeHandle) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(VecDeque::new()),
            session,
            runtime_handle,
        })
    }

    /// Enqueues `message`; the first message after an empty queue schedules a drain on the
    /// render loop.
    pub fn post(self: &Arc<Self>, message: MonitorMessage) {
        let should_drain = {
            let mut pending = lock_unpoisoned(&self.pending);
            let should_drain = pending.is_empty();
            pending.push_back(message);
            should_drain
        };

        if should_drain {
            self.runtime_handle
                .dispatch(Command::Custom(Box::new(DrainMessagesCommand {
                    queue: Arc::clone(self),
                })));
        }
    }

    pub fn pending_len(&self) -> usize {
        lock_unpoisoned(&self.pending).len()
    }

    fn drain(&self) -> usize {
        let mut drained = 0usize;
        loop {
            let message = lock_unpoisoned(&self.pending).pop_front();
            let Some(message) = message else {
                break;
            };
            lock_unpoisoned(&self.session).apply(message);
            drained += 1;
        }
        drained
    }

    /// Applies queued messages synchronously and schedules a render.
    ///
    /// For callers that never run the render loop, such as headless tests.
    pub fn flush_pending_messages(&self) -> usize {
        let drained = self.drain();
        if drained > 0 {
            self.runtime_handle.dispatch(Command::RequestRender);
        }
        drained
    }
}

struct DrainMessagesCommand {
    queue: Arc<MessageQueue>,
}

impl CustomCommand for DrainMessagesCommand {
    fn name(&self) -> &'static str {
        "drain_monitor_messages"
    }

    fn apply(self: Box<Self>, ctx: &mut CustomCommandCtx) -> Result<(), CustomCommandError> {
        if self.queue.drain() > 0 {
            ctx.request_render();
        }
        Ok(())
    }
}

/// Translates executor callbacks and stream hooks into messages.
///
/// The plan result is held back until the output stream has been fully drained, so the
/// last chunks land before the session turns terminal. Assistant boundaries are written
/// into the output stream so they stay ordered with the text around them.
struct WorkerCallbacks {
    queue: Arc<MessageQueue>,
    output: Mutex<Option<OutputSink>>,
    result: Mutex<Option<PlanResult>>,
}

impl WorkerCallbacks {
    /// Drops the boundary sender so the output stream can close.
    fn close_output(&self) {
        lock_unpoisoned(&self.output).take();
    }

    fn take_result(&self) -> Option<PlanResult> {
        lock_unpoisoned(&self.result).take()
    }

    fn store_result(&self, result: PlanResult) {
        let mut slot = lock_unpoisoned(&self.result);
        if slot.is_none() {
            *slot = Some(result);
        }
    }
}

impl ExecutorCallbacks for WorkerCallbacks {
    fn on_task_start(&self, task_num: usize, total: usize, task: &PlanTask, attempt: u32) {
        self.queue.post(MonitorMessage::TaskStarted {
            index: task_num,
            total,
            task_id: task.id.clone(),
            title: task.title.clone(),
            attempt,
        });
    }

    fn on_task_complete(&self, task: &PlanTask) {
        self.queue.post(MonitorMessage::TaskCompleted {
            task_id: task.id.clone(),
        });
    }

    fn on_task_failed(&self, task: &PlanTask, attempt: u32, error: &str) {
        self.queue.post(MonitorMessage::TaskFailed {
            task_id: task.id.clone(),
            attempt,
            error: error.to_string(),
        });
    }

    fn on_plan_complete(&self, succeeded: usize, total: usize, duration: Duration) {
        self.store_result(PlanResult::Completed {
            succeeded,
            total,
            duration,
        });
    }

    fn on_plan_failed(&self, task: &PlanTask, reason: &str) {
        tracing::debug!(task = %task.id, reason, "executor reported plan failure");
        self.store_result(PlanResult::Failed {
            message: reason.to_string(),
        });
    }
}

impl StreamHooks for WorkerCallbacks {
    fn on_tool_use(&self, name: &str, target: Option<&str>) {
        self.queue.post(MonitorMessage::ToolUse {
            name: name.to_string(),
            target: target.map(str::to_string),
        });
    }

    fn on_tool_result(&self) {
        self.queue.post(MonitorMessage::ToolResult);
    }

    fn on_usage(&self, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        self.queue.post(MonitorMessage::Usage {
            input_tokens,
            output_tokens,
            cost_usd,
        });
    }

    fn on_assistant_boundary(&self) {
        let sink = lock_unpoisoned(&self.output).clone();
        if let Some(sink) = sink {
            sink.assistant_boundary();
        }
    }
}

/// Blocking reader over the executor's output channel.
pub struct OutputListener {
    receiver: Receiver<String>,
}

impl OutputListener {
    pub fn new(receiver: Receiver<String>) -> Self {
        Self { receiver }
    }

    /// Blocks for the next chunk; `None` once every sender is gone.
    pub fn listen(&self) -> Option<String> {
        self.receiver.recv().ok()
    }
}

/// Owns the threads of one run.
pub struct MonitorController {
    queue: Arc<MessageQueue>,
    worker: Mutex<Option<JoinHandle<()>>>,
    finished: Arc<AtomicBool>,
}

impl MonitorController {
    /// Starts the executor on a worker thread.
    ///
    /// Never fails: if a thread cannot be spawned, the failure is posted as the plan result.
    pub fn start(
        session: Arc<Mutex<RunSession>>,
        runtime_handle: RuntimeHandle,
        executor: Arc<dyn PlanExecutor>,
        plan: Plan,
        spinner_interval: Option<Duration>,
    ) -> Arc<Self> {
        let queue = MessageQueue::new(session, runtime_handle);
        let finished = Arc::new(AtomicBool::new(false));

        let worker_queue = Arc::clone(&queue);
        let worker_finished = Arc::clone(&finished);
        let plan_id = plan.id.clone();
        let worker = thread::Builder::new()
            .name(format!("plan-monitor-worker-{plan_id}"))
            .spawn(move || {
                let message = run_worker(&worker_queue, executor.as_ref(), &plan);
                worker_queue.post(message);
                worker_finished.store(true, Ordering::SeqCst);
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(error) => {
                tracing::error!(plan = %plan_id, %error, "failed to spawn executor worker");
                queue.post(MonitorMessage::PlanDone(PlanResult::Failed {
                    message: format!("Internal error: failed to start executor: {error}"),
                }));
                finished.store(true, Ordering::SeqCst);
                None
            }
        };

        if let Some(interval) = spinner_interval {
            spawn_ticker(Arc::clone(&queue), Arc::clone(&finished), interval);
        }

        Arc::new(Self {
            queue,
            worker: Mutex::new(worker),
            finished,
        })
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// True once the final message has been posted.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn flush_pending_messages(&self) -> usize {
        self.queue.flush_pending_messages()
    }

    /// Waits for the worker thread to exit.
    pub fn join(&self) {
        let handle = lock_unpoisoned(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("executor worker thread panicked");
            }
        }
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

fn run_worker(
    queue: &Arc<MessageQueue>,
    executor: &dyn PlanExecutor,
    plan: &Plan,
) -> MonitorMessage {
    tracing::info!(plan = %plan.id, tasks = plan.tasks.len(), "executor worker started");

    let (sink, receiver) = output_channel();
    let listener_queue = Arc::clone(queue);
    let listener = thread::Builder::new()
        .name(format!("plan-monitor-output-{}", plan.id))
        .spawn(move || {
            let listener = OutputListener::new(receiver);
            while let Some(chunk) = listener.listen() {
                listener_queue.post(MonitorMessage::Output(chunk));
            }
        });
    let listener = match listener {
        Ok(handle) => Some(handle),
        Err(error) => {
            tracing::warn!(%error, "failed to spawn output listener; output is dropped");
            None
        }
    };

    let callbacks = Arc::new(WorkerCallbacks {
        queue: Arc::clone(queue),
        output: Mutex::new(Some(sink.clone())),
        result: Mutex::new(None),
    });
    let started_queue = Arc::clone(queue);
    let ctx = ExecutionContext::new(
        callbacks.clone(),
        callbacks.clone(),
        sink,
        move |handle: CancelHandle| started_queue.post(MonitorMessage::ExecutorStarted(handle)),
    );

    let outcome = catch_unwind(AssertUnwindSafe(|| executor.run(plan, ctx)));
    callbacks.close_output();

    if let Some(listener) = listener {
        if listener.join().is_err() {
            tracing::warn!("output listener panicked");
        }
    }

    let result = callbacks.take_result();
    let message = match outcome {
        Ok(Ok(outcome)) => match (result, outcome) {
            (Some(result), _) => MonitorMessage::PlanDone(result),
            (None, RunOutcome::Cancelled) => MonitorMessage::PlanCancelled,
            (None, RunOutcome::Finished) => MonitorMessage::PlanDone(PlanResult::Failed {
                message: MISSING_RESULT.to_string(),
            }),
        },
        Ok(Err(error)) => {
            tracing::error!(plan = %plan.id, %error, "executor returned an error");
            MonitorMessage::PlanDone(PlanResult::Failed {
                message: format!("Internal error: {error}"),
            })
        }
        Err(_) => {
            tracing::error!(plan = %plan.id, "executor panicked");
            MonitorMessage::PlanDone(PlanResult::Failed {
                message: "Internal error: executor panicked".to_string(),
            })
        }
    };
    tracing::info!(plan = %plan.id, "executor worker finished");
    message
}

fn spawn_ticker(queue: Arc<MessageQueue>, finished: Arc<AtomicBool>, interval: Duration) {
    let spawned = thread::Builder::new()
        .name("plan-monitor-spinner".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            if finished.load(Ordering::SeqCst) {
                break;
            }
            queue.post(MonitorMessage::SpinnerTick);
        });
    if let Err(error) = spawned {
        tracing::warn!(%error, "failed to spawn spinner ticker");
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
