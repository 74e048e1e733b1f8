//! Messages posted from the worker side to the render loop.

use std::time::Duration;

use plan_executor::CancelHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanResult {
    Completed {
        succeeded: usize,
        total: usize,
        duration: Duration,
    },
    Failed {
        message: String,
    },
}

/// One immutable update for the run session, applied in post order.
#[derive(Debug)]
pub enum MonitorMessage {
    ExecutorStarted(CancelHandle),
    TaskStarted {
        index: usize,
        total: usize,
        task_id: String,
        title: String,
        attempt: u32,
    },
    TaskCompleted {
        task_id: String,
    },
    TaskFailed {
        task_id: String,
        attempt: u32,
        error: String,
    },
    ToolUse {
        name: String,
        target: Option<String>,
    },
    ToolResult,
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    },
    AssistantBoundary,
    Output(String),
    PlanDone(PlanResult),
    PlanCancelled,
    SpinnerTick,
}
