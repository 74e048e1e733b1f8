//! Deterministic scripted implementation of the `plan_executor` contract.
//!
//! A JSON script lists the plan's tasks and, per task, the attempts to play back: a sequence
//! of stream steps followed by an outcome. Intended for local runs of the monitor and for
//! contract-level integration tests.
//!
//! ```json
//! {
//!   "name": "Demo",
//!   "max_attempts": 3,
//!   "step_delay_ms": 40,
//!   "tasks": [
//!     {
//!       "id": "setup",
//!       "title": "Set up workspace",
//!       "attempts": [
//!         {
//!           "steps": [
//!             { "type": "text", "text": "Creating the crate layout." },
//!             { "type": "tool_use", "name": "Bash", "target": "cargo init" },
//!             { "type": "tool_result" },
//!             { "type": "usage", "input_tokens": 1200, "output_tokens": 340 }
//!           ],
//!           "outcome": { "type": "complete" }
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use plan_executor::{
    tool_marker, CancelHandle, CancelSignal, ExecutionContext, ExecutorError, Plan, PlanExecutor,
    PlanTask, RunOutcome,
};
use serde::Deserialize;
use thiserror::Error;

const CANCEL_POLL_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid script: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanScript {
    #[serde(default = "default_plan_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub step_delay_ms: u64,
    pub tasks: Vec<TaskScript>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskScript {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub attempts: Vec<AttemptScript>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttemptScript {
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
    #[serde(default)]
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        target: Option<String>,
    },
    ToolResult,
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        #[serde(default)]
        cost_usd: f64,
    },
    /// End of an assistant turn. `in_stream` sends the sentinel chunk instead of the hook.
    Boundary {
        #[serde(default)]
        in_stream: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptOutcome {
    #[default]
    Complete,
    Fail {
        error: String,
    },
}

fn default_plan_id() -> String {
    "scripted".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

/// Plays a [`PlanScript`] back through the executor contract.
#[derive(Debug, Clone)]
pub struct ScriptedExecutor {
    script: PlanScript,
}

impl ScriptedExecutor {
    pub fn new(script: PlanScript) -> Result<Self, ScriptError> {
        if script.max_attempts == 0 {
            return Err(ScriptError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(task) = script.tasks.iter().find(|task| task.id.trim().is_empty()) {
            return Err(ScriptError::Invalid(format!(
                "task '{}' has an empty id",
                task.title
            )));
        }
        Ok(Self { script })
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ScriptError> {
        let json = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn script(&self) -> &PlanScript {
        &self.script
    }

    /// The plan described by the script.
    pub fn plan(&self) -> Plan {
        Plan {
            id: self.script.id.clone(),
            name: self.script.name.clone(),
            tasks: self
                .script
                .tasks
                .iter()
                .map(|task| PlanTask::new(task.id.clone(), task.title.clone()))
                .collect(),
        }
    }

    fn attempt_for(&self, task: &PlanTask, attempt: u32) -> AttemptScript {
        let Some(script) = self.script.tasks.iter().find(|script| script.id == task.id) else {
            return AttemptScript::default();
        };
        let index = attempt.saturating_sub(1) as usize;
        script
            .attempts
            .get(index)
            .or_else(|| script.attempts.last())
            .cloned()
            .unwrap_or_default()
    }

    fn play_step(&self, step: &ScriptStep, ctx: &ExecutionContext) {
        match step {
            ScriptStep::Text { text } => ctx.output.send(text.as_str()),
            ScriptStep::ToolUse { name, target } => {
                ctx.output.send(tool_marker(name));
                ctx.hooks.on_tool_use(name, target.as_deref());
            }
            ScriptStep::ToolResult => ctx.hooks.on_tool_result(),
            ScriptStep::Usage {
                input_tokens,
                output_tokens,
                cost_usd,
            } => ctx.hooks.on_usage(*input_tokens, *output_tokens, *cost_usd),
            ScriptStep::Boundary { in_stream: true } => ctx.output.assistant_boundary(),
            ScriptStep::Boundary { in_stream: false } => ctx.hooks.on_assistant_boundary(),
        }
    }

    /// Sleeps for the step delay; returns `false` as soon as cancellation is observed.
    fn pause(&self, cancel: &AtomicBool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(self.script.step_delay_ms);
        loop {
            if cancel.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(CANCEL_POLL_MS)));
        }
    }
}

impl PlanExecutor for ScriptedExecutor {
    fn max_attempts(&self) -> u32 {
        self.script.max_attempts
    }

    fn run(&self, plan: &Plan, mut ctx: ExecutionContext) -> Result<RunOutcome, ExecutorError> {
        let started_at = Instant::now();
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
        ctx.report_started(CancelHandle::from_signal(Arc::clone(&cancel)));
        tracing::debug!(plan = %plan.id, tasks = plan.tasks.len(), "scripted run started");

        let total = plan.tasks.len();
        let max_attempts = self.max_attempts();
        let mut succeeded = 0;

        for (index, task) in plan.tasks.iter().enumerate() {
            let mut attempt = 1;
            loop {
                if cancel.load(Ordering::SeqCst) {
                    tracing::debug!(task = %task.id, "scripted run cancelled");
                    return Ok(RunOutcome::Cancelled);
                }
                ctx.callbacks.on_task_start(index + 1, total, task, attempt);

                let script = self.attempt_for(task, attempt);
                for step in &script.steps {
                    if !self.pause(&cancel) {
                        tracing::debug!(task = %task.id, attempt, "scripted run cancelled");
                        return Ok(RunOutcome::Cancelled);
                    }
                    self.play_step(step, &ctx);
                }

                match script.outcome {
                    AttemptOutcome::Complete => {
                        ctx.callbacks.on_task_complete(task);
                        succeeded += 1;
                        break;
                    }
                    AttemptOutcome::Fail { error } => {
                        ctx.callbacks.on_task_failed(task, attempt, &error);
                        if attempt >= max_attempts {
                            let reason = format!(
                                "Task \"{}\" failed after {attempt} attempts: {error}",
                                task.title
                            );
                            ctx.callbacks.on_plan_failed(task, &reason);
                            return Ok(RunOutcome::Finished);
                        }
                        attempt += 1;
                    }
                }
            }
        }

        ctx.callbacks
            .on_plan_complete(succeeded, total, started_at.elapsed());
        Ok(RunOutcome::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttemptOutcome, ScriptError, ScriptStep, ScriptedExecutor};

    #[test]
    fn parses_steps_and_defaults() {
        let executor = ScriptedExecutor::from_json(
            r#"{
                "name": "Demo",
                "tasks": [
                    {
                        "id": "a",
                        "title": "First",
                        "attempts": [
                            {
                                "steps": [
                                    { "type": "tool_use", "name": "Read" },
                                    { "type": "boundary", "in_stream": true },
                                    { "type": "usage", "input_tokens": 1, "output_tokens": 2 }
                                ],
                                "outcome": { "type": "fail", "error": "boom" }
                            }
                        ]
                    }
                ]
            }"#,
        )
        .expect("script");

        let script = executor.script();
        assert_eq!(script.id, "scripted");
        assert_eq!(script.max_attempts, 3);
        assert_eq!(script.step_delay_ms, 0);
        let attempt = &script.tasks[0].attempts[0];
        assert_eq!(
            attempt.steps[0],
            ScriptStep::ToolUse {
                name: "Read".to_string(),
                target: None
            }
        );
        assert_eq!(attempt.steps[1], ScriptStep::Boundary { in_stream: true });
        assert_eq!(
            attempt.outcome,
            AttemptOutcome::Fail {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = ScriptedExecutor::from_json(r#"{"name": "x", "max_attempts": 0, "tasks": []}"#)
            .expect_err("invalid");
        assert!(matches!(err, ScriptError::Invalid(_)));
    }

    #[test]
    fn reports_parse_errors() {
        let err = ScriptedExecutor::from_json("{").expect_err("parse");
        assert!(matches!(err, ScriptError::Parse(_)));
    }
}
