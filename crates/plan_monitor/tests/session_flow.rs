mod support;

use std::fs;
use std::sync::{Arc, Mutex};

use plan_executor::{ExecutionContext, ExecutorError, Plan, PlanExecutor, RunOutcome};
use plan_executor_mock::ScriptedExecutor;
use plan_monitor::{
    MonitorComponent, MonitorController, MonitorSignal, RunSession, RunState, TaskStatus,
};
use pretty_assertions::assert_eq;
use support::{inject_input, lock_unpoisoned, plan, pump_until, rendered_output, test_tui};

const HAPPY_PATH: &str = r#"{
    "id": "happy",
    "name": "Happy path",
    "max_attempts": 3,
    "tasks": [
        {
            "id": "t1",
            "title": "Set up workspace",
            "attempts": [
                {
                    "steps": [
                        { "type": "text", "text": "Creating the " },
                        { "type": "text", "text": "crate layout." },
                        { "type": "tool_use", "name": "Bash", "target": "cargo init" },
                        { "type": "tool_result" },
                        { "type": "usage", "input_tokens": 1200, "output_tokens": 300 }
                    ]
                }
            ]
        },
        {
            "id": "t2",
            "title": "Write the parser",
            "attempts": [
                {
                    "steps": [
                        { "type": "boundary", "in_stream": true },
                        { "type": "text", "text": "Parser written." }
                    ]
                }
            ]
        },
        { "id": "t3", "title": "Run the tests" }
    ]
}"#;

const EXHAUSTED: &str = r#"{
    "id": "retries",
    "name": "Exhausted retries",
    "max_attempts": 5,
    "tasks": [
        { "id": "t1", "title": "Task 1" },
        {
            "id": "t2",
            "title": "Task 2",
            "attempts": [
                {
                    "steps": [{ "type": "text", "text": "trying\n" }],
                    "outcome": { "type": "fail", "error": "tests failed" }
                }
            ]
        },
        { "id": "t3", "title": "Task 3" }
    ]
}"#;

fn run_script(json: &str) -> (Arc<Mutex<RunSession>>, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plan.json");
    fs::write(&path, json).expect("write script");
    let executor = ScriptedExecutor::from_path(&path).expect("script");
    let plan = executor.plan();
    let session = Arc::new(Mutex::new(RunSession::new(&plan, executor.max_attempts())));

    let (mut tui, trace) = test_tui(120, 40);
    let handle = tui.runtime_handle();
    tui.set_root(Box::new(MonitorComponent::new(
        Arc::clone(&session),
        handle.clone(),
    )));
    tui.start().expect("start");

    let controller =
        MonitorController::start(Arc::clone(&session), handle, Arc::new(executor), plan, None);
    let finished = pump_until(&mut tui, || lock_unpoisoned(&session).state().is_terminal());
    assert!(finished, "run did not finish");
    tui.render_now();
    controller.join();

    inject_input(&trace, "q");
    tui.run_once();
    tui.run_once();
    assert!(tui.is_stop_requested());
    tui.stop().expect("stop");

    assert_eq!(
        lock_unpoisoned(&session).take_signal(),
        Some(MonitorSignal::Quit)
    );
    (session, rendered_output(&trace))
}

#[test]
fn happy_path_completes_every_task() {
    let (session, screen) = run_script(HAPPY_PATH);
    let session = lock_unpoisoned(&session);

    assert_eq!(session.state(), RunState::Done);
    assert!(session.final_success());
    let message = session.final_message().expect("final message");
    assert!(message.starts_with("Completed 3/3 tasks in "), "{message}");
    let statuses: Vec<TaskStatus> = session.tasks().iter().map(|task| task.status).collect();
    assert_eq!(statuses, vec![TaskStatus::Completed; 3]);

    let output: Vec<&str> = session.stream().logical_lines().collect();
    assert_eq!(output, vec!["Creating the crate layout.", "", "Parser written."]);
    assert_eq!(session.total_tokens(), 1_500);
    assert_eq!(session.active_tool_count(), 0);
    assert!(screen.contains("Plan Completed"));
}

#[test]
fn exhausted_retries_fail_the_plan() {
    let (session, screen) = run_script(EXHAUSTED);
    let session = lock_unpoisoned(&session);

    assert_eq!(session.state(), RunState::Done);
    assert!(!session.final_success());
    assert_eq!(
        session.final_message(),
        Some("Task \"Task 2\" failed after 5 attempts: tests failed")
    );
    let statuses: Vec<TaskStatus> = session.tasks().iter().map(|task| task.status).collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Pending]
    );
    let separators: Vec<&str> = session
        .timeline()
        .entries()
        .filter(|entry| entry.is_separator)
        .map(|entry| entry.text.as_str())
        .collect();
    assert_eq!(separators.len(), 6);
    assert_eq!(separators.last().copied(), Some("Task 2/3: Task 2 (Attempt 5/5)"));
    assert!(screen.contains("Plan Failed"));
}

struct ErroringExecutor;

impl PlanExecutor for ErroringExecutor {
    fn max_attempts(&self) -> u32 {
        1
    }

    fn run(&self, _plan: &Plan, _ctx: ExecutionContext) -> Result<RunOutcome, ExecutorError> {
        Err(ExecutorError::Setup("no workspace".to_string()))
    }
}

struct PanickingExecutor;

impl PlanExecutor for PanickingExecutor {
    fn max_attempts(&self) -> u32 {
        1
    }

    fn run(&self, _plan: &Plan, _ctx: ExecutionContext) -> Result<RunOutcome, ExecutorError> {
        panic!("executor exploded");
    }
}

struct SilentExecutor;

impl PlanExecutor for SilentExecutor {
    fn max_attempts(&self) -> u32 {
        1
    }

    fn run(&self, _plan: &Plan, _ctx: ExecutionContext) -> Result<RunOutcome, ExecutorError> {
        Ok(RunOutcome::Finished)
    }
}

fn run_headless(executor: Arc<dyn PlanExecutor>) -> Arc<Mutex<RunSession>> {
    let plan = plan(2);
    let session = Arc::new(Mutex::new(RunSession::new(&plan, executor.max_attempts())));
    let (tui, _trace) = test_tui(80, 24);
    let controller =
        MonitorController::start(Arc::clone(&session), tui.runtime_handle(), executor, plan, None);
    controller.join();
    controller.flush_pending_messages();
    assert!(controller.is_finished());
    session
}

#[test]
fn executor_errors_become_internal_failures() {
    let session = run_headless(Arc::new(ErroringExecutor));
    let session = lock_unpoisoned(&session);
    assert_eq!(session.state(), RunState::Done);
    assert_eq!(
        session.final_message(),
        Some("Internal error: executor setup failed: no workspace")
    );
}

#[test]
fn executor_panics_do_not_escape_the_worker() {
    let session = run_headless(Arc::new(PanickingExecutor));
    let session = lock_unpoisoned(&session);
    assert_eq!(session.state(), RunState::Done);
    assert_eq!(
        session.final_message(),
        Some("Internal error: executor panicked")
    );
}

#[test]
fn missing_plan_result_is_reported() {
    let session = run_headless(Arc::new(SilentExecutor));
    let session = lock_unpoisoned(&session);
    assert!(!session.final_success());
    assert_eq!(
        session.final_message(),
        Some("Executor finished without reporting a plan result")
    );
}
