mod support;

use std::sync::{Arc, Mutex};

use plan_executor::PlanExecutor;
use plan_executor_mock::ScriptedExecutor;
use plan_monitor::{MonitorComponent, MonitorController, RunSession, RunState};
use support::{
    inject_input, lock_unpoisoned, plan, pump_until, test_tui, wait_until, GatedExecutor,
};

fn headless(
    executor: Arc<GatedExecutor>,
) -> (Arc<Mutex<RunSession>>, Arc<MonitorController>) {
    let plan = plan(3);
    let session = Arc::new(Mutex::new(RunSession::new(&plan, executor.max_attempts())));
    let (tui, _trace) = test_tui(80, 24);
    let controller = MonitorController::start(
        Arc::clone(&session),
        tui.runtime_handle(),
        executor,
        plan,
        None,
    );
    (session, controller)
}

fn state(session: &Arc<Mutex<RunSession>>) -> RunState {
    lock_unpoisoned(session).state()
}

#[test]
fn stop_before_executor_started_cancels_on_arrival() {
    let executor = Arc::new(GatedExecutor::default());
    let (session, controller) = headless(Arc::clone(&executor));

    assert!(wait_until(|| executor.entered()));
    assert!(lock_unpoisoned(&session).request_stop());
    controller.flush_pending_messages();
    assert_eq!(state(&session), RunState::Cancelling);
    assert!(!lock_unpoisoned(&session).has_cancel_handle());

    executor.open_gate();
    let cancelled = wait_until(|| {
        controller.flush_pending_messages();
        state(&session) == RunState::Cancelled
    });
    assert!(cancelled, "executor never acknowledged the stop");
    controller.join();
    controller.flush_pending_messages();

    assert_eq!(executor.cancel_calls(), 1);
    assert_eq!(
        lock_unpoisoned(&session).final_message(),
        Some("Stopped. Completed 0/3 tasks.")
    );
}

#[test]
fn stop_after_executor_started_invokes_handle_once() {
    let executor = Arc::new(GatedExecutor::default());
    let (session, controller) = headless(Arc::clone(&executor));
    executor.open_gate();

    assert!(wait_until(|| {
        controller.flush_pending_messages();
        lock_unpoisoned(&session).has_cancel_handle()
    }));
    assert_eq!(executor.cancel_calls(), 0);

    {
        let mut session = lock_unpoisoned(&session);
        assert!(session.request_stop());
        assert!(!session.request_stop());
        assert_eq!(session.state(), RunState::Cancelling);
    }

    assert!(wait_until(|| {
        controller.flush_pending_messages();
        state(&session) == RunState::Cancelled
    }));
    controller.join();
    assert_eq!(executor.cancel_calls(), 1);
}

const SLOW_SECOND_TASK: &str = r#"{
    "name": "Slow",
    "step_delay_ms": 50,
    "tasks": [
        { "id": "t1", "title": "Quick" },
        {
            "id": "t2",
            "title": "Slow",
            "attempts": [
                {
                    "steps": [
                        { "type": "text", "text": "1\n" },
                        { "type": "text", "text": "2\n" },
                        { "type": "text", "text": "3\n" },
                        { "type": "text", "text": "4\n" },
                        { "type": "text", "text": "5\n" },
                        { "type": "text", "text": "6\n" },
                        { "type": "text", "text": "7\n" },
                        { "type": "text", "text": "8\n" },
                        { "type": "text", "text": "9\n" },
                        { "type": "text", "text": "10\n" }
                    ]
                }
            ]
        },
        { "id": "t3", "title": "Never" }
    ]
}"#;

#[test]
fn stop_key_mid_run_reports_completed_tasks() {
    let executor = ScriptedExecutor::from_json(SLOW_SECOND_TASK).expect("script");
    let plan = executor.plan();
    let session = Arc::new(Mutex::new(RunSession::new(&plan, executor.max_attempts())));

    let (mut tui, trace) = test_tui(100, 30);
    let handle = tui.runtime_handle();
    tui.set_root(Box::new(MonitorComponent::new(
        Arc::clone(&session),
        handle.clone(),
    )));
    tui.start().expect("start");
    let controller =
        MonitorController::start(Arc::clone(&session), handle, Arc::new(executor), plan, None);

    assert!(pump_until(&mut tui, || {
        lock_unpoisoned(&session).current_task_index() == 2
    }));
    inject_input(&trace, "s");
    tui.run_once();
    assert!(matches!(
        state(&session),
        RunState::Cancelling | RunState::Cancelled
    ));

    assert!(pump_until(&mut tui, || state(&session) == RunState::Cancelled));
    controller.join();
    tui.stop().expect("stop");

    assert_eq!(
        lock_unpoisoned(&session).final_message(),
        Some("Stopped. Completed 1/3 tasks.")
    );
}
