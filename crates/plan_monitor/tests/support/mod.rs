#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use plan_executor::{
    CancelHandle, ExecutionContext, ExecutorError, Plan, PlanExecutor, PlanTask, RunOutcome,
};
use plan_tui::{EnvConfig, Terminal, TUI};

type InputHandler = Box<dyn FnMut(String) + Send>;
type ResizeHandler = Box<dyn FnMut() + Send>;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct TerminalTrace {
    pub writes: Vec<String>,
    pub on_input: Option<InputHandler>,
    pub on_resize: Option<ResizeHandler>,
}

pub struct SharedTerminal {
    state: Arc<Mutex<TerminalTrace>>,
    columns: u16,
    rows: u16,
}

impl SharedTerminal {
    pub fn new(columns: u16, rows: u16) -> (Self, Arc<Mutex<TerminalTrace>>) {
        let state = Arc::new(Mutex::new(TerminalTrace::default()));
        (
            Self {
                state: Arc::clone(&state),
                columns,
                rows,
            },
            state,
        )
    }
}

impl Terminal for SharedTerminal {
    fn start(&mut self, on_input: InputHandler, on_resize: ResizeHandler) -> std::io::Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        state.on_input = Some(on_input);
        state.on_resize = Some(on_resize);
        Ok(())
    }

    fn stop(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn drain_input(&mut self, _max_ms: u64, _idle_ms: u64) {}

    fn write(&mut self, data: &str) {
        lock_unpoisoned(&self.state).writes.push(data.to_string());
    }

    fn columns(&self) -> u16 {
        self.columns
    }

    fn rows(&self) -> u16 {
        self.rows
    }
}

/// A runtime over a [`SharedTerminal`] with mouse and alternate screen off.
pub fn test_tui(columns: u16, rows: u16) -> (TUI<SharedTerminal>, Arc<Mutex<TerminalTrace>>) {
    let (terminal, trace) = SharedTerminal::new(columns, rows);
    let config = EnvConfig {
        mouse: false,
        alt_screen: false,
        ..EnvConfig::default()
    };
    (TUI::with_config(terminal, config), trace)
}

pub fn inject_input(state: &Arc<Mutex<TerminalTrace>>, data: &str) {
    let mut state = lock_unpoisoned(state);
    let Some(on_input) = state.on_input.as_mut() else {
        panic!("terminal input handler is not registered");
    };
    on_input(data.to_string());
}

pub fn rendered_output(state: &Arc<Mutex<TerminalTrace>>) -> String {
    lock_unpoisoned(state).writes.join("")
}

/// Pumps the runtime until `done` holds or the timeout passes.
pub fn pump_until<T: Terminal>(tui: &mut TUI<T>, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        tui.run_once();
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

pub fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !done() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
    true
}

pub fn plan(count: usize) -> Plan {
    Plan {
        id: "test-plan".to_string(),
        name: "Test plan".to_string(),
        tasks: (1..=count)
            .map(|index| PlanTask::new(format!("t{index}"), format!("Task {index}")))
            .collect(),
    }
}

/// Blocks until the test opens the gate, then reports started with a counting handle and
/// runs task 1 until cancelled.
#[derive(Default)]
pub struct GatedExecutor {
    gate: Arc<(Mutex<bool>, Condvar)>,
    cancel_calls: Arc<AtomicUsize>,
    entered: Arc<AtomicBool>,
}

impl GatedExecutor {
    pub fn open_gate(&self) {
        let (lock, condvar) = &*self.gate;
        *lock_unpoisoned(lock) = true;
        condvar.notify_all();
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    fn wait_for_gate(&self) {
        let (lock, condvar) = &*self.gate;
        let mut open = lock_unpoisoned(lock);
        while !*open {
            open = match condvar.wait(open) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

impl PlanExecutor for GatedExecutor {
    fn max_attempts(&self) -> u32 {
        3
    }

    fn run(&self, plan: &Plan, mut ctx: ExecutionContext) -> Result<RunOutcome, ExecutorError> {
        self.entered.store(true, Ordering::SeqCst);
        self.wait_for_gate();

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let calls = Arc::clone(&self.cancel_calls);
        ctx.report_started(CancelHandle::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            flag.store(true, Ordering::SeqCst);
        }));

        let Some(task) = plan.tasks.first() else {
            return Ok(RunOutcome::Finished);
        };
        ctx.callbacks.on_task_start(1, plan.tasks.len(), task, 1);
        ctx.output.send("working...");
        while !cancelled.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(2));
        }
        Ok(RunOutcome::Cancelled)
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
