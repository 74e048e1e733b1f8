use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, MutexGuard};

use clap::Parser;
use plan_executor::PlanExecutor;
use plan_executor_mock::ScriptedExecutor;
use plan_monitor::{
    MonitorComponent, MonitorConfig, MonitorController, MonitorError, RunSession, RunState,
};
use plan_tui::logging::init_file_logging;
use plan_tui::{EnvConfig, ProcessTerminal, TUI};

/// Live dashboard for a scripted plan run.
#[derive(Debug, Parser)]
#[command(name = "plan-monitor", version)]
struct Cli {
    /// JSON plan script to play back.
    script: PathBuf,

    /// Do not enable mouse reporting.
    #[arg(long)]
    no_mouse: bool,

    /// Log file; overrides PLAN_MONITOR_LOG_FILE.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

struct RunSummary {
    state: RunState,
    success: bool,
    message: Option<String>,
}

impl RunSummary {
    fn exit_code(&self) -> ExitCode {
        match self.state {
            RunState::Done if self.success => ExitCode::SUCCESS,
            RunState::Cancelled => ExitCode::from(130),
            _ => ExitCode::from(1),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(summary) => {
            if let Some(message) = summary.message.as_deref() {
                println!("{message}");
            }
            summary.exit_code()
        }
        Err(error) => {
            eprintln!("plan-monitor: {error}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<RunSummary, MonitorError> {
    let mut config = MonitorConfig::from_env();
    if let Some(path) = cli.log_file {
        config.log_file = path;
    }
    init_file_logging(&config.log_file, "info")?;

    let executor = ScriptedExecutor::from_path(&cli.script)?;
    let plan = executor.plan();
    tracing::info!(plan = %plan.id, script = %cli.script.display(), "starting plan monitor");
    let session = Arc::new(Mutex::new(RunSession::new(&plan, executor.max_attempts())));

    let mut env = EnvConfig::from_env();
    if cli.no_mouse {
        env.mouse = false;
    }
    let terminal = ProcessTerminal::with_config(&env);
    let mut tui = TUI::with_config(terminal, env);
    let runtime_handle = tui.runtime_handle();
    tui.set_root(Box::new(MonitorComponent::new(
        Arc::clone(&session),
        runtime_handle.clone(),
    )));
    tui.start()?;

    let controller = MonitorController::start(
        Arc::clone(&session),
        runtime_handle,
        Arc::new(executor),
        plan,
        config.spinner_interval,
    );

    while !tui.is_stop_requested() {
        tui.run_blocking_once();
    }
    tui.stop()?;
    controller.join();

    let mut session = lock_unpoisoned(&session);
    let signal = session.take_signal();
    tracing::info!(state = ?session.state(), ?signal, "plan monitor exiting");
    Ok(RunSummary {
        state: session.state(),
        success: session.final_success(),
        message: session.final_message().map(str::to_string),
    })
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
