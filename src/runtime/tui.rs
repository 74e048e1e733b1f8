//! TUI runtime.
//!
//! One thread owns the runtime and the root component. Terminal input, resize signals and
//! commands from other threads are queued on a shared wake state; `run_blocking_once` sleeps
//! until something is queued, applies it, and renders at most once.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::EnvConfig;
use crate::core::component::Component;
use crate::core::input_event::{parse_input_event, InputEvent};
use crate::core::output::{OutputGate, TerminalCmd};
use crate::core::terminal::Terminal;
use crate::render::renderer::DiffRenderer;

const STOP_DRAIN_MAX_MS: u64 = 1000;
const STOP_DRAIN_IDLE_MS: u64 = 50;
const COALESCE_MAX_DURATION_MS: u64 = 2;
const COALESCE_MAX_ITERATIONS: usize = 8;

/// Work posted to the runtime thread.
pub enum Command {
    RequestRender,
    RequestStop,
    Custom(Box<dyn CustomCommand>),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestRender => f.write_str("RequestRender"),
            Self::RequestStop => f.write_str("RequestStop"),
            Self::Custom(command) => f.debug_tuple("Custom").field(&command.name()).finish(),
        }
    }
}

/// A closure-like unit of work executed on the runtime thread.
pub trait CustomCommand: Send {
    fn name(&self) -> &'static str;

    fn apply(self: Box<Self>, ctx: &mut CustomCommandCtx) -> Result<(), CustomCommandError>;
}

/// What a custom command may ask of the runtime.
#[derive(Debug, Default)]
pub struct CustomCommandCtx {
    render_requested: bool,
    stop_requested: bool,
}

impl CustomCommandCtx {
    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }
}

#[derive(Debug, Error)]
pub enum CustomCommandError {
    #[error("{0}")]
    Message(String),
}

#[derive(Clone, Copy, Debug)]
struct CoalesceBudget {
    max_duration: Duration,
    max_iterations: usize,
}

impl Default for CoalesceBudget {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_millis(COALESCE_MAX_DURATION_MS),
            max_iterations: COALESCE_MAX_ITERATIONS,
        }
    }
}

impl CoalesceBudget {
    fn allows(&self, start: Instant, iterations: usize) -> bool {
        start.elapsed() < self.max_duration && iterations < self.max_iterations
    }
}

#[derive(Default)]
struct RuntimeWakeState {
    pending_inputs: Vec<String>,
    pending_commands: Vec<Command>,
    pending_resize: bool,
    render_requested: bool,
    stop_requested: bool,
}

impl RuntimeWakeState {
    fn has_work(&self) -> bool {
        !self.pending_inputs.is_empty()
            || !self.pending_commands.is_empty()
            || self.pending_resize
            || self.render_requested
    }
}

#[derive(Default)]
struct RuntimeWake {
    state: Mutex<RuntimeWakeState>,
    cvar: Condvar,
}

impl RuntimeWake {
    fn lock(&self) -> MutexGuard<'_, RuntimeWakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks until work is queued. Returns `false` once a stop was requested.
    fn wait_for_event(&self) -> bool {
        let mut state = self.lock();
        while !state.stop_requested && !state.has_work() {
            state = self
                .cvar
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        !state.stop_requested
    }

    fn enqueue_input(&self, data: String) {
        self.lock().pending_inputs.push(data);
        self.cvar.notify_one();
    }

    fn enqueue_command(&self, command: Command) {
        self.lock().pending_commands.push(command);
        self.cvar.notify_one();
    }

    fn signal_resize(&self) {
        self.lock().pending_resize = true;
        self.cvar.notify_one();
    }

    fn request_render(&self) {
        self.lock().render_requested = true;
        self.cvar.notify_one();
    }

    fn request_stop(&self) {
        self.lock().stop_requested = true;
        self.cvar.notify_all();
    }

    fn is_stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    fn take_pending_resize(&self) -> bool {
        std::mem::take(&mut self.lock().pending_resize)
    }

    fn drain_inputs(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().pending_inputs)
    }

    fn drain_commands(&self) -> Vec<Command> {
        std::mem::take(&mut self.lock().pending_commands)
    }

    fn take_render_requested(&self) -> bool {
        std::mem::take(&mut self.lock().render_requested)
    }

    fn has_pending_non_render(&self) -> bool {
        let state = self.lock();
        state.pending_resize || !state.pending_inputs.is_empty() || !state.pending_commands.is_empty()
    }

    fn reset_for_start(&self) {
        let mut state = self.lock();
        state.stop_requested = false;
        state.pending_resize = false;
        state.pending_inputs.clear();
        state.render_requested = false;
    }
}

/// Cloneable, `Send` handle used by other threads to post work to the runtime.
#[derive(Clone)]
pub struct RuntimeHandle {
    wake: Arc<RuntimeWake>,
}

impl RuntimeHandle {
    pub fn dispatch(&self, command: Command) {
        match command {
            Command::RequestRender => self.wake.request_render(),
            Command::RequestStop => self.wake.request_stop(),
            command @ Command::Custom(_) => self.wake.enqueue_command(command),
        }
    }
}

/// Restores the terminal from a signal or panic while the runtime is active.
struct CrashCleanup {
    armed: AtomicBool,
    restore: String,
    #[cfg(unix)]
    termios: Option<libc::termios>,
}

impl CrashCleanup {
    #[cfg(unix)]
    fn new(restore: String) -> Self {
        Self {
            armed: AtomicBool::new(true),
            restore,
            termios: crate::platform::process_terminal::snapshot_termios(),
        }
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    #[cfg(unix)]
    fn run_best_effort(&self) {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return;
        }
        crate::platform::process_terminal::write_stdout_best_effort(&self.restore);
        if let Some(termios) = self.termios.as_ref() {
            crate::platform::process_terminal::restore_termios_best_effort(termios);
        }
    }
}

pub struct TuiRuntime<T: Terminal> {
    terminal: T,
    config: EnvConfig,
    output: OutputGate,
    root: Option<Box<dyn Component>>,
    renderer: DiffRenderer,
    stopped: bool,
    wake: Arc<RuntimeWake>,
    coalesce_budget: CoalesceBudget,
    crash_cleanup: Option<Arc<CrashCleanup>>,
    #[cfg(all(unix, not(test)))]
    signal_hook_guard: Option<crate::platform::SignalHookGuard>,
}

impl<T: Terminal> TuiRuntime<T> {
    pub fn new(terminal: T) -> Self {
        Self::with_config(terminal, EnvConfig::from_env())
    }

    pub fn with_config(terminal: T, config: EnvConfig) -> Self {
        Self {
            terminal,
            config,
            output: OutputGate::new(),
            root: None,
            renderer: DiffRenderer::new(),
            stopped: true,
            wake: Arc::new(RuntimeWake::default()),
            coalesce_budget: CoalesceBudget::default(),
            crash_cleanup: None,
            #[cfg(all(unix, not(test)))]
            signal_hook_guard: None,
        }
    }

    pub fn set_root(&mut self, root: Box<dyn Component>) {
        self.root = Some(root);
        self.renderer.request_full_redraw_next();
        self.wake.request_render();
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            wake: Arc::clone(&self.wake),
        }
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// True once `Command::RequestStop` was dispatched; the owner should call [`Self::stop`].
    pub fn is_stop_requested(&self) -> bool {
        self.wake.is_stop_requested()
    }

    pub fn start(&mut self) -> io::Result<()> {
        self.output.clear();
        self.wake.reset_for_start();
        self.stopped = false;

        self.install_cleanup_hooks();

        let wake_input = Arc::clone(&self.wake);
        let wake_resize = Arc::clone(&self.wake);
        if let Err(err) = self.terminal.start(
            Box::new(move |data| wake_input.enqueue_input(data)),
            Box::new(move || wake_resize.signal_resize()),
        ) {
            self.stopped = true;
            self.uninstall_cleanup_hooks();
            return Err(err);
        }

        if self.config.alt_screen {
            self.output.push(TerminalCmd::AltScreenEnter);
        }
        self.output.push(TerminalCmd::HideCursor);
        if self.config.mouse {
            self.output.push(TerminalCmd::MouseEnable);
        }
        self.flush_output();

        tracing::debug!(
            columns = self.terminal.columns(),
            rows = self.terminal.rows(),
            mouse = self.config.mouse,
            alt_screen = self.config.alt_screen,
            "runtime started"
        );

        self.renderer.request_full_redraw_next();
        self.wake.request_render();
        Ok(())
    }

    pub fn stop(&mut self) -> io::Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.wake.request_stop();

        self.output.push(TerminalCmd::ShowCursor);
        if self.config.mouse {
            self.output.push(TerminalCmd::MouseDisable);
        }
        if self.config.alt_screen {
            self.output.push(TerminalCmd::AltScreenLeave);
        }
        self.flush_output();

        self.terminal
            .drain_input(STOP_DRAIN_MAX_MS, STOP_DRAIN_IDLE_MS);
        let result = self.terminal.stop();
        self.stopped = true;
        self.uninstall_cleanup_hooks();
        tracing::debug!("runtime stopped");
        result
    }

    fn install_cleanup_hooks(&mut self) {
        #[cfg(unix)]
        {
            let mut restore = String::from(TerminalCmd::ShowCursor.as_str());
            if self.config.mouse {
                restore.push_str(TerminalCmd::MouseDisable.as_str());
            }
            if self.config.alt_screen {
                restore.push_str(TerminalCmd::AltScreenLeave.as_str());
            }
            let cleanup = Arc::new(CrashCleanup::new(restore));

            #[cfg(not(test))]
            {
                let signal_cleanup = Arc::clone(&cleanup);
                let panic_cleanup = Arc::clone(&cleanup);
                match crate::platform::install_signal_handlers(move || {
                    signal_cleanup.run_best_effort()
                }) {
                    Ok(guard) => self.signal_hook_guard = Some(guard),
                    Err(err) => tracing::warn!(error = %err, "signal cleanup hooks unavailable"),
                }
                crate::platform::install_panic_hook(move || panic_cleanup.run_best_effort());
            }

            self.crash_cleanup = Some(cleanup);
        }
    }

    fn uninstall_cleanup_hooks(&mut self) {
        if let Some(cleanup) = self.crash_cleanup.take() {
            cleanup.disarm();
        }
        #[cfg(all(unix, not(test)))]
        {
            self.signal_hook_guard = None;
        }
    }

    /// Blocks until input, a resize, a command or a render request is queued, then applies
    /// the queued work and renders once.
    ///
    /// Returns immediately after a stop request; callers loop on this until
    /// [`Self::is_stop_requested`].
    pub fn run_blocking_once(&mut self) {
        if self.stopped {
            return;
        }
        if !self.wake.wait_for_event() {
            return;
        }
        self.run_coalesced_once();
    }

    /// Applies whatever is queued without blocking, then renders if needed.
    pub fn run_once(&mut self) {
        if self.stopped {
            return;
        }
        self.apply_pending_work();
        self.render_if_needed();
    }

    fn run_coalesced_once(&mut self) {
        let start = Instant::now();
        let mut iterations = 0;

        loop {
            let did_work = self.apply_pending_work();
            if !did_work || !self.coalesce_budget.allows(start, iterations) {
                break;
            }
            iterations += 1;
            if !self.wake.has_pending_non_render() {
                break;
            }
        }

        self.render_if_needed();
    }

    fn apply_pending_work(&mut self) -> bool {
        let mut did_work = false;

        if self.wake.take_pending_resize() {
            let event = InputEvent::Resize {
                columns: self.terminal.columns(),
                rows: self.terminal.rows(),
            };
            if let Some(root) = self.root.as_mut() {
                root.handle_event(&event);
            }
            self.wake.request_render();
            did_work = true;
        }

        let inputs = self.wake.drain_inputs();
        if !inputs.is_empty() {
            for data in inputs {
                self.handle_input(&data);
            }
            did_work = true;
        }

        let commands = self.wake.drain_commands();
        if !commands.is_empty() {
            for command in commands {
                self.apply_command(command);
            }
            did_work = true;
        }

        did_work
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::RequestRender => self.wake.request_render(),
            Command::RequestStop => self.wake.request_stop(),
            Command::Custom(command) => {
                let name = command.name();
                let mut ctx = CustomCommandCtx::default();
                if let Err(err) = command.apply(&mut ctx) {
                    tracing::warn!(command = name, error = %err, "custom command failed");
                }
                if ctx.render_requested {
                    self.wake.request_render();
                }
                if ctx.stop_requested {
                    self.wake.request_stop();
                }
            }
        }
    }

    /// Parses one input sequence and delivers it to the root component.
    pub fn handle_input(&mut self, data: &str) {
        let Some(event) = parse_input_event(data) else {
            return;
        };
        let Some(root) = self.root.as_mut() else {
            return;
        };
        root.handle_event(&event);
        self.wake.request_render();
    }

    pub fn request_render(&mut self) {
        self.wake.request_render();
    }

    pub fn request_full_redraw(&mut self) {
        self.renderer.request_full_redraw_next();
        self.wake.request_render();
    }

    pub fn render_if_needed(&mut self) {
        if self.wake.take_render_requested() {
            self.do_render();
        }
        self.flush_output();
    }

    pub fn render_now(&mut self) {
        self.wake.take_render_requested();
        self.do_render();
        self.flush_output();
    }

    fn do_render(&mut self) {
        let width = self.terminal.columns() as usize;
        let height = self.terminal.rows() as usize;
        let Some(root) = self.root.as_mut() else {
            return;
        };

        root.set_terminal_rows(height);
        let lines = root.render(width);
        let cmds = self
            .renderer
            .render(lines, width, height, self.config.debug_redraw);
        self.output.extend(cmds);
    }

    fn flush_output(&mut self) {
        self.output.flush(&mut self.terminal);
    }
}

impl<T: Terminal> Drop for TuiRuntime<T> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = self.stop();
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, CustomCommand, CustomCommandCtx, CustomCommandError, TuiRuntime};
    use crate::config::EnvConfig;
    use crate::core::component::Component;
    use crate::core::input_event::InputEvent;
    use crate::core::terminal::Terminal;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct TestTerminal {
        output: Arc<Mutex<String>>,
        drain_calls: Arc<Mutex<Vec<(u64, u64)>>>,
        columns: u16,
        rows: u16,
    }

    impl TestTerminal {
        fn new(columns: u16, rows: u16) -> Self {
            Self {
                columns,
                rows,
                ..Self::default()
            }
        }
    }

    impl Terminal for TestTerminal {
        fn start(
            &mut self,
            _on_input: Box<dyn FnMut(String) + Send>,
            _on_resize: Box<dyn FnMut() + Send>,
        ) -> std::io::Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn drain_input(&mut self, max_ms: u64, idle_ms: u64) {
            self.drain_calls.lock().unwrap().push((max_ms, idle_ms));
        }
        fn write(&mut self, data: &str) {
            self.output.lock().unwrap().push_str(data);
        }
        fn columns(&self) -> u16 {
            self.columns
        }
        fn rows(&self) -> u16 {
            self.rows
        }
    }

    struct RecordingComponent {
        lines: Arc<Mutex<Vec<String>>>,
        events: Arc<Mutex<Vec<InputEvent>>>,
        rows: Arc<Mutex<usize>>,
    }

    impl Component for RecordingComponent {
        fn render(&mut self, _width: usize) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        fn handle_event(&mut self, event: &InputEvent) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn set_terminal_rows(&mut self, rows: usize) {
            *self.rows.lock().unwrap() = rows;
        }
    }

    struct Harness {
        runtime: TuiRuntime<TestTerminal>,
        output: Arc<Mutex<String>>,
        lines: Arc<Mutex<Vec<String>>>,
        events: Arc<Mutex<Vec<InputEvent>>>,
        rows: Arc<Mutex<usize>>,
    }

    fn harness(config: EnvConfig) -> Harness {
        let terminal = TestTerminal::new(20, 3);
        let output = Arc::clone(&terminal.output);
        let lines = Arc::new(Mutex::new(vec!["hello".to_string()]));
        let events = Arc::new(Mutex::new(Vec::new()));
        let rows = Arc::new(Mutex::new(0));
        let mut runtime = TuiRuntime::with_config(terminal, config);
        runtime.set_root(Box::new(RecordingComponent {
            lines: Arc::clone(&lines),
            events: Arc::clone(&events),
            rows: Arc::clone(&rows),
        }));
        Harness {
            runtime,
            output,
            lines,
            events,
            rows,
        }
    }

    fn take_output(output: &Arc<Mutex<String>>) -> String {
        std::mem::take(&mut *output.lock().unwrap())
    }

    struct MarkCommand {
        hits: Arc<Mutex<usize>>,
        fail: bool,
    }

    impl CustomCommand for MarkCommand {
        fn name(&self) -> &'static str {
            "mark"
        }

        fn apply(self: Box<Self>, ctx: &mut CustomCommandCtx) -> Result<(), CustomCommandError> {
            *self.hits.lock().unwrap() += 1;
            if self.fail {
                return Err(CustomCommandError::Message("boom".to_string()));
            }
            ctx.request_render();
            Ok(())
        }
    }

    #[test]
    fn start_enters_alt_screen_and_first_frame_paints_root() {
        let mut h = harness(EnvConfig::default());
        h.runtime.start().expect("start");

        let started = take_output(&h.output);
        assert!(started.contains("\x1b[?1049h"));
        assert!(started.contains("\x1b[?25l"));
        assert!(started.contains("\x1b[?1000h\x1b[?1006h"));

        h.runtime.run_once();
        let frame = take_output(&h.output);
        assert!(frame.contains("\x1b[2J"));
        assert!(frame.contains("hello"));
        assert_eq!(*h.rows.lock().unwrap(), 3);
    }

    #[test]
    fn toggles_follow_config() {
        let config = EnvConfig {
            mouse: false,
            alt_screen: false,
            ..EnvConfig::default()
        };
        let mut h = harness(config);
        h.runtime.start().expect("start");
        h.runtime.stop().expect("stop");

        let output = take_output(&h.output);
        assert!(!output.contains("\x1b[?1049"));
        assert!(!output.contains("\x1b[?1000"));
        assert!(output.contains("\x1b[?25h"));
    }

    #[test]
    fn input_is_parsed_and_routed_to_root() {
        let mut h = harness(EnvConfig::default());
        h.runtime.start().expect("start");
        h.runtime.run_once();
        take_output(&h.output);

        h.runtime.handle_input("\t");
        h.runtime.handle_input("\x1b[<64;3;2M");

        let events = h.events.lock().unwrap().clone();
        assert!(matches!(&events[0], InputEvent::Key { key_id, .. } if key_id == "tab"));
        assert!(matches!(&events[1], InputEvent::Mouse(_)));
    }

    #[test]
    fn unchanged_frames_write_nothing_and_changes_write_one_row() {
        let mut h = harness(EnvConfig::default());
        h.runtime.start().expect("start");
        h.runtime.run_once();
        take_output(&h.output);

        h.runtime.request_render();
        h.runtime.run_once();
        assert!(take_output(&h.output).is_empty());

        h.lines.lock().unwrap().push("world".to_string());
        h.runtime.request_render();
        h.runtime.run_once();
        let diff = take_output(&h.output);
        assert!(diff.contains("\x1b[2;1H\x1b[2Kworld"));
        assert!(!diff.contains("hello"));
    }

    #[test]
    fn custom_commands_run_on_the_runtime_thread_and_request_render() {
        let mut h = harness(EnvConfig::default());
        h.runtime.start().expect("start");
        h.runtime.run_once();
        take_output(&h.output);

        let hits = Arc::new(Mutex::new(0));
        let handle = h.runtime.runtime_handle();
        handle.dispatch(Command::Custom(Box::new(MarkCommand {
            hits: Arc::clone(&hits),
            fail: true,
        })));
        handle.dispatch(Command::Custom(Box::new(MarkCommand {
            hits: Arc::clone(&hits),
            fail: false,
        })));
        h.lines.lock().unwrap()[0] = "changed".to_string();

        h.runtime.run_blocking_once();
        assert_eq!(*hits.lock().unwrap(), 2);
        assert!(take_output(&h.output).contains("changed"));
    }

    #[test]
    fn request_stop_wakes_blocking_loop() {
        let mut h = harness(EnvConfig::default());
        h.runtime.start().expect("start");
        h.runtime.run_once();

        let handle = h.runtime.runtime_handle();
        let waker = std::thread::spawn(move || handle.dispatch(Command::RequestStop));
        while !h.runtime.is_stop_requested() {
            h.runtime.run_blocking_once();
        }
        waker.join().expect("join");

        h.runtime.stop().expect("stop");
        assert!(h.runtime.is_stopped());
        let output = take_output(&h.output);
        assert!(output.contains("\x1b[?1006l\x1b[?1000l"));
        assert!(output.contains("\x1b[?1049l"));
    }

    #[test]
    fn stop_drains_input_and_is_idempotent() {
        let mut h = harness(EnvConfig::default());
        let drain_calls = Arc::clone(&h.runtime.terminal().drain_calls);
        h.runtime.start().expect("start");
        h.runtime.stop().expect("stop");
        h.runtime.stop().expect("second stop");

        assert_eq!(drain_calls.lock().unwrap().as_slice(), &[(1000, 50)]);
    }
}
