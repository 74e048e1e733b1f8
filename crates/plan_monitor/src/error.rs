use plan_executor_mock::ScriptError;
use plan_tui::logging::LoggingError;
use thiserror::Error;

/// Failures before the dashboard is up.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),
}
