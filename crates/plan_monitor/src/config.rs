//! Monitor configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use plan_tui::config::env_string_opt;

pub const SPINNER_MS_ENV: &str = "PLAN_MONITOR_SPINNER_MS";
pub const LOG_FILE_ENV: &str = "PLAN_MONITOR_LOG_FILE";
pub const DEFAULT_SPINNER_MS: u64 = 100;
const DEFAULT_LOG_FILE_NAME: &str = "plan-monitor.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// `None` disables the spinner ticker.
    pub spinner_interval: Option<Duration>,
    pub log_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            spinner_interval: Some(Duration::from_millis(DEFAULT_SPINNER_MS)),
            log_file: std::env::temp_dir().join(DEFAULT_LOG_FILE_NAME),
        }
    }
}

impl MonitorConfig {
    /// Reads overrides from the environment. Unparsable values fall back to the defaults;
    /// a spinner interval of `0` turns the ticker off.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let spinner_interval = match env_string_opt(SPINNER_MS_ENV) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(_) => {
                    tracing::warn!(value = %value, "ignoring invalid {SPINNER_MS_ENV}");
                    defaults.spinner_interval
                }
            },
            None => defaults.spinner_interval,
        };
        let log_file = env_string_opt(LOG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        Self {
            spinner_interval,
            log_file,
        }
    }
}
