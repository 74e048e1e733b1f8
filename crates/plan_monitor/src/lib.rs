//! Live dashboard for a plan run.
//!
//! [`session::RunSession`] is the state machine; [`worker::MonitorController`] drives a
//! [`plan_executor::PlanExecutor`] on background threads and feeds the session through the
//! runtime's command queue; [`tui::MonitorComponent`] draws it.

pub mod config;
pub mod error;
pub mod input;
pub mod layout;
pub mod messages;
pub mod pane;
pub mod render;
pub mod session;
pub mod stream;
pub mod timeline;
pub mod tui;
pub mod worker;

pub use crate::config::MonitorConfig;
pub use crate::error::MonitorError;
pub use crate::messages::{MonitorMessage, PlanResult};
pub use crate::session::{Focus, MonitorSignal, RunSession, RunState, TaskStatus};
pub use crate::tui::MonitorComponent;
pub use crate::worker::{MessageQueue, MonitorController};
