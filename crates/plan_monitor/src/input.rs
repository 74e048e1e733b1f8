//! Keyboard and mouse routing.
//!
//! Focus cycling and scroll keys work in every state. Stop keys only matter while the plan
//! runs; navigation keys only once it is over. Unknown keys and non-wheel mouse events are
//! dropped.

use plan_tui::{InputEvent, MouseEvent, MouseKind};

use crate::session::{Focus, MonitorSignal, RunSession, RunState};

/// Rows scrolled per wheel notch.
pub const WHEEL_LINES: isize = 3;

pub fn handle_event(session: &mut RunSession, event: &InputEvent) {
    match event {
        InputEvent::Key { key_id, .. } => handle_key(session, key_id),
        InputEvent::Mouse(mouse) => handle_mouse(session, mouse),
        InputEvent::Resize { columns, rows } => {
            session.resize(usize::from(*columns), usize::from(*rows))
        }
        InputEvent::Text { .. } | InputEvent::UnknownRaw { .. } => {}
    }
}

pub fn handle_key(session: &mut RunSession, key_id: &str) {
    match key_id {
        "tab" => {
            session.set_focus(session.focus().next());
            return;
        }
        "shift+tab" => {
            session.set_focus(session.focus().prev());
            return;
        }
        _ => {}
    }

    match session.state() {
        RunState::Running | RunState::Cancelling => {
            if matches!(key_id, "s" | "escape" | "ctrl+c") {
                session.request_stop();
                return;
            }
        }
        RunState::Done | RunState::Cancelled => match key_id {
            "enter" | "h" => {
                session.set_signal(MonitorSignal::NavigateHome);
                return;
            }
            "q" | "ctrl+c" => {
                session.set_signal(MonitorSignal::Quit);
                return;
            }
            _ => {}
        },
    }

    let focus = session.focus();
    session.pane_mut(focus).handle_scroll_key(key_id);
}

/// Wheel events scroll the pane under the pointer and focus it; outside every pane they
/// scroll the focused one.
pub fn handle_mouse(session: &mut RunSession, mouse: &MouseEvent) {
    let delta = match mouse.kind {
        MouseKind::WheelUp => -WHEEL_LINES,
        MouseKind::WheelDown => WHEEL_LINES,
        _ => return,
    };

    let layout = *session.layout();
    let hit = [
        (layout.output, Focus::Output),
        (layout.activity, Focus::Activity),
        (layout.progress, Focus::Tasks),
    ]
    .into_iter()
    .find(|(rect, _)| rect.contains(mouse.column, mouse.row))
    .map(|(_, focus)| focus);

    let target = match hit {
        Some(focus) => {
            session.set_focus(focus);
            focus
        }
        None => session.focus(),
    };
    session.pane_mut(target).scroll_by(delta);
}
