//! The persistent "workout in progress" pill.
//!
//! Visibility depends on two streams owned by different parties: the session
//! snapshot (engine) and the focused route (front end). It is derived on the
//! fly and never written back into session state.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::observe::SessionSnapshot;
use crate::models::SessionStatus;

/// The view the user is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// The dedicated in-session view; the pill is redundant there.
    ActiveWorkout,
    History,
    Settings,
    Other(String),
}

impl Route {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "workout" | "session" | "active" => Self::ActiveWorkout,
            "history" => Self::History,
            "settings" | "config" => Self::Settings,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActiveWorkout => write!(f, "workout"),
            Self::History => write!(f, "history"),
            Self::Settings => write!(f, "settings"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

pub fn indicator_visible(status: SessionStatus, route: &Route) -> bool {
    status == SessionStatus::InProgress && *route != Route::ActiveWorkout
}

/// Background task that keeps the pill's visibility in sync with both inputs.
pub struct IndicatorWatch {
    visible: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl IndicatorWatch {
    /// Must run inside a Tokio runtime. The task ends when either input's
    /// sender is dropped.
    pub fn spawn(
        mut session: watch::Receiver<SessionSnapshot>,
        mut route: watch::Receiver<Route>,
    ) -> Self {
        let initial = indicator_visible(session.borrow_and_update().status, &route.borrow_and_update());
        let (tx, visible) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = session.changed() => if changed.is_err() { break },
                    changed = route.changed() => if changed.is_err() { break },
                }

                let status = session.borrow_and_update().status;
                let next = indicator_visible(status, &route.borrow_and_update());
                tx.send_if_modified(|current| {
                    let modified = *current != next;
                    *current = next;
                    modified
                });
            }
        });

        Self { visible, task }
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    /// Receiver that only wakes when visibility flips.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.visible.clone()
    }
}

impl Drop for IndicatorWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
