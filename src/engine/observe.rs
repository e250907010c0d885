//! Snapshot and signal fan-out for session observers.
//!
//! Two channels, two delivery contracts:
//!
//! - snapshots travel over a [`watch`] channel. Observers only ever see the
//!   latest state; an older snapshot is replaced, never queued.
//! - one-shot [`SessionSignal`]s travel over a [`broadcast`] channel so that
//!   each subscriber sees every signal exactly once (rest complete, finished,
//!   cancelled) without re-deriving it from snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::engine::rest::RestTimer;
use crate::models::{SessionStatus, SetEntry, WorkoutSummary};

/// Buffer size for the signal channel. A subscriber lagging this far behind
/// sees `RecvError::Lagged`.
pub const SIGNAL_CAPACITY: usize = 64;

/// Read-only copy of the session handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub workout_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    /// Ordered by `SetEntry::position`.
    pub sets: Vec<SetEntry>,
    pub rest: Option<RestTimer>,
    pub paused: bool,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            workout_name: String::new(),
            started_at: None,
            elapsed_seconds: 0,
            sets: Vec::new(),
            rest: None,
            paused: false,
        }
    }

    pub fn is_resting(&self) -> bool {
        self.rest.is_some()
    }

    /// 1-based display index lookup.
    pub fn set_at(&self, index: usize) -> Option<&SetEntry> {
        index.checked_sub(1).and_then(|i| self.sets.get(i))
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// One-shot events, distinct from the continuous snapshot stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionSignal {
    Started { name: String },
    RestComplete { rest_id: u64 },
    Finished(WorkoutSummary),
    Cancelled,
}

/// A live registration with the hub. Dropping it, or handing it to
/// [`ObserverHub::unsubscribe`], ends delivery.
#[derive(Debug)]
pub struct Subscription {
    pub snapshots: watch::Receiver<SessionSnapshot>,
    pub signals: broadcast::Receiver<SessionSignal>,
}

impl Subscription {
    /// Latest snapshot, marking it as seen.
    pub fn current(&mut self) -> SessionSnapshot {
        self.snapshots.borrow_and_update().clone()
    }
}

/// Sending half owned by the store.
#[derive(Debug)]
pub struct ObserverHub {
    snapshots: watch::Sender<SessionSnapshot>,
    signals: broadcast::Sender<SessionSignal>,
}

impl ObserverHub {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::idle());
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { snapshots, signals }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            snapshots: self.snapshots.subscribe(),
            signals: self.signals.subscribe(),
        }
    }

    /// Snapshot-only receiver for consumers that ignore signals, such as the
    /// indicator.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Live [`Subscription`]s. Snapshot-only receivers from [`Self::watch`]
    /// are not counted.
    pub fn subscriber_count(&self) -> usize {
        self.signals.receiver_count()
    }

    pub fn latest(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub(crate) fn publish(&self, snapshot: SessionSnapshot) {
        // `send_replace` stores the value even with zero receivers, so late
        // subscribers start from the current state.
        self.snapshots.send_replace(snapshot);
    }

    pub(crate) fn signal(&self, signal: SessionSignal) {
        // Err only means nobody is listening.
        let _ = self.signals.send(signal);
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_subscriber_starts_from_latest_snapshot() {
        let hub = ObserverHub::new();
        let mut snap = SessionSnapshot::idle();
        snap.workout_name = "Push".into();
        hub.publish(snap.clone());

        let mut sub = hub.subscribe();
        assert_eq!(sub.current(), snap);
    }

    #[tokio::test]
    async fn every_subscriber_gets_each_signal() {
        let hub = ObserverHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.signal(SessionSignal::RestComplete { rest_id: 3 });

        assert_eq!(
            a.signals.recv().await.unwrap(),
            SessionSignal::RestComplete { rest_id: 3 }
        );
        assert_eq!(
            b.signals.recv().await.unwrap(),
            SessionSignal::RestComplete { rest_id: 3 }
        );
    }

    #[test]
    fn unsubscribe_drops_the_registration() {
        let hub = ObserverHub::new();
        let a = hub.subscribe();
        let _b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.unsubscribe(a);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn snapshot_watchers_are_not_subscriptions() {
        let hub = ObserverHub::new();
        let _watcher = hub.watch();
        assert_eq!(hub.subscriber_count(), 0);

        let _sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn signalling_without_subscribers_does_not_panic() {
        let hub = ObserverHub::new();
        hub.signal(SessionSignal::Cancelled);
    }

    #[test]
    fn set_lookup_is_one_based() {
        let snap = SessionSnapshot::idle();
        assert!(snap.set_at(0).is_none());
        assert!(snap.set_at(1).is_none());
    }
}
