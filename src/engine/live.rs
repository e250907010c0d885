//! Tokio driver around [`SessionStore`].
//!
//! [`LiveSession`] owns the store behind a mutex and runs a recurring tick
//! task for as long as a workout is in progress. Each command takes the lock
//! for its synchronous transition only, so observers never see half of one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::engine::observe::{SessionSnapshot, Subscription};
use crate::engine::store::{SessionStore, TickOutcome};
use crate::error::SessionResult;
use crate::models::{LogSet, SessionStatus, SetId, SetPatch, WorkoutSummary};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct LiveSession {
    store: Arc<Mutex<SessionStore>>,
    tick_interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSession {
    pub fn new(store: SessionStore, tick_interval: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            tick_interval,
            ticker: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store().snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.store().status()
    }

    pub fn subscribe(&self) -> Subscription {
        self.store().subscribe()
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.store().unsubscribe(subscription);
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.store().watch()
    }

    /// Whether a tick task is currently scheduled.
    pub fn is_ticking(&self) -> bool {
        self.ticker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts the workout and its tick task. Must run inside a Tokio runtime.
    pub fn start(&self, name: &str) -> SessionResult<()> {
        self.store().start(name)?;
        self.spawn_ticker();
        Ok(())
    }

    pub fn rename(&self, name: &str) -> SessionResult<()> {
        self.store().rename(name)
    }

    pub fn log_set(&self, input: LogSet) -> SessionResult<SetId> {
        self.store().log_set(input)
    }

    pub fn update_set(&self, id: SetId, patch: SetPatch) -> SessionResult<()> {
        self.store().update_set(id, patch)
    }

    pub fn remove_set(&self, id: SetId) -> SessionResult<()> {
        self.store().remove_set(id)
    }

    pub fn start_rest(&self, duration_seconds: u32) -> SessionResult<()> {
        self.store().start_rest(duration_seconds)
    }

    pub fn extend_rest(&self, delta_seconds: i64) -> SessionResult<()> {
        self.store().extend_rest(delta_seconds)
    }

    pub fn skip_rest(&self) -> SessionResult<()> {
        self.store().skip_rest()
    }

    pub fn pause(&self) -> SessionResult<()> {
        self.store().pause()
    }

    pub fn resume(&self) -> SessionResult<()> {
        self.store().resume()
    }

    pub fn finish(&self) -> SessionResult<WorkoutSummary> {
        let summary = self.store().finish()?;
        self.stop_ticker();
        Ok(summary)
    }

    /// Callers are expected to have confirmed intent with the user first.
    pub fn cancel(&self) {
        self.store().cancel();
        self.stop_ticker();
    }

    pub fn reset(&self) -> SessionResult<()> {
        self.store().reset()
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_ticker(&self) {
        let handle = tokio::spawn(run_ticker(Arc::downgrade(&self.store), self.tick_interval));
        if let Some(previous) = self.ticker().replace(handle) {
            previous.abort();
        }
    }

    fn stop_ticker(&self) {
        if let Some(handle) = self.ticker().take() {
            debug!("stopping session ticker");
            handle.abort();
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

async fn run_ticker(store: Weak<Mutex<SessionStore>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // Skipped ticks are harmless: the store recomputes elapsed time from the
    // clock on the next one.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };

        let outcome = store.lock().unwrap_or_else(PoisonError::into_inner).tick();
        if outcome == TickOutcome::NotRunning {
            debug!("session no longer running, ticker exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::observe::SessionSignal;

    fn live() -> (LiveSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let live = LiveSession::new(SessionStore::new(clock.clone()), DEFAULT_TICK_INTERVAL);
        (live, clock)
    }

    async fn wait_for_elapsed(sub: &mut Subscription, seconds: u64) -> SessionSnapshot {
        timeout(Duration::from_secs(30), async {
            loop {
                sub.snapshots.changed().await.expect("store alive");
                let snap = sub.snapshots.borrow_and_update().clone();
                if snap.elapsed_seconds >= seconds {
                    break snap;
                }
            }
        })
        .await
        .expect("ticker should advance elapsed time")
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_drives_elapsed_from_the_clock() {
        let (live, clock) = live();
        let mut sub = live.subscribe();
        live.start("Push").unwrap();
        assert!(live.is_ticking());

        clock.advance_secs(5);
        let snap = wait_for_elapsed(&mut sub, 5).await;
        assert_eq!(snap.elapsed_seconds, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_completes_rest() {
        let (live, clock) = live();
        let mut sub = live.subscribe();
        live.start("Push").unwrap();
        live.start_rest(3).unwrap();

        clock.advance_secs(3);
        wait_for_elapsed(&mut sub, 3).await;

        assert!(!live.snapshot().is_resting());
        let signals: Vec<_> = std::iter::from_fn(|| sub.signals.try_recv().ok()).collect();
        assert!(signals.contains(&SessionSignal::RestComplete { rest_id: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_and_cancel_stop_the_ticker() {
        let (live, _) = live();
        live.start("Push").unwrap();
        live.finish().unwrap();
        assert!(!live.is_ticking());

        live.reset().unwrap();
        live.start("Pull").unwrap();
        assert!(live.is_ticking());
        live.cancel();
        assert!(!live.is_ticking());
        assert_eq!(live.status(), SessionStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn no_elapsed_time_after_finish() {
        let (live, clock) = live();
        live.start("Push").unwrap();
        clock.advance_secs(10);
        let summary = live.finish().unwrap();
        assert_eq!(summary.duration_seconds, 10);

        clock.advance_secs(10);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(live.snapshot().elapsed_seconds, 10);
    }

    #[tokio::test]
    async fn failed_start_does_not_spawn_a_ticker() {
        let (live, _) = live();
        live.start("Push").unwrap();
        live.finish().unwrap();
        assert!(live.start("Again").is_err());
        assert!(!live.is_ticking());
    }
}
