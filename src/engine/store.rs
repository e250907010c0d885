//! The workout session state machine.
//!
//! [`SessionStore`] is the single owner of session state. Every command
//! validates against the current state first and only then mutates, so a
//! rejected command changes nothing and broadcasts nothing. Accepted
//! commands publish a fresh [`SessionSnapshot`] after the mutation and, for
//! start / rest completion / finish / cancel, a one-shot [`SessionSignal`]
//! after the snapshot.
//!
//! ```text
//! idle ──start──▶ in_progress ──finish──▶ finished ──reset──▶ idle
//!                      │
//!                      └──cancel──▶ cancelled ──reset──▶ idle
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::engine::observe::{ObserverHub, SessionSignal, SessionSnapshot, Subscription};
use crate::engine::rest::RestTimer;
use crate::error::{SessionError, SessionResult};
use crate::models::{LogSet, SessionStatus, SetEntry, SetId, SetPatch, WorkoutSummary};

pub const DEFAULT_WORKOUT_NAME: &str = "Workout";

/// Result of feeding one tick to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session in progress; the driver should stop ticking.
    NotRunning,
    Paused,
    Ticked {
        advanced_by: u64,
        rest_completed: Option<u64>,
    },
}

#[derive(Debug, Clone)]
struct Session {
    id: Uuid,
    status: SessionStatus,
    workout_name: String,
    started_at: Option<DateTime<Utc>>,
    elapsed_seconds: u64,
    sets: HashMap<SetId, SetEntry>,
    next_position: u32,
    rest: Option<RestTimer>,
    paused_since: Option<DateTime<Utc>>,
    paused_total: Duration,
}

impl Session {
    fn idle() -> Self {
        Self {
            id: Uuid::nil(),
            status: SessionStatus::Idle,
            workout_name: String::new(),
            started_at: None,
            elapsed_seconds: 0,
            sets: HashMap::new(),
            next_position: 0,
            rest: None,
            paused_since: None,
            paused_total: Duration::zero(),
        }
    }

    /// Whole seconds of unpaused time between `started_at` and `now`.
    fn active_seconds(&self, now: DateTime<Utc>) -> u64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let current_pause = self
            .paused_since
            .map(|since| now - since)
            .unwrap_or_else(Duration::zero);
        let active = (now - started_at) - self.paused_total - current_pause;
        u64::try_from(active.num_seconds()).unwrap_or(0)
    }

    fn ordered_sets(&self) -> Vec<SetEntry> {
        let mut sets: Vec<SetEntry> = self.sets.values().cloned().collect();
        sets.sort_by_key(|s| s.position);
        sets
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            workout_name: self.workout_name.clone(),
            started_at: self.started_at,
            elapsed_seconds: self.elapsed_seconds,
            sets: self.ordered_sets(),
            rest: self.rest,
            paused: self.paused_since.is_some(),
        }
    }

    /// Seconds the clock is ahead of `elapsed_seconds`. Never negative, so a
    /// clock stepping back leaves elapsed time where it was.
    fn pending_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.active_seconds(now).saturating_sub(self.elapsed_seconds)
    }

    /// The rest timer as it stands at `now`; `None` once it has run out.
    fn rest_at(&self, now: DateTime<Utc>) -> Option<RestTimer> {
        let mut rest = self.rest?;
        rest.advance(self.pending_seconds(now));
        (!rest.is_done()).then_some(rest)
    }

    /// Brings elapsed time up to `now` and counts the rest down by the same
    /// amount. Returns the seconds caught up and the id of a rest that ran out.
    fn catch_up(&mut self, now: DateTime<Utc>) -> (u64, Option<u64>) {
        let advanced_by = self.pending_seconds(now);
        if advanced_by == 0 {
            return (0, None);
        }
        self.elapsed_seconds += advanced_by;

        let mut rest_completed = None;
        if let Some(rest) = self.rest.as_mut() {
            rest.advance(advanced_by);
            if rest.is_done() {
                rest_completed = Some(rest.rest_id());
                self.rest = None;
            }
        }
        (advanced_by, rest_completed)
    }
}

pub struct SessionStore {
    clock: Arc<dyn Clock>,
    default_name: String,
    session: Session,
    last_rest_id: u64,
    hub: ObserverHub,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_default_name(clock, DEFAULT_WORKOUT_NAME)
    }

    /// `default_name` is used when `start` receives a blank name.
    pub fn with_default_name(clock: Arc<dyn Clock>, default_name: impl Into<String>) -> Self {
        let default_name = default_name.into();
        let default_name = if default_name.trim().is_empty() {
            DEFAULT_WORKOUT_NAME.to_string()
        } else {
            default_name.trim().to_string()
        };

        Self {
            clock,
            default_name,
            session: Session::idle(),
            last_rest_id: 0,
            hub: ObserverHub::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn is_resting(&self) -> bool {
        self.session.rest.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.hub.unsubscribe(subscription);
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.hub.watch()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Begins a workout. Only valid from `idle`; a terminal session must be
    /// `reset` first.
    pub fn start(&mut self, name: &str) -> SessionResult<()> {
        let result = self.try_start(name);
        self.log_rejection("start", result)
    }

    pub fn rename(&mut self, name: &str) -> SessionResult<()> {
        let result = self.try_rename(name);
        self.log_rejection("rename", result)
    }

    /// Adds a set and returns its fresh id. Does not touch the rest timer.
    pub fn log_set(&mut self, input: LogSet) -> SessionResult<SetId> {
        let result = self.try_log_set(input);
        self.log_rejection("log_set", result)
    }

    pub fn update_set(&mut self, id: SetId, patch: SetPatch) -> SessionResult<()> {
        let result = self.try_update_set(id, patch);
        self.log_rejection("update_set", result)
    }

    pub fn remove_set(&mut self, id: SetId) -> SessionResult<()> {
        let result = self.try_remove_set(id);
        self.log_rejection("remove_set", result)
    }

    /// Starts resting. While already resting this replaces the current timer.
    pub fn start_rest(&mut self, duration_seconds: u32) -> SessionResult<()> {
        let result = self.try_start_rest(duration_seconds);
        self.log_rejection("start_rest", result)
    }

    pub fn extend_rest(&mut self, delta_seconds: i64) -> SessionResult<()> {
        let result = self.try_extend_rest(delta_seconds);
        self.log_rejection("extend_rest", result)
    }

    pub fn skip_rest(&mut self) -> SessionResult<()> {
        let result = self.try_skip_rest();
        self.log_rejection("skip_rest", result)
    }

    pub fn pause(&mut self) -> SessionResult<()> {
        let result = self.try_pause();
        self.log_rejection("pause", result)
    }

    pub fn resume(&mut self) -> SessionResult<()> {
        let result = self.try_resume();
        self.log_rejection("resume", result)
    }

    /// Ends the workout keeping its sets. Any rest in progress is dropped
    /// without a completion signal, including one that ran out since the
    /// last tick.
    pub fn finish(&mut self) -> SessionResult<WorkoutSummary> {
        let result = self.try_finish();
        self.log_rejection("finish", result)
    }

    /// Ends the workout and discards every logged set. Outside `in_progress`
    /// this is a no-op.
    pub fn cancel(&mut self) {
        if self.session.status != SessionStatus::InProgress {
            debug!(status = %self.session.status, "cancel ignored, no workout in progress");
            return;
        }

        let now = self.clock.now();
        let session = &mut self.session;
        if let (_, Some(rest_id)) = session.catch_up(now) {
            debug!(rest_id, "rest ran out before cancel, not announced");
        }
        session.paused_since = None;
        session.status = SessionStatus::Cancelled;
        session.rest = None;
        let discarded = session.sets.len();
        session.sets.clear();

        info!(
            session_id = %session.id,
            discarded_sets = discarded,
            elapsed_seconds = session.elapsed_seconds,
            "workout cancelled"
        );
        self.publish();
        self.hub.signal(SessionSignal::Cancelled);
    }

    /// Returns a terminal session to `idle`.
    pub fn reset(&mut self) -> SessionResult<()> {
        match self.session.status {
            SessionStatus::Idle => Ok(()),
            SessionStatus::InProgress => {
                self.log_rejection("reset", Err(SessionError::invalid("reset", SessionStatus::InProgress)))
            }
            SessionStatus::Finished | SessionStatus::Cancelled => {
                debug!(session_id = %self.session.id, "session reset to idle");
                self.session = Session::idle();
                self.publish();
                Ok(())
            }
        }
    }

    /// Advances elapsed time and the rest countdown from the clock.
    ///
    /// Elapsed time is recomputed from `started_at`, so ticks missed while
    /// the process was suspended are caught up here in one step. Commands
    /// that read or replace the rest timer catch up the same way first.
    pub fn tick(&mut self) -> TickOutcome {
        if self.session.status != SessionStatus::InProgress {
            return TickOutcome::NotRunning;
        }
        if self.session.paused_since.is_some() {
            return TickOutcome::Paused;
        }

        let now = self.clock.now();
        let (advanced_by, rest_completed) = self.session.catch_up(now);
        if advanced_by > 0 {
            self.publish();
            self.announce_rest_complete(rest_completed);
        }

        TickOutcome::Ticked {
            advanced_by,
            rest_completed,
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn try_start(&mut self, name: &str) -> SessionResult<()> {
        self.expect_status("start", SessionStatus::Idle)?;

        let name = match name.trim() {
            "" => self.default_name.clone(),
            trimmed => trimmed.to_string(),
        };

        self.session = Session {
            id: Uuid::new_v4(),
            status: SessionStatus::InProgress,
            workout_name: name.clone(),
            started_at: Some(self.clock.now()),
            ..Session::idle()
        };

        info!(session_id = %self.session.id, workout = %name, "workout started");
        self.publish();
        self.hub.signal(SessionSignal::Started { name });
        Ok(())
    }

    fn try_rename(&mut self, name: &str) -> SessionResult<()> {
        self.expect_status("rename", SessionStatus::InProgress)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::validation("workout name must not be empty"));
        }

        self.session.workout_name = name.to_string();
        debug!(workout = %name, "workout renamed");
        self.publish();
        Ok(())
    }

    fn try_log_set(&mut self, input: LogSet) -> SessionResult<SetId> {
        self.expect_status("log_set", SessionStatus::InProgress)?;

        let exercise = input.exercise.trim();
        if exercise.is_empty() {
            return Err(SessionError::validation("exercise must not be empty"));
        }
        validate_weight("weight", input.weight)?;
        validate_weight("target weight", input.target_weight)?;

        let entry = SetEntry {
            id: Uuid::new_v4(),
            exercise: exercise.to_string(),
            weight: input.weight,
            reps: input.reps,
            target_weight: input.target_weight,
            target_reps: input.target_reps,
            completed: input.completed,
            position: self.session.next_position,
            logged_at: self.clock.now(),
        };
        let id = entry.id;

        debug!(set_id = %id, exercise = %entry.exercise, reps = entry.reps, "set logged");
        self.session.next_position += 1;
        self.session.sets.insert(id, entry);
        self.publish();
        Ok(id)
    }

    fn try_update_set(&mut self, id: SetId, patch: SetPatch) -> SessionResult<()> {
        self.expect_status("update_set", SessionStatus::InProgress)?;
        let entry = self
            .session
            .sets
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if let Some(weight) = patch.weight {
            validate_weight("weight", weight)?;
        }
        if let Some(weight) = patch.target_weight {
            validate_weight("target weight", weight)?;
        }
        if patch.is_empty() {
            return Ok(());
        }

        if let Some(weight) = patch.weight {
            entry.weight = weight;
        }
        if let Some(reps) = patch.reps {
            entry.reps = reps;
        }
        if let Some(weight) = patch.target_weight {
            entry.target_weight = weight;
        }
        if let Some(reps) = patch.target_reps {
            entry.target_reps = reps;
        }
        if let Some(completed) = patch.completed {
            entry.completed = completed;
        }

        debug!(set_id = %id, "set updated");
        self.publish();
        Ok(())
    }

    fn try_remove_set(&mut self, id: SetId) -> SessionResult<()> {
        self.expect_status("remove_set", SessionStatus::InProgress)?;
        self.session
            .sets
            .remove(&id)
            .ok_or(SessionError::NotFound(id))?;

        debug!(set_id = %id, "set removed");
        self.publish();
        Ok(())
    }

    fn try_start_rest(&mut self, duration_seconds: u32) -> SessionResult<()> {
        self.expect_status("start_rest", SessionStatus::InProgress)?;
        let rest_id = self.last_rest_id + 1;
        let timer = RestTimer::new(rest_id, duration_seconds)?;

        // A previous rest that ran out before this call still completes.
        let (_, ran_out) = self.session.catch_up(self.clock.now());
        if let Some(previous) = self.session.rest.replace(timer) {
            debug!(replaced = previous.rest_id(), "rest restarted");
        }
        self.last_rest_id = rest_id;

        debug!(rest_id, duration_seconds, "rest started");
        self.publish();
        self.announce_rest_complete(ran_out);
        Ok(())
    }

    fn try_extend_rest(&mut self, delta_seconds: i64) -> SessionResult<()> {
        let now = self.clock.now();
        let rest = self.expect_resting("extend_rest", now)?;
        let next = rest.extended(delta_seconds)?;

        // `rest` is already the caught-up timer, so nothing runs out here.
        self.session.catch_up(now);
        if next.is_done() {
            self.session.rest = None;
            self.publish();
            self.announce_rest_complete(Some(next.rest_id()));
        } else {
            self.session.rest = Some(next);
            debug!(
                delta_seconds,
                remaining = next.remaining_seconds(),
                total = next.total_seconds(),
                "rest extended"
            );
            self.publish();
        }
        Ok(())
    }

    fn try_skip_rest(&mut self) -> SessionResult<()> {
        let now = self.clock.now();
        let rest = self.expect_resting("skip_rest", now)?;
        self.session.catch_up(now);
        self.session.rest = None;

        debug!(rest_id = rest.rest_id(), remaining = rest.remaining_seconds(), "rest skipped");
        self.publish();
        Ok(())
    }

    fn try_pause(&mut self) -> SessionResult<()> {
        self.expect_status("pause", SessionStatus::InProgress)?;
        if self.session.paused_since.is_some() {
            return Err(SessionError::invalid("pause", self.session.status));
        }

        let now = self.clock.now();
        let (_, ran_out) = self.session.catch_up(now);
        self.session.paused_since = Some(now);
        debug!(elapsed_seconds = self.session.elapsed_seconds, "workout paused");
        self.publish();
        self.announce_rest_complete(ran_out);
        Ok(())
    }

    fn try_resume(&mut self) -> SessionResult<()> {
        self.expect_status("resume", SessionStatus::InProgress)?;
        let since = self
            .session
            .paused_since
            .ok_or_else(|| SessionError::invalid("resume", self.session.status))?;

        let now = self.clock.now();
        let paused_for = (now - since).max(Duration::zero());
        self.session.paused_total += paused_for;
        self.session.paused_since = None;
        debug!(paused_seconds = paused_for.num_seconds(), "workout resumed");
        self.publish();
        Ok(())
    }

    fn try_finish(&mut self) -> SessionResult<WorkoutSummary> {
        self.expect_status("finish", SessionStatus::InProgress)?;

        let now = self.clock.now();
        let session = &mut self.session;
        if let (_, Some(rest_id)) = session.catch_up(now) {
            debug!(rest_id, "rest ran out before finish, not announced");
        }
        session.paused_since = None;
        session.status = SessionStatus::Finished;
        if let Some(rest) = session.rest.take() {
            debug!(rest_id = rest.rest_id(), "rest discarded by finish");
        }

        let summary = WorkoutSummary {
            id: session.id,
            name: session.workout_name.clone(),
            started_at: session.started_at.unwrap_or(now),
            finished_at: now,
            duration_seconds: session.elapsed_seconds,
            sets: session.ordered_sets(),
        };

        info!(
            session_id = %summary.id,
            sets = summary.sets.len(),
            duration_seconds = summary.duration_seconds,
            "workout finished"
        );
        self.publish();
        self.hub.signal(SessionSignal::Finished(summary.clone()));
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn expect_status(&self, command: &'static str, expected: SessionStatus) -> SessionResult<()> {
        if self.session.status == expected {
            Ok(())
        } else {
            Err(SessionError::invalid(command, self.session.status))
        }
    }

    /// The caught-up rest timer. A rest that has run out by `now` counts as
    /// not resting even if no tick has cleared it yet.
    fn expect_resting(&self, command: &'static str, now: DateTime<Utc>) -> SessionResult<RestTimer> {
        self.expect_status(command, SessionStatus::InProgress)?;
        self.session
            .rest_at(now)
            .ok_or_else(|| SessionError::invalid(command, self.session.status))
    }

    fn announce_rest_complete(&self, rest_completed: Option<u64>) {
        if let Some(rest_id) = rest_completed {
            info!(rest_id, "rest complete");
            self.hub.signal(SessionSignal::RestComplete { rest_id });
        }
    }

    fn publish(&self) {
        self.hub.publish(self.session.snapshot());
    }

    fn log_rejection<T>(&self, command: &'static str, result: SessionResult<T>) -> SessionResult<T> {
        if let Err(err) = &result {
            warn!(command, status = %self.session.status, error = %err, "session command rejected");
        }
        result
    }
}

fn validate_weight(field: &str, weight: Option<f32>) -> SessionResult<()> {
    match weight {
        Some(w) if !w.is_finite() || w < 0.0 => Err(SessionError::validation(format!(
            "{field} must be a non-negative number, got {w}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (SessionStore::new(clock.clone()), clock)
    }

    fn tick_n(store: &mut SessionStore, clock: &ManualClock, n: u32) {
        for _ in 0..n {
            clock.advance_secs(1);
            store.tick();
        }
    }

    #[test]
    fn blank_name_falls_back_to_default() {
        let clock = Arc::new(ManualClock::default());
        let mut s = SessionStore::with_default_name(clock, "Morning lift");
        s.start("   ").unwrap();
        assert_eq!(s.snapshot().workout_name, "Morning lift");
    }

    #[test]
    fn start_initialises_session() {
        let (mut s, clock) = store();
        clock.advance_secs(42);
        s.start("Push").unwrap();

        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::InProgress);
        assert_eq!(snap.started_at, Some(clock.now()));
        assert_eq!(snap.elapsed_seconds, 0);
        assert!(snap.sets.is_empty());
        assert!(!snap.is_resting());
    }

    #[test]
    fn rename_only_while_running() {
        let (mut s, _) = store();
        assert_matches!(s.rename("x"), Err(SessionError::InvalidState { .. }));

        s.start("Push").unwrap();
        assert_matches!(s.rename("  "), Err(SessionError::Validation(_)));
        s.rename("Push B").unwrap();
        assert_eq!(s.snapshot().workout_name, "Push B");
    }

    #[test]
    fn log_set_validates_input() {
        let (mut s, _) = store();
        s.start("Push").unwrap();

        assert_matches!(
            s.log_set(LogSet::new("", Some(60.0), 8)),
            Err(SessionError::Validation(_))
        );
        assert_matches!(
            s.log_set(LogSet::new("bench", Some(-1.0), 8)),
            Err(SessionError::Validation(_))
        );
        assert_matches!(
            s.log_set(LogSet::new("bench", Some(f32::NAN), 8)),
            Err(SessionError::Validation(_))
        );
        assert!(s.snapshot().sets.is_empty());
    }

    #[test]
    fn log_set_does_not_touch_rest() {
        let (mut s, _) = store();
        s.start("Push").unwrap();
        s.start_rest(60).unwrap();
        s.log_set(LogSet::new("bench", Some(60.0), 8)).unwrap();
        assert!(s.is_resting());
    }

    #[test]
    fn set_ids_are_unique_and_positions_ordered() {
        let (mut s, _) = store();
        s.start("Push").unwrap();
        let a = s.log_set(LogSet::new("bench", Some(60.0), 8)).unwrap();
        let b = s.log_set(LogSet::new("bench", Some(60.0), 7)).unwrap();
        let c = s.log_set(LogSet::new("dips", None, 12)).unwrap();
        assert_ne!(a, b);

        let snap = s.snapshot();
        let ids: Vec<_> = snap.sets.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(snap.set_at(3).unwrap().exercise, "dips");
    }

    #[test]
    fn update_set_applies_patch() {
        let (mut s, _) = store();
        s.start("Push").unwrap();
        let id = s
            .log_set(LogSet::new("bench", Some(60.0), 8).with_target(Some(62.5), Some(8)))
            .unwrap();

        s.update_set(
            id,
            SetPatch {
                weight: Some(Some(62.5)),
                completed: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let set = s.snapshot().sets[0].clone();
        assert_eq!(set.weight, Some(62.5));
        assert_eq!(set.reps, 8);
        assert_eq!(set.target_weight, Some(62.5));
        assert!(set.completed);
    }

    #[test]
    fn update_unknown_set_is_not_found() {
        let (mut s, _) = store();
        s.start("Push").unwrap();
        let missing = Uuid::new_v4();
        assert_eq!(
            s.update_set(missing, SetPatch::default()),
            Err(SessionError::NotFound(missing))
        );
        assert_eq!(s.remove_set(missing), Err(SessionError::NotFound(missing)));
    }

    #[test]
    fn invalid_patch_changes_nothing() {
        let (mut s, _) = store();
        s.start("Push").unwrap();
        let id = s.log_set(LogSet::new("bench", Some(60.0), 8)).unwrap();
        let before = s.snapshot();

        let patch = SetPatch {
            reps: Some(10),
            weight: Some(Some(-3.0)),
            ..Default::default()
        };
        assert_matches!(s.update_set(id, patch), Err(SessionError::Validation(_)));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn remove_set_deletes_entry() {
        let (mut s, _) = store();
        s.start("Push").unwrap();
        let id = s.log_set(LogSet::new("bench", Some(60.0), 8)).unwrap();
        s.remove_set(id).unwrap();
        assert!(s.snapshot().sets.is_empty());
    }

    #[test]
    fn rest_requires_running_session() {
        let (mut s, _) = store();
        assert_matches!(s.start_rest(60), Err(SessionError::InvalidState { .. }));
        s.start("Push").unwrap();
        assert_matches!(s.start_rest(0), Err(SessionError::Validation(_)));
        assert_matches!(s.extend_rest(10), Err(SessionError::InvalidState { .. }));
        assert_matches!(s.skip_rest(), Err(SessionError::InvalidState { .. }));
    }

    #[test]
    fn restarting_rest_replaces_timer() {
        let (mut s, clock) = store();
        s.start("Push").unwrap();
        s.start_rest(90).unwrap();
        tick_n(&mut s, &clock, 10);
        s.start_rest(60).unwrap();

        let rest = s.snapshot().rest.unwrap();
        assert_eq!(rest.total_seconds(), 60);
        assert_eq!(rest.remaining_seconds(), 60);
    }

    #[test]
    fn replaced_rest_never_signals() {
        let (mut s, clock) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        s.start_rest(5).unwrap();
        let first = s.snapshot().rest.unwrap().rest_id();
        s.start_rest(10).unwrap();
        tick_n(&mut s, &clock, 10);

        let mut completed = Vec::new();
        while let Ok(sig) = sub.signals.try_recv() {
            if let SessionSignal::RestComplete { rest_id } = sig {
                completed.push(rest_id);
            }
        }
        assert_eq!(completed.len(), 1);
        assert_ne!(completed[0], first);
    }

    #[test]
    fn draining_rest_by_extension_completes_it() {
        let (mut s, _) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        s.start_rest(30).unwrap();
        s.extend_rest(-45).unwrap();

        assert!(!s.is_resting());
        let _ = sub.signals.try_recv(); // Started
        assert_matches!(sub.signals.try_recv(), Ok(SessionSignal::RestComplete { .. }));
    }

    #[test]
    fn skip_rest_is_silent() {
        let (mut s, _) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        s.start_rest(30).unwrap();
        s.skip_rest().unwrap();

        assert!(!s.is_resting());
        assert_matches!(sub.signals.try_recv(), Ok(SessionSignal::Started { .. }));
        assert!(sub.signals.try_recv().is_err());
    }

    #[test]
    fn missed_ticks_are_caught_up_from_the_clock() {
        let (mut s, clock) = store();
        s.start("Push").unwrap();
        s.start_rest(90).unwrap();

        // Process suspended for five minutes, then a single tick arrives.
        clock.advance_secs(300);
        let outcome = s.tick();

        assert_eq!(
            outcome,
            TickOutcome::Ticked {
                advanced_by: 300,
                rest_completed: Some(1)
            }
        );
        assert_eq!(s.snapshot().elapsed_seconds, 300);
        assert!(!s.is_resting());
    }

    fn rest_signals(sub: &mut Subscription) -> Vec<u64> {
        std::iter::from_fn(|| sub.signals.try_recv().ok())
            .filter_map(|sig| match sig {
                SessionSignal::RestComplete { rest_id } => Some(rest_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rest_started_after_untracked_time_runs_its_full_length() {
        let (mut s, clock) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        clock.advance_secs(30);
        s.start_rest(60).unwrap();
        assert_eq!(s.snapshot().elapsed_seconds, 30);

        clock.advance_secs(1);
        s.tick();
        assert_eq!(s.snapshot().rest.unwrap().remaining_seconds(), 59);
        assert!(rest_signals(&mut sub).is_empty());
    }

    #[test]
    fn rest_that_ran_out_before_a_restart_still_completes() {
        let (mut s, clock) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        s.start_rest(5).unwrap();
        clock.advance_secs(8);
        s.start_rest(60).unwrap();

        assert_eq!(rest_signals(&mut sub), vec![1]);
        let rest = s.snapshot().rest.unwrap();
        assert_eq!(rest.rest_id(), 2);
        assert_eq!(rest.remaining_seconds(), 60);
    }

    #[test]
    fn pause_counts_the_rest_down_first() {
        let (mut s, clock) = store();
        s.start("Push").unwrap();
        s.start_rest(60).unwrap();
        clock.advance_secs(10);
        s.pause().unwrap();
        assert_eq!(s.snapshot().rest.unwrap().remaining_seconds(), 50);

        clock.advance_secs(300);
        s.resume().unwrap();
        clock.advance_secs(5);
        s.tick();

        let snap = s.snapshot();
        assert_eq!(snap.elapsed_seconds, 15);
        assert_eq!(snap.rest.unwrap().remaining_seconds(), 45);
    }

    #[test]
    fn pause_completes_a_rest_that_already_ran_out() {
        let (mut s, clock) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        s.start_rest(5).unwrap();
        clock.advance_secs(9);
        s.pause().unwrap();

        assert!(!s.is_resting());
        assert_eq!(rest_signals(&mut sub), vec![1]);
    }

    #[test]
    fn extension_applies_to_the_caught_up_remaining() {
        let (mut s, clock) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        s.start_rest(30).unwrap();
        clock.advance_secs(20);

        s.extend_rest(15).unwrap();
        let rest = s.snapshot().rest.unwrap();
        assert_eq!(rest.remaining_seconds(), 25);
        assert_eq!(rest.total_seconds(), 45);
        assert_eq!(s.snapshot().elapsed_seconds, 20);

        clock.advance_secs(5);
        s.extend_rest(-20).unwrap();
        assert!(!s.is_resting());
        assert_eq!(rest_signals(&mut sub), vec![1]);
    }

    #[test]
    fn rest_commands_after_it_ran_out_are_rejected_untouched() {
        let (mut s, clock) = store();
        s.start("Push").unwrap();
        s.start_rest(5).unwrap();
        clock.advance_secs(10);
        let before = s.snapshot();

        assert_matches!(s.extend_rest(30), Err(SessionError::InvalidState { .. }));
        assert_matches!(s.skip_rest(), Err(SessionError::InvalidState { .. }));
        assert_eq!(s.snapshot(), before);

        // The next tick still reports it.
        assert_matches!(
            s.tick(),
            TickOutcome::Ticked {
                rest_completed: Some(1),
                ..
            }
        );
    }

    #[test]
    fn finish_and_cancel_swallow_a_rest_that_ran_out_untracked() {
        for finish in [true, false] {
            let (mut s, clock) = store();
            let mut sub = s.subscribe();
            s.start("Push").unwrap();
            s.start_rest(3).unwrap();
            clock.advance_secs(7);

            if finish {
                assert_eq!(s.finish().unwrap().duration_seconds, 7);
            } else {
                s.cancel();
                assert_eq!(s.snapshot().elapsed_seconds, 7);
            }
            assert!(!s.is_resting());
            assert!(rest_signals(&mut sub).is_empty());
        }
    }

    #[test]
    fn clock_stepping_back_never_lowers_elapsed() {
        let (mut s, clock) = store();
        s.start("Push").unwrap();
        tick_n(&mut s, &clock, 10);
        clock.advance_secs(-5);
        s.tick();
        assert_eq!(s.snapshot().elapsed_seconds, 10);
    }

    #[test]
    fn paused_time_is_excluded() {
        let (mut s, clock) = store();
        s.start("Push").unwrap();
        s.start_rest(60).unwrap();
        tick_n(&mut s, &clock, 10);

        s.pause().unwrap();
        assert_matches!(s.pause(), Err(SessionError::InvalidState { .. }));
        clock.advance_secs(120);
        assert_eq!(s.tick(), TickOutcome::Paused);
        s.resume().unwrap();
        assert_matches!(s.resume(), Err(SessionError::InvalidState { .. }));

        tick_n(&mut s, &clock, 5);
        let snap = s.snapshot();
        assert_eq!(snap.elapsed_seconds, 15);
        assert_eq!(snap.rest.unwrap().remaining_seconds(), 45);
    }

    #[test]
    fn finish_while_paused_freezes_at_pause_point() {
        let (mut s, clock) = store();
        s.start("Push").unwrap();
        tick_n(&mut s, &clock, 20);
        s.pause().unwrap();
        clock.advance_secs(600);

        let summary = s.finish().unwrap();
        assert_eq!(summary.duration_seconds, 20);
        assert!(!s.snapshot().paused);
    }

    #[test]
    fn finish_settles_elapsed_and_suppresses_rest_signal() {
        let (mut s, clock) = store();
        let mut sub = s.subscribe();
        s.start("Push").unwrap();
        s.start_rest(3).unwrap();
        clock.advance_secs(2);

        let summary = s.finish().unwrap();
        assert_eq!(summary.duration_seconds, 2);
        assert!(!s.is_resting());

        clock.advance_secs(5);
        assert_eq!(s.tick(), TickOutcome::NotRunning);
        assert_eq!(s.snapshot().elapsed_seconds, 2);

        let signals: Vec<_> = std::iter::from_fn(|| sub.signals.try_recv().ok()).collect();
        assert_matches!(signals.as_slice(), [SessionSignal::Started { .. }, SessionSignal::Finished(_)]);
    }

    #[test]
    fn cancel_outside_a_workout_is_a_no_op() {
        let (mut s, _) = store();
        s.cancel();
        assert_eq!(s.status(), SessionStatus::Idle);

        s.start("Push").unwrap();
        s.finish().unwrap();
        s.cancel();
        assert_eq!(s.status(), SessionStatus::Finished);
    }

    #[test]
    fn reset_rules() {
        let (mut s, _) = store();
        s.reset().unwrap();
        s.start("Push").unwrap();
        assert_matches!(s.reset(), Err(SessionError::InvalidState { .. }));
        s.finish().unwrap();
        s.reset().unwrap();
        assert_eq!(s.snapshot(), SessionSnapshot::idle());
    }

    #[test]
    fn start_from_terminal_requires_reset() {
        let (mut s, _) = store();
        s.start("Push").unwrap();
        s.cancel();
        assert_matches!(
            s.start("Pull"),
            Err(SessionError::InvalidState {
                command: "start",
                status: SessionStatus::Cancelled
            })
        );
    }

    #[test]
    fn rejected_commands_do_not_publish() {
        let (mut s, _) = store();
        let mut sub = s.subscribe();
        sub.current();

        let _ = s.log_set(LogSet::new("bench", Some(60.0), 8));
        let _ = s.finish();
        let _ = s.skip_rest();
        assert!(!sub.snapshots.has_changed().unwrap());
    }

    /// Every command sequence up to length four only walks legal status edges,
    /// and a rejected command leaves the snapshot untouched.
    #[test]
    fn status_only_follows_legal_edges() {
        const COMMANDS: usize = 8;
        let legal = |from: SessionStatus, to: SessionStatus| {
            use SessionStatus::*;
            from == to
                || matches!(
                    (from, to),
                    (Idle, InProgress) | (InProgress, Finished) | (InProgress, Cancelled) | (Finished, Idle) | (Cancelled, Idle)
                )
        };

        for mut code in 0..COMMANDS.pow(4) {
            let (mut s, clock) = store();
            for _ in 0..4 {
                let cmd = code % COMMANDS;
                code /= COMMANDS;

                let before = s.snapshot();
                let ok = match cmd {
                    0 => s.start("A").is_ok(),
                    1 => s.log_set(LogSet::new("e", Some(1.0), 1)).is_ok(),
                    2 => s.start_rest(2).is_ok(),
                    3 => {
                        clock.advance_secs(1);
                        s.tick();
                        true
                    }
                    4 => s.finish().is_ok(),
                    5 => {
                        s.cancel();
                        true
                    }
                    6 => s.reset().is_ok(),
                    _ => s.extend_rest(-1).is_ok(),
                };
                let after = s.snapshot();

                assert!(legal(before.status, after.status), "{} -> {}", before.status, after.status);
                if !ok {
                    assert_eq!(before, after);
                }
                if before.status != SessionStatus::InProgress && cmd == 3 {
                    assert_eq!(before.elapsed_seconds, after.elapsed_seconds);
                }
                if let Some(rest) = after.rest {
                    assert!(rest.remaining_seconds() <= rest.total_seconds());
                }
            }
        }
    }
}
