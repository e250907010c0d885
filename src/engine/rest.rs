//! Countdown nested inside an in-progress session.

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// A running rest period.
///
/// `remaining_seconds <= total_seconds` holds after every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestTimer {
    rest_id: u64,
    total_seconds: u32,
    remaining_seconds: u32,
}

impl RestTimer {
    pub(crate) fn new(rest_id: u64, duration_seconds: u32) -> SessionResult<Self> {
        if duration_seconds == 0 {
            return Err(SessionError::validation("rest duration must be at least one second"));
        }

        Ok(Self {
            rest_id,
            total_seconds: duration_seconds,
            remaining_seconds: duration_seconds,
        })
    }

    /// Identifies the `start_rest` call this timer belongs to.
    pub fn rest_id(&self) -> u64 {
        self.rest_id
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_done(&self) -> bool {
        self.remaining_seconds == 0
    }

    /// Fraction of the rest already served, for progress rings.
    pub fn progress(&self) -> f64 {
        1.0 - self.remaining_seconds as f64 / self.total_seconds as f64
    }

    /// Returns the timer after applying `delta`, leaving `self` untouched so
    /// the caller can commit or drop the result.
    ///
    /// A positive delta grows both counters; a negative one only eats into
    /// the remaining time and never lowers the total.
    pub(crate) fn extended(&self, delta: i64) -> SessionResult<Self> {
        let mut next = *self;
        if delta >= 0 {
            let delta = u32::try_from(delta)
                .map_err(|_| SessionError::validation("rest extension is too large"))?;
            next.total_seconds = self
                .total_seconds
                .checked_add(delta)
                .ok_or_else(|| SessionError::validation("rest extension is too large"))?;
            next.remaining_seconds = self.remaining_seconds + delta;
        } else {
            let cut = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
            next.remaining_seconds = self.remaining_seconds.saturating_sub(cut);
        }
        Ok(next)
    }

    /// Counts down by `seconds`, stopping at zero.
    pub(crate) fn advance(&mut self, seconds: u64) {
        let step = u32::try_from(seconds).unwrap_or(u32::MAX);
        self.remaining_seconds = self.remaining_seconds.saturating_sub(step);
    }
}
