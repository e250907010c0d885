//! Live workout session engine.
//!
//! - [`SessionStore`]: the state machine and single owner of session state.
//! - [`RestTimer`]: countdown nested in a running session.
//! - [`ObserverHub`] / [`Subscription`]: snapshot and signal fan-out.
//! - [`LiveSession`]: Tokio driver that ticks the store while a workout runs.
//! - [`IndicatorWatch`]: derived "workout in progress" pill visibility.

pub mod indicator;
pub mod live;
pub mod observe;
pub mod rest;
pub mod store;

pub use indicator::{IndicatorWatch, Route, indicator_visible};
pub use live::{DEFAULT_TICK_INTERVAL, LiveSession};
pub use observe::{ObserverHub, SessionSignal, SessionSnapshot, Subscription};
pub use rest::RestTimer;
pub use store::{DEFAULT_WORKOUT_NAME, SessionStore, TickOutcome};
