//! Live workout tracking: a session state machine with a nested rest timer,
//! observable snapshots, and the terminal front end's supporting pieces.

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    IndicatorWatch, LiveSession, Route, SessionSignal, SessionSnapshot, SessionStore, Subscription,
};
pub use error::{SessionError, SessionResult};
pub use models::{LogSet, SessionStatus, SetEntry, SetId, SetPatch, WorkoutSummary};
