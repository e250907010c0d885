use std::fmt::Display;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils;

/// Stable identifier of a set, unique within one session.
pub type SetId = Uuid;

/// Lifecycle of the one session a store tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    InProgress,
    Finished,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        };

        write!(f, "{}", s)
    }
}

/// One logged set inside a live session.
/// `weight == None` means bodyweight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub id: SetId,
    pub exercise: String,
    pub weight: Option<f32>,
    pub reps: u32,
    pub target_weight: Option<f32>,
    pub target_reps: Option<u32>,
    pub completed: bool,
    pub position: u32,
    pub logged_at: DateTime<Utc>,
}

impl SetEntry {
    /// `None` for bodyweight and zero-rep sets.
    pub fn estimated_1rm(&self, formula: OneRMFormula) -> Option<f32> {
        self.weight
            .filter(|w| *w > 0.0 && self.reps > 0)
            .map(|w| utils::calculate_1rm(w, self.reps, formula))
    }
}

/// Input for `SessionStore::log_set`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSet {
    pub exercise: String,
    pub weight: Option<f32>,
    pub reps: u32,
    pub target_weight: Option<f32>,
    pub target_reps: Option<u32>,
    pub completed: bool,
}

impl LogSet {
    pub fn new(exercise: impl Into<String>, weight: Option<f32>, reps: u32) -> Self {
        Self {
            exercise: exercise.into(),
            weight,
            reps,
            target_weight: None,
            target_reps: None,
            completed: false,
        }
    }

    /// Attach the planned weight/reps the set was aiming for.
    pub fn with_target(mut self, weight: Option<f32>, reps: Option<u32>) -> Self {
        self.target_weight = weight;
        self.target_reps = reps;
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }
}

/// Partial update applied by `SessionStore::update_set`.
///
/// Outer `None` leaves a field untouched. For the weight fields the inner
/// `None` switches the set to bodyweight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetPatch {
    pub weight: Option<Option<f32>>,
    pub reps: Option<u32>,
    pub target_weight: Option<Option<f32>>,
    pub target_reps: Option<Option<u32>>,
    pub completed: Option<bool>,
}

impl SetPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Best estimated one-rep max reached for an exercise in one workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalBest {
    pub exercise: String,
    pub weight: f32,
    pub reps: u32,
    pub estimated_1rm: f32,
}

/// What a finished session hands to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub id: Uuid,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub sets: Vec<SetEntry>,
}

impl WorkoutSummary {
    pub fn completed_sets(&self) -> usize {
        self.sets.iter().filter(|s| s.completed).count()
    }

    /// Sets grouped per exercise, in the order exercises were first logged.
    pub fn by_exercise(&self) -> Vec<(&str, Vec<&SetEntry>)> {
        self.sets
            .iter()
            .map(|s| s.exercise.as_str())
            .unique()
            .map(|name| {
                let sets = self.sets.iter().filter(|s| s.exercise == name).collect();
                (name, sets)
            })
            .collect()
    }

    pub fn personal_bests(&self, formula: OneRMFormula) -> Vec<PersonalBest> {
        self.sets
            .iter()
            .filter_map(|s| s.estimated_1rm(formula).map(|rm| (s, rm)))
            .into_group_map_by(|(s, _)| s.exercise.clone())
            .into_iter()
            .filter_map(|(exercise, sets)| {
                sets.into_iter()
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(s, rm)| PersonalBest {
                        exercise,
                        weight: s.weight.unwrap_or_default(),
                        reps: s.reps,
                        estimated_1rm: rm,
                    })
            })
            .sorted_by(|a, b| a.exercise.cmp(&b.exercise))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OneRMFormula {
    #[default]
    Epley,
    Brzycki,
    Lombardi,
    OConner,
}

impl Display for OneRMFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Epley => "Epley",
            Self::Brzycki => "Brzycki",
            Self::Lombardi => "Lombardi",
            Self::OConner => "O'Conner",
        };

        write!(f, "{}", s)
    }
}
