//! Persistence of finished workouts.
//!
//! This is the receiving end of the `finish` handoff. A failed save is
//! reported to the caller and never retried here.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{SetEntry, WorkoutSummary};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("corrupt {column} in stored workout: {reason}")]
    Decode { column: &'static str, reason: String },
}

/// One line of `history list`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WorkoutRow {
    pub id: Uuid,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub set_count: i64,
}

pub async fn save_workout(pool: &SqlitePool, summary: &WorkoutSummary) -> Result<(), HistoryError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO workouts (id, name, started_at, finished_at, duration_seconds) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(summary.id.to_string())
    .bind(&summary.name)
    .bind(stamp(summary.started_at))
    .bind(stamp(summary.finished_at))
    .bind(i64::try_from(summary.duration_seconds).unwrap_or(i64::MAX))
    .execute(&mut *tx)
    .await?;

    for set in &summary.sets {
        sqlx::query(
            r#"
            INSERT INTO workout_sets
                (id, workout_id, exercise, weight, reps, target_weight, target_reps, completed, position, logged_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(set.id.to_string())
        .bind(summary.id.to_string())
        .bind(&set.exercise)
        .bind(set.weight)
        .bind(set.reps)
        .bind(set.target_weight)
        .bind(set.target_reps)
        .bind(set.completed)
        .bind(set.position)
        .bind(stamp(set.logged_at))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(workout_id = %summary.id, sets = summary.sets.len(), "workout saved");
    Ok(())
}

/// Most recent first.
pub async fn list_workouts(pool: &SqlitePool, limit: u32) -> Result<Vec<WorkoutRow>, HistoryError> {
    let rows = sqlx::query(
        r#"
        SELECT w.id, w.name, w.started_at, w.duration_seconds,
               (SELECT COUNT(*) FROM workout_sets s WHERE s.workout_id = w.id) AS set_count
        FROM workouts w
        ORDER BY w.started_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<WorkoutRow, HistoryError> {
            Ok(WorkoutRow {
                id: uuid_col(row, "id")?,
                name: row.try_get("name")?,
                started_at: time_col(row, "started_at")?,
                duration_seconds: seconds_col(row, "duration_seconds")?,
                set_count: row.try_get("set_count")?,
            })
        })
        .collect()
}

/// Looks a workout up by full id, or by 1-based position in `list_workouts`
/// order when `key` is a small number.
pub async fn load_workout(pool: &SqlitePool, key: &str) -> Result<Option<WorkoutSummary>, HistoryError> {
    let id: Option<String> = match key.parse::<i64>() {
        Ok(idx) if idx >= 1 => {
            sqlx::query_scalar("SELECT id FROM workouts ORDER BY started_at DESC LIMIT 1 OFFSET ?")
                .bind(idx - 1)
                .fetch_optional(pool)
                .await?
        }
        _ => sqlx::query_scalar("SELECT id FROM workouts WHERE id = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?,
    };

    let Some(id) = id else {
        debug!(key, "no stored workout matches");
        return Ok(None);
    };

    let row = sqlx::query(
        "SELECT id, name, started_at, finished_at, duration_seconds FROM workouts WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;

    let sets = sqlx::query(
        r#"
        SELECT id, exercise, weight, reps, target_weight, target_reps, completed, position, logged_at
        FROM workout_sets
        WHERE workout_id = ?
        ORDER BY position
        "#,
    )
    .bind(&id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(set_from_row)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(WorkoutSummary {
        id: uuid_col(&row, "id")?,
        name: row.try_get("name")?,
        started_at: time_col(&row, "started_at")?,
        finished_at: time_col(&row, "finished_at")?,
        duration_seconds: seconds_col(&row, "duration_seconds")?,
        sets,
    }))
}

fn set_from_row(row: &SqliteRow) -> Result<SetEntry, HistoryError> {
    Ok(SetEntry {
        id: uuid_col(row, "id")?,
        exercise: row.try_get("exercise")?,
        weight: row.try_get("weight")?,
        reps: row.try_get("reps")?,
        target_weight: row.try_get("target_weight")?,
        target_reps: row.try_get("target_reps")?,
        completed: row.try_get("completed")?,
        position: row.try_get("position")?,
        logged_at: time_col(row, "logged_at")?,
    })
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn stamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn uuid_col(row: &SqliteRow, column: &'static str) -> Result<Uuid, HistoryError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| HistoryError::Decode {
        column,
        reason: e.to_string(),
    })
}

fn time_col(row: &SqliteRow, column: &'static str) -> Result<DateTime<Utc>, HistoryError> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HistoryError::Decode {
            column,
            reason: e.to_string(),
        })
}

fn seconds_col(row: &SqliteRow, column: &'static str) -> Result<u64, HistoryError> {
    let raw: i64 = row.try_get(column)?;
    u64::try_from(raw).map_err(|e| HistoryError::Decode {
        column,
        reason: e.to_string(),
    })
}
