use std::str::FromStr;

use sqlx::{
    Executor, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub type DB = SqlitePool;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS workouts (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    started_at       TEXT NOT NULL,
    finished_at      TEXT NOT NULL,
    duration_seconds INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS workout_sets (
    id            TEXT PRIMARY KEY,
    workout_id    TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
    exercise      TEXT NOT NULL,
    weight        REAL,
    reps          INTEGER NOT NULL,
    target_weight REAL,
    target_reps   INTEGER,
    completed     INTEGER NOT NULL,
    position      INTEGER NOT NULL,
    logged_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS workout_sets_workout ON workout_sets(workout_id, position);
"#;

pub async fn open(path: &str) -> Result<DB, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    pool.execute(SCHEMA).await?;
    Ok(pool)
}

/// Single-connection in-memory database; every connection to `:memory:` is
/// its own database, so the pool must not open a second one.
pub async fn open_in_memory() -> Result<DB, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;

    pool.execute(SCHEMA).await?;
    Ok(pool)
}
