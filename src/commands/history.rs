use anyhow::Result;
use colored::Colorize;
use lazarus_live::{
    history,
    models::{OneRMFormula, WorkoutSummary},
    utils,
};
use sqlx::SqlitePool;

use crate::cli::HistoryCmd;

pub async fn handle(cmd: HistoryCmd, pool: &SqlitePool, json: bool) -> Result<()> {
    match cmd {
        HistoryCmd::List { limit } => {
            let rows = history::list_workouts(pool, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            if rows.is_empty() {
                println!("{}", "(no finished workouts)".dimmed());
                return Ok(());
            }

            println!("{}", "Workouts:".cyan().bold());
            for (i, row) in rows.iter().enumerate() {
                println!(
                    "{} • {} — {} ({}, {} sets)",
                    format!("{}", i + 1).yellow(),
                    row.name.bold(),
                    row.started_at.format("%Y-%m-%d %H:%M"),
                    utils::format_seconds(row.duration_seconds),
                    row.set_count
                );
            }
        }

        HistoryCmd::Show { workout, formula } => match history::load_workout(pool, &workout).await? {
            Some(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_summary(&summary, formula),
            None => println!("{} no workout matches `{}`", "error:".red().bold(), workout),
        },
    }

    Ok(())
}

/// Per-exercise breakdown, shared with the end-of-workout report.
pub fn print_summary(summary: &WorkoutSummary, formula: OneRMFormula) {
    println!(
        "{} {} ({} — {})",
        "Workout:".cyan().bold(),
        summary.name.bold(),
        summary.started_at.format("%Y-%m-%d %H:%M"),
        utils::format_seconds(summary.duration_seconds)
    );

    if summary.sets.is_empty() {
        println!("  {}", "no sets logged".dimmed());
        return;
    }

    for (i, (exercise, sets)) in summary.by_exercise().into_iter().enumerate() {
        println!("{} • {}", format!("{}", i + 1).yellow(), exercise.bold());
        for (n, set) in sets.iter().enumerate() {
            let mark = if set.completed { "✓".green() } else { "·".dimmed() };
            println!(
                "    {} set {}: {} × {}",
                mark,
                n + 1,
                utils::format_weight(set.weight),
                set.reps
            );
        }
    }

    let bests = summary.personal_bests(formula);
    if !bests.is_empty() {
        println!("{}", format!("Best estimated 1RM ({formula}):").cyan().bold());
        for pb in bests {
            println!(
                "  {} — {}kg × {} ({:.1}kg)",
                pb.exercise,
                pb.weight,
                pb.reps,
                pb.estimated_1rm
            );
        }
    }

    println!(
        "{} {}/{} sets completed",
        "ok:".green().bold(),
        summary.completed_sets(),
        summary.sets.len()
    );
}
