use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use strsim::jaro_winkler;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{broadcast::error::RecvError, watch};

use lazarus_live::config::Settings;
use lazarus_live::engine::{IndicatorWatch, LiveSession, Route, SessionSignal, SessionSnapshot, SessionStore};
use lazarus_live::models::{LogSet, OneRMFormula, SessionStatus, SetPatch};
use lazarus_live::{SystemClock, history, utils};

use crate::cli::LiveArgs;
use crate::commands::history::print_summary;

/// Everything the user can type at the `live` prompt.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Log {
        weight: Option<f32>,
        reps: u32,
        exercise: String,
    },
    Target {
        set: usize,
        weight: Option<f32>,
        reps: u32,
    },
    Edit {
        set: usize,
        weight: Option<f32>,
        reps: u32,
    },
    Done(usize),
    Undo(usize),
    Remove(usize),
    Rest(Option<u32>),
    Extend(Option<i64>),
    Skip,
    Pause,
    Resume,
    Rename(String),
    Show,
    Go(Route),
    Finish,
    Cancel,
    New(Option<String>),
    Help,
    Quit,
}

static COMMANDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "log", "target", "edit", "done", "undo", "rm", "rest", "extend", "skip", "pause", "resume",
        "rename", "show", "go", "finish", "cancel", "new", "help", "quit",
    ]
});

const HELP: &str = "\
  log <weight|bw> <reps> <exercise…>   log a completed set
  target <n> <weight|bw> <reps>        set the planned weight/reps of set n
  edit <n> <weight|bw> <reps>          correct set n
  done <n> / undo <n>                  tick / untick set n
  rm <n>                               delete set n
  rest [secs]                          start (or restart) the rest timer
  extend [±secs]                       add to (or cut) the running rest
  skip                                 end the rest now
  pause / resume                       stop / restart the workout clock
  rename <name…>                       rename the workout
  show                                 print the workout
  go <workout|history|settings>        switch view
  finish                               end and save the workout
  cancel                               discard the workout (asks first)
  new [name…]                          start another workout after finishing
  quit                                 leave";

/// Closest known command if similarity is high and clearly ahead of the runner-up.
fn best_command_suggestion(input: &str) -> Option<&'static str> {
    let input = input.to_ascii_lowercase();
    let mut scores: Vec<(&'static str, f64)> = COMMANDS
        .iter()
        .copied()
        .map(|c| (c, jaro_winkler(&input, c)))
        .collect();
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best, best_score) = *scores.first()?;
    let second_score = scores.get(1).map(|(_, s)| *s).unwrap_or(0.0);

    const MIN_SCORE: f64 = 0.80;
    const GAP: f64 = 0.02;

    (best_score >= MIN_SCORE && best_score - second_score >= GAP).then_some(best)
}

fn parse_index(raw: Option<&str>) -> Result<usize, String> {
    raw.ok_or("missing set number")?
        .parse::<usize>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| "set number must be 1 or more".to_string())
}

fn parse_weight(raw: Option<&str>) -> Result<Option<f32>, String> {
    let raw = raw.ok_or("missing weight")?;
    utils::parse_weight(raw).ok_or_else(|| format!("`{raw}` is not a weight (number or `bw`)"))
}

fn parse_reps(raw: Option<&str>) -> Result<u32, String> {
    let raw = raw.ok_or("missing reps")?;
    raw.parse().map_err(|_| format!("`{raw}` is not a rep count"))
}

fn rest_of(words: std::str::SplitWhitespace<'_>) -> Option<String> {
    let joined = words.collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn parse_action(line: &str) -> Result<Action, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(Action::Show);
    };

    let action = match cmd.to_ascii_lowercase().as_str() {
        "log" | "l" => {
            let weight = parse_weight(words.next())?;
            let reps = parse_reps(words.next())?;
            let exercise = rest_of(words).ok_or("missing exercise name")?;
            Action::Log {
                weight,
                reps,
                exercise,
            }
        }
        "target" => Action::Target {
            set: parse_index(words.next())?,
            weight: parse_weight(words.next())?,
            reps: parse_reps(words.next())?,
        },
        "edit" | "e" => Action::Edit {
            set: parse_index(words.next())?,
            weight: parse_weight(words.next())?,
            reps: parse_reps(words.next())?,
        },
        "done" | "d" => Action::Done(parse_index(words.next())?),
        "undo" => Action::Undo(parse_index(words.next())?),
        "rm" => Action::Remove(parse_index(words.next())?),
        "rest" | "r" => match words.next() {
            None => Action::Rest(None),
            Some(raw) => Action::Rest(Some(
                raw.parse()
                    .map_err(|_| format!("`{raw}` is not a number of seconds"))?,
            )),
        },
        "extend" | "x" => match words.next() {
            None => Action::Extend(None),
            Some(raw) => Action::Extend(Some(
                raw.trim_start_matches('+')
                    .parse()
                    .map_err(|_| format!("`{raw}` is not a number of seconds"))?,
            )),
        },
        "skip" | "s" => Action::Skip,
        "pause" => Action::Pause,
        "resume" => Action::Resume,
        "rename" => Action::Rename(rest_of(words).ok_or("missing workout name")?),
        "show" | "i" => Action::Show,
        "go" => Action::Go(Route::parse(words.next().ok_or("missing view name")?)),
        "finish" | "end" => Action::Finish,
        "cancel" => Action::Cancel,
        "new" => Action::New(rest_of(words)),
        "help" | "?" => Action::Help,
        "quit" | "q" | "exit" => Action::Quit,
        other => {
            return Err(match best_command_suggestion(other) {
                Some(s) => format!("unknown command `{other}`, did you mean `{s}`?"),
                None => format!("unknown command `{other}` (try `help`)"),
            });
        }
    };

    Ok(action)
}

enum Flow {
    Continue,
    Quit,
}

struct Ctx<'a> {
    live: LiveSession,
    route: watch::Sender<Route>,
    settings: &'a Settings,
    rest_seconds: u32,
    pool: &'a SqlitePool,
    json: bool,
}

pub async fn handle(args: LiveArgs, settings: &Settings, pool: &SqlitePool, json: bool) -> Result<()> {
    let store = SessionStore::with_default_name(Arc::new(SystemClock), &settings.default_workout_name);
    let live = LiveSession::new(store, settings.tick_interval);
    let (route, route_rx) = watch::channel(Route::ActiveWorkout);

    let mut sub = live.subscribe();
    let indicator = IndicatorWatch::spawn(live.watch(), route_rx);
    let mut pill = indicator.subscribe();

    live.start(args.name.as_deref().unwrap_or(""))?;

    let ctx = Ctx {
        live,
        route,
        settings,
        rest_seconds: args.rest.unwrap_or(settings.default_rest_seconds),
        pool,
        json,
    };

    println!(
        "{} workout started — type {} for commands",
        "ok:".green().bold(),
        "help".bold()
    );
    render(&ctx, &ctx.live.snapshot());
    prompt(&ctx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    // Input closed: keep the work rather than dropping it.
                    if ctx.live.status() == SessionStatus::InProgress {
                        finish(&ctx).await;
                    }
                    break;
                };

                match run_line(&ctx, &line, &mut lines).await? {
                    Flow::Continue => prompt(&ctx),
                    Flow::Quit => break,
                }
            }

            signal = sub.signals.recv() => match signal {
                Ok(SessionSignal::RestComplete { .. }) => {
                    println!("\x07\n{} rest complete — next set!", "⏰".bold());
                    prompt(&ctx);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },

            Ok(()) = pill.changed() => {
                if *pill.borrow_and_update() {
                    println!("\n{}", pill_line(&ctx.live.snapshot()));
                    prompt(&ctx);
                }
            }
        }
    }

    Ok(())
}

async fn run_line(ctx: &Ctx<'_>, line: &str, lines: &mut Lines<BufReader<Stdin>>) -> Result<Flow> {
    let action = match parse_action(line) {
        Ok(action) => action,
        Err(msg) => {
            println!("{} {}", "error:".red().bold(), msg);
            return Ok(Flow::Continue);
        }
    };

    let live = &ctx.live;
    let snap = live.snapshot();
    let set_id = |n: usize| {
        snap.set_at(n)
            .map(|s| s.id)
            .ok_or_else(|| format!("no set {n} (the workout has {})", snap.sets.len()))
    };
    let set_completed = |n: usize, completed: bool| {
        set_id(n).and_then(|id| {
            let patch = SetPatch {
                completed: Some(completed),
                ..Default::default()
            };
            live.update_set(id, patch).map_err(|e| e.to_string())
        })
    };

    let result: Result<(), String> = match action {
        Action::Log {
            weight,
            reps,
            exercise,
        } => live
            .log_set(LogSet::new(exercise, weight, reps).completed())
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Action::Target { set, weight, reps } => set_id(set).and_then(|id| {
            let patch = SetPatch {
                target_weight: Some(weight),
                target_reps: Some(Some(reps)),
                ..Default::default()
            };
            live.update_set(id, patch).map_err(|e| e.to_string())
        }),
        Action::Edit { set, weight, reps } => set_id(set).and_then(|id| {
            let patch = SetPatch {
                weight: Some(weight),
                reps: Some(reps),
                ..Default::default()
            };
            live.update_set(id, patch).map_err(|e| e.to_string())
        }),
        Action::Done(n) => set_completed(n, true),
        Action::Undo(n) => set_completed(n, false),
        Action::Remove(n) => set_id(n).and_then(|id| live.remove_set(id).map_err(|e| e.to_string())),
        Action::Rest(secs) => live
            .start_rest(secs.unwrap_or(ctx.rest_seconds))
            .map_err(|e| e.to_string()),
        Action::Extend(delta) => live
            .extend_rest(delta.unwrap_or(ctx.settings.rest_extend_seconds as i64))
            .map_err(|e| e.to_string()),
        Action::Skip => live.skip_rest().map_err(|e| e.to_string()),
        Action::Pause => live.pause().map_err(|e| e.to_string()),
        Action::Resume => live.resume().map_err(|e| e.to_string()),
        Action::Rename(name) => live.rename(&name).map_err(|e| e.to_string()),
        Action::Show => {
            let _ = ctx.route.send_replace(Route::ActiveWorkout);
            Ok(())
        }
        Action::Go(route) => {
            show_route(ctx, &route).await?;
            let _ = ctx.route.send_replace(route);
            return Ok(Flow::Continue);
        }
        Action::Finish => {
            if snap.status != SessionStatus::InProgress {
                Err(format!("nothing to finish, the workout is {}", snap.status))
            } else {
                finish(ctx).await;
                return Ok(Flow::Continue);
            }
        }
        Action::Cancel => {
            if snap.status != SessionStatus::InProgress {
                Err(format!("nothing to cancel, the workout is {}", snap.status))
            } else if confirm_cancel(&snap, lines).await? {
                live.cancel();
                println!("{} workout discarded", "ok:".green().bold());
                return Ok(Flow::Continue);
            } else {
                println!("{}", "kept going".dimmed());
                return Ok(Flow::Continue);
            }
        }
        Action::New(name) => live
            .reset()
            .and_then(|_| live.start(name.as_deref().unwrap_or("")))
            .map_err(|e| e.to_string()),
        Action::Help => {
            println!("{HELP}");
            return Ok(Flow::Continue);
        }
        Action::Quit => {
            if snap.status == SessionStatus::InProgress {
                Err("a workout is in progress, `finish` or `cancel` it first".to_string())
            } else {
                return Ok(Flow::Quit);
            }
        }
    };

    match result {
        Ok(()) => render(ctx, &live.snapshot()),
        Err(msg) => println!("{} {}", "error:".red().bold(), msg),
    }
    Ok(Flow::Continue)
}

/// Ends the workout and hands it to history. A failed save is reported, the
/// summary is still shown, and nothing is retried.
async fn finish(ctx: &Ctx<'_>) {
    let summary = match ctx.live.finish() {
        Ok(summary) => summary,
        Err(e) => {
            println!("{} {}", "error:".red().bold(), e);
            return;
        }
    };

    if ctx.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => println!("{} {}", "error:".red().bold(), e),
        }
    } else {
        print_summary(&summary, OneRMFormula::default());
    }

    match history::save_workout(ctx.pool, &summary).await {
        Ok(()) => println!("{} saved to history", "ok:".green().bold()),
        Err(e) => println!("{} could not save workout: {}", "error:".red().bold(), e),
    }
    println!("{}", "type `new [name]` for another workout or `quit`".dimmed());
}

async fn confirm_cancel(snap: &SessionSnapshot, lines: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
    print!(
        "{} discard this workout and its {} set(s)? [y/N] ",
        "warning:".yellow().bold(),
        snap.sets.len()
    );
    std::io::stdout().flush()?;

    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn show_route(ctx: &Ctx<'_>, route: &Route) -> Result<()> {
    match route {
        Route::ActiveWorkout => render(ctx, &ctx.live.snapshot()),
        Route::History => {
            let rows = history::list_workouts(ctx.pool, 5).await?;
            println!("{}", "Recent workouts:".cyan().bold());
            if rows.is_empty() {
                println!("  {}", "(none yet)".dimmed());
            }
            for row in rows {
                println!(
                    "  {} — {} ({} sets)",
                    row.name.bold(),
                    utils::format_seconds(row.duration_seconds),
                    row.set_count
                );
            }
        }
        Route::Settings => {
            let s = ctx.settings;
            println!("{}", "Settings:".cyan().bold());
            println!("  default name   = {}", s.default_workout_name);
            println!("  rest           = {}s (this workout: {}s)", s.default_rest_seconds, ctx.rest_seconds);
            println!("  extend step    = {}s", s.rest_extend_seconds);
            println!("  tick           = {}ms", s.tick_interval.as_millis());
            println!("  database       = {}", s.db_path);
        }
        Route::Other(name) => println!("{} no view named `{}`", "warning:".yellow().bold(), name),
    }
    Ok(())
}

fn render(ctx: &Ctx<'_>, snap: &SessionSnapshot) {
    if ctx.json {
        match serde_json::to_string(snap) {
            Ok(s) => println!("{s}"),
            Err(e) => println!("{} {}", "error:".red().bold(), e),
        }
        return;
    }

    let paused = if snap.paused { " (paused)".yellow().to_string() } else { String::new() };
    println!(
        "{} {} — {}{}",
        "Session:".cyan().bold(),
        snap.workout_name.bold(),
        utils::format_seconds(snap.elapsed_seconds),
        paused
    );

    for (i, set) in snap.sets.iter().enumerate() {
        let mark = if set.completed { "✓".green() } else { "·".dimmed() };
        let target = match (set.target_weight, set.target_reps) {
            (None, None) => String::new(),
            (w, r) => format!(
                " (target {} × {})",
                utils::format_weight(w),
                r.map(|r| r.to_string()).unwrap_or_else(|| "?".into())
            )
            .dimmed()
            .to_string(),
        };
        println!(
            "{} {} {} — {} × {}{}",
            format!("{:>2}", i + 1).yellow(),
            mark,
            set.exercise.bold(),
            utils::format_weight(set.weight),
            set.reps,
            target
        );
    }

    if let Some(rest) = snap.rest {
        let width = term_size::dimensions().map(|(w, _)| w).unwrap_or(80);
        let bar = utils::progress_bar(rest.progress(), width.saturating_sub(30).clamp(10, 40));
        println!(
            "{} {} {} / {}",
            "rest".blue().bold(),
            bar,
            utils::format_seconds(rest.remaining_seconds() as u64),
            utils::format_seconds(rest.total_seconds() as u64)
        );
    }
}

fn pill_line(snap: &SessionSnapshot) -> String {
    let rest = snap
        .rest
        .map(|r| format!(" · rest {}", utils::format_seconds(r.remaining_seconds() as u64)))
        .unwrap_or_default();
    format!(
        "{} {} {}{} — `go workout` to return",
        "●".red(),
        snap.workout_name.bold(),
        utils::format_seconds(snap.elapsed_seconds),
        rest
    )
}

fn prompt(ctx: &Ctx<'_>) {
    let snap = ctx.live.snapshot();
    let tag = match snap.status {
        SessionStatus::InProgress => utils::format_seconds(snap.elapsed_seconds),
        status => status.to_string(),
    };
    print!("{} {} ", format!("[{}]", tag).dimmed(), "›".cyan());
    // A failed flush only delays the prompt.
    let _ = std::io::stdout().flush();
}
