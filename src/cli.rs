use clap::{Args, Parser, Subcommand};
use lazarus_live::models::OneRMFormula;

#[derive(Parser)]
#[command(name = "lazarus-live", version, about = "Live workout tracker")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    /// Log engine transitions to stderr.
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Track a workout interactively
    #[command(visible_alias = "l")]
    Live(LiveArgs),

    /// Finished workouts
    #[command(subcommand, visible_alias = "h")]
    History(HistoryCmd),

    /// View or edit lazarus config
    #[command(subcommand)]
    Config(ConfigCmd),
}

//
// Commands
//

#[derive(Args)]
pub struct LiveArgs {
    /// Workout name (defaults to `workout.default_name`)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Rest duration in seconds used by a bare `rest` (defaults to `rest.default_seconds`)
    #[arg(short, long)]
    pub rest: Option<u32>,
}

#[derive(Subcommand)]
pub enum HistoryCmd {
    /// List finished workouts, newest first
    #[command(visible_alias = "l")]
    List {
        /// How many workouts to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show one workout in detail
    #[command(visible_alias = "s")]
    Show {
        /// Index (from `history list`) or id
        workout: String,

        /// Formula used for the estimated 1RM
        #[arg(short, long, value_enum, default_value_t)]
        formula: OneRMFormula,
    },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Remove a key
    Unset { key: String },
}
