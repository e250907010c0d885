use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use lazarus_live::{config::Config, config::Settings, db, logging};

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config_path = Config::default_path()?;

    match cli.cmd {
        Commands::Config(cmd) => commands::config::handle(cmd, &config_path, cli.json)?,
        Commands::Live(args) => {
            let settings = Settings::from_config(&Config::load(&config_path)?)?;
            let pool = db::open(&settings.db_path).await?;
            commands::live::handle(args, &settings, &pool, cli.json).await?
        }
        Commands::History(cmd) => {
            let settings = Settings::from_config(&Config::load(&config_path)?)?;
            let pool = db::open(&settings.db_path).await?;
            commands::history::handle(cmd, &pool, cli.json).await?
        }
    }

    Ok(())
}
