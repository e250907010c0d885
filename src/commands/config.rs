use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use lazarus_live::config::{Config, KNOWN_KEYS, Settings};

use crate::cli::ConfigCmd;

pub fn handle(cmd: ConfigCmd, config_path: &Path, json: bool) -> Result<()> {
    let mut cfg = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match cmd {
        ConfigCmd::List => {
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if cfg.map.is_empty() {
                println!("{}", "(no config set)".dimmed());
                println!("{} {}", "known keys:".dimmed(), KNOWN_KEYS.join(", ").dimmed());
            } else {
                println!("{}", "Config:".cyan().bold());
                for (k, v) in &cfg.map {
                    println!("  {} = {}", k.green(), v);
                }
            }
        }

        ConfigCmd::Get { key } => match cfg.map.get(&key) {
            Some(val) => println!("{}", val),
            None => println!("{} key `{}` not found", "warning:".yellow().bold(), key),
        },

        ConfigCmd::Set { key, val } => {
            cfg.map.insert(key.clone(), val.clone());
            // Reject values the engine could not start with.
            Settings::from_config(&cfg)?;
            cfg.save(config_path)?;
            if !KNOWN_KEYS.contains(&key.as_str()) {
                println!("{} `{}` is not a key lazarus reads", "warning:".yellow().bold(), key);
            }
            println!("{} set `{}` = `{}`", "info:".blue().bold(), key.green(), val);
        }

        ConfigCmd::Unset { key } => {
            if cfg.map.remove(&key).is_some() {
                cfg.save(config_path)?;
                println!("{} removed `{}`", "info:".blue().bold(), key.green());
            } else {
                println!("{} key `{}` not found", "warning:".yellow().bold(), key);
            }
        }
    }

    Ok(())
}
