//! Config command implementation.

use anyhow::{Context, Result};

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::style;

pub fn cmd_config(action: ConfigAction, no_color: bool) -> Result<()> {
    let path = Config::path();
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let config = Config::load();
            let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{}", content);
        }
        ConfigAction::Get { key } => match Config::load().get(key) {
            Some(value) => println!("{}", value),
            None => eprintln!("{}", style::info("(not set)", no_color)),
        },
        ConfigAction::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, &value)?;
            config.save()?;
            eprintln!(
                "{}",
                style::success(&format!("Set {:?} = {}", key, value), no_color)
            );
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load();
            config.unset(key);
            config.save()?;
            eprintln!("{}", style::success(&format!("Unset {:?}", key), no_color));
        }
        ConfigAction::Init => {
            if path.exists() {
                eprintln!(
                    "{}",
                    style::warning(
                        &format!("Config already exists at {}", path.display()),
                        no_color
                    )
                );
            } else {
                Config::default().save()?;
                eprintln!(
                    "{}",
                    style::success(&format!("Created {}", path.display()), no_color)
                );
            }
        }
    }
    Ok(())
}
