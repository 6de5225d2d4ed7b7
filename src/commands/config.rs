use colored::Colorize;

use crate::cli::{Cli, ConfigCommands};
use crate::config::Config;
use crate::error::{Result, VoxpilotError};

pub async fn run(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(cli).await,
        ConfigCommands::Path => path(cli).await,
        ConfigCommands::Set { key, value } => set(cli, key, value).await,
        ConfigCommands::Get { key } => get(cli, key).await,
    }
}

async fn show(cli: &Cli) -> Result<()> {
    let config = Config::load()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| VoxpilotError::ConfigError(e.to_string()))?;
        println!("{}", toml_str);
    }

    Ok(())
}

async fn path(cli: &Cli) -> Result<()> {
    let path = Config::config_path();

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string()
            })
        );
    } else {
        println!("{}", path.display());
    }

    Ok(())
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| VoxpilotError::ConfigError(format!("{} must be a number", key)))
}

async fn set(_cli: &Cli, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    match key {
        "interpreter.base_url" => config.interpreter.base_url = value.to_string(),
        "interpreter.api_key" => config.interpreter.api_key = Some(value.to_string()),
        "interpreter.timeout_secs" => {
            config.interpreter.timeout_secs = value.parse().map_err(|_| {
                VoxpilotError::ConfigError("timeout_secs must be a number".to_string())
            })?
        }
        "bridge.port" => {
            config.bridge.port = value
                .parse()
                .map_err(|_| VoxpilotError::ConfigError("port must be a number".to_string()))?
        }
        "bridge.request_timeout_secs" => {
            config.bridge.request_timeout_secs = value.parse().map_err(|_| {
                VoxpilotError::ConfigError("request_timeout_secs must be a number".to_string())
            })?
        }
        "snapshot.max_elements" => config.snapshot.max_elements = parse_usize(key, value)?,
        "snapshot.max_text_len" => config.snapshot.max_text_len = parse_usize(key, value)?,
        "snapshot.max_attr_len" => config.snapshot.max_attr_len = parse_usize(key, value)?,
        "search.url" => config.search.url = value.to_string(),
        _ => {
            return Err(VoxpilotError::ConfigError(format!(
                "Unknown config key: {}",
                key
            )))
        }
    }

    config.save()?;
    println!("{} Set {} = {}", "✓".green(), key, value);

    Ok(())
}

async fn get(cli: &Cli, key: &str) -> Result<()> {
    let config = Config::load()?;

    let value = match key {
        "interpreter.base_url" => Some(config.interpreter.base_url.clone()),
        "interpreter.api_key" => config.interpreter.api_key.clone(),
        "interpreter.timeout_secs" => Some(config.interpreter.timeout_secs.to_string()),
        "bridge.port" => Some(config.bridge.port.to_string()),
        "bridge.request_timeout_secs" => Some(config.bridge.request_timeout_secs.to_string()),
        "snapshot.max_elements" => Some(config.snapshot.max_elements.to_string()),
        "snapshot.max_text_len" => Some(config.snapshot.max_text_len.to_string()),
        "snapshot.max_attr_len" => Some(config.snapshot.max_attr_len.to_string()),
        "search.url" => Some(config.search.url.clone()),
        _ => {
            return Err(VoxpilotError::ConfigError(format!(
                "Unknown config key: {}",
                key
            )))
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "key": key,
                "value": value
            })
        );
    } else {
        match value {
            Some(v) => println!("{}", v),
            None => println!("{}", "(not set)".dimmed()),
        }
    }

    Ok(())
}
