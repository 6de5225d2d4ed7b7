use colored::Colorize;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::{Result, VoxpilotError};
use crate::interpret::{InterpretationResult, Interpreter, InterpreterClient};
use crate::page::{sanitize, PageDom, SnapshotOptions};

/// Interpret one instruction against a captured page and print the decision.
/// Offline counterpart of the serve loop, useful for prompt debugging.
pub async fn run(cli: &Cli, text: &str, page: &str) -> Result<()> {
    let mut config = Config::load()?;

    if let Some(ref url) = cli.interpreter_url {
        config.interpreter.base_url = url.clone();
    }
    if let Some(ref key) = cli.api_key {
        config.interpreter.api_key = Some(key.clone());
    }

    let dom = load_page(page)?;
    let snapshot = sanitize(&dom, &SnapshotOptions::from(&config.snapshot));

    if cli.verbose {
        eprintln!(
            "Snapshot: {} elements from {}",
            snapshot.elements.len(),
            snapshot.url
        );
    }

    let client = InterpreterClient::from_config(&config.interpreter)?;
    let result = client.interpret(text, &snapshot).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result {
        InterpretationResult::Action { command } => {
            println!("{} {}", "✓".green(), command.key().bold());
            println!("{}", serde_json::to_string_pretty(&command)?);
        }
        InterpretationResult::Clarification { question } => {
            println!("{} {}", "?".yellow(), question);
        }
    }

    Ok(())
}

pub(crate) fn load_page(path: &str) -> Result<PageDom> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| VoxpilotError::Other(format!("Cannot read {}: {}", path, e)))?;
    let dom: PageDom = serde_json::from_str(&content)
        .map_err(|e| VoxpilotError::Other(format!("{} is not a page capture: {}", path, e)))?;
    Ok(dom)
}
