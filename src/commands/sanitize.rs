use colored::Colorize;

use crate::cli::Cli;
use crate::commands::interpret::load_page;
use crate::config::Config;
use crate::error::Result;
use crate::page::{sanitize, SnapshotOptions};

/// Sanitize a captured page and print the snapshot that would be sent to the
/// interpreter. Lets you see exactly what the model sees.
pub async fn run(cli: &Cli, page: &str) -> Result<()> {
    let config = Config::load()?;

    let dom = load_page(page)?;
    let snapshot = sanitize(&dom, &SnapshotOptions::from(&config.snapshot));

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("{}", snapshot.url.bold());
    println!(
        "{} of {} raw nodes kept",
        snapshot.elements.len(),
        dom.nodes.len()
    );
    println!();

    for element in &snapshot.elements {
        let tag = serde_json::to_value(&element.tag)?
            .as_str()
            .unwrap_or("?")
            .to_string();
        if element.attrs.is_empty() {
            println!("  {:<10} {}", tag.cyan(), element.text);
        } else {
            let attrs: Vec<String> = element
                .attrs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!(
                "  {:<10} {} {}",
                tag.cyan(),
                element.text,
                attrs.join(" ").dimmed()
            );
        }
    }

    Ok(())
}
