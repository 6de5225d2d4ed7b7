use clap::{Parser, Subcommand};

use crate::commands;
use crate::error::Result;

/// Voxpilot - page-aware voice command engine for the browser
#[derive(Parser)]
#[command(name = "voxpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Interpreter service base URL
    #[arg(long, env = "VOXPILOT_INTERPRETER_URL", global = true)]
    pub interpreter_url: Option<String>,

    /// API key for the interpreter service
    #[arg(long, env = "VOXPILOT_API_KEY", global = true)]
    pub api_key: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge server the browser extension connects to
    Serve {
        /// Port to listen on (0 picks a free port)
        #[arg(short, long, env = "VOXPILOT_BRIDGE_PORT")]
        port: Option<u16>,
    },

    /// Interpret an instruction against a captured page
    Interpret {
        /// The instruction, e.g. "click the login button"
        text: String,

        /// Path to a captured page (JSON), as reported by the extension
        #[arg(short = 'f', long)]
        page: String,
    },

    /// Sanitize a captured page and print the snapshot
    Sanitize {
        /// Path to a captured page (JSON), as reported by the extension
        #[arg(short = 'f', long)]
        page: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the merged configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Set a configuration value
    Set {
        /// Config key (e.g. "interpreter.base_url")
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Config key (e.g. "bridge.port")
        key: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match &self.command {
            Commands::Serve { port } => commands::serve::run(&self, *port).await,
            Commands::Interpret { text, page } => {
                commands::interpret::run(&self, text, page).await
            }
            Commands::Sanitize { page } => commands::sanitize::run(&self, page).await,
            Commands::Config { command } => commands::config::run(&self, command).await,
        }
    }
}
