use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::cli::Cli;
use crate::config::Config;
use crate::control::Control;
use crate::error::Result;
use crate::executor::{PageDriver, RelayOps};
use crate::interpret::{Interpreter, InterpreterClient};
use crate::page::SnapshotOptions;
use crate::relay::{
    generate_token, read_token_file, token_file_path, write_token_file, BridgeBrowserOps,
    BridgePageDriver, BridgeServer, BrowserOps, Relay, VarStore,
};
use crate::session::Session;

pub async fn run(cli: &Cli, port: Option<u16>) -> Result<()> {
    let mut config = Config::load()?;

    // CLI flags win over file and environment
    if let Some(ref url) = cli.interpreter_url {
        config.interpreter.base_url = url.clone();
    }
    if let Some(ref key) = cli.api_key {
        config.interpreter.api_key = Some(key.clone());
    }

    let port = port.unwrap_or(config.bridge.port);

    // Reuse an existing session token so a paired extension survives restarts
    let token = match read_token_file().await {
        Some(token) => token,
        None => {
            let token = generate_token();
            write_token_file(&token).await?;
            token
        }
    };

    if !cli.json {
        println!(
            "{} Session token: {}",
            "✓".green(),
            token_file_path()?.display().to_string().dimmed()
        );
        if config.interpreter.api_key.is_none() {
            println!(
                "  {} No interpreter API key configured; set interpreter.api_key if the service requires one",
                "!".yellow()
            );
        }
    }

    let server = BridgeServer::new(port, token);
    let handle = server.handle(Duration::from_secs(config.bridge.request_timeout_secs));

    let driver: Arc<dyn PageDriver> = Arc::new(BridgePageDriver::new(handle.clone()));
    let ops: Arc<dyn BrowserOps> = Arc::new(BridgeBrowserOps::new(handle));
    let relay: Arc<dyn RelayOps> = Arc::new(Relay::new(ops, config.search.url.clone()));
    let interpreter: Arc<dyn Interpreter> =
        Arc::new(InterpreterClient::from_config(&config.interpreter)?);

    let store = Arc::new(VarStore::new());
    let session = Arc::new(Session::new(Arc::clone(&store)));
    let control = Arc::new(Control::new(
        session,
        store,
        driver,
        relay,
        interpreter,
        SnapshotOptions::from(&config.snapshot),
    ));

    server.serve(control).await
}
