use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Result, VoxpilotError};

/// Protocol version of the control side. Extensions announcing an older
/// version are rejected during the hello handshake.
pub const PROTOCOL_VERSION: &str = "0.3.0";

/// Minimum protocol version we accept in the hello handshake.
const MIN_PROTOCOL_VERSION: &str = "0.3.0";

/// Token prefix for all bridge session tokens.
const TOKEN_PREFIX: &str = "vox_";

/// Generate a new session token: `vox_` + 32 random hex characters.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", TOKEN_PREFIX, hex)
}

fn data_file(name: &str) -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| VoxpilotError::Other("Cannot determine local data directory".to_string()))?;
    Ok(data_dir.join("voxpilot").join(name))
}

/// Path to the bridge token file: `~/.local/share/voxpilot/bridge-token`
pub fn token_file_path() -> Result<PathBuf> {
    data_file("bridge-token")
}

/// Path to the bridge port file: `~/.local/share/voxpilot/bridge-port`
pub fn port_file_path() -> Result<PathBuf> {
    data_file("bridge-port")
}

/// Write the session token to disk with mode 0600 so the extension's native
/// helper can pick it up. Temp file plus rename keeps the write atomic.
pub async fn write_token_file(token: &str) -> Result<()> {
    let path = token_file_path()?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        let tmp_path = path.with_extension("tmp");
        let mut opts = tokio::fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true).mode(0o600);
        let mut file = opts.open(&tmp_path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, token.as_bytes()).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &path).await?;
    }

    #[cfg(not(unix))]
    {
        tokio::fs::write(&path, token).await?;
    }

    Ok(())
}

/// Read the token from the token file. Returns None if the file is missing.
pub async fn read_token_file() -> Option<String> {
    let path = token_file_path().ok()?;
    tokio::fs::read_to_string(&path)
        .await
        .ok()
        .map(|s| s.trim().to_string())
}

pub async fn delete_token_file() {
    if let Ok(path) = token_file_path() {
        let _ = tokio::fs::remove_file(&path).await;
    }
}

/// Write the bridge port to disk so the extension can discover it.
pub async fn write_port_file(port: u16) -> Result<()> {
    let path = port_file_path()?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, port.to_string()).await?;
    Ok(())
}

/// Read the bridge port. Returns None if the file is missing or invalid.
pub async fn read_port_file() -> Option<u16> {
    let path = port_file_path().ok()?;
    let content = tokio::fs::read_to_string(&path).await.ok()?;
    content.trim().parse().ok()
}

pub async fn delete_port_file() {
    if let Ok(path) = port_file_path() {
        let _ = tokio::fs::remove_file(&path).await;
    }
}

/// Requests arriving FROM the extension (page contexts and the browser's own
/// events), discriminated by their `action` field. The returned value is sent
/// back as the correlated result when the request carried an id.
#[async_trait]
pub trait ExtensionEvents: Send + Sync {
    async fn on_request(&self, action: &str, message: Value) -> Result<Value>;
}

/// Shared state for the bridge server
struct BridgeState {
    /// Session token clients must present in the hello handshake
    token: String,
    /// Channel to the connected extension, when one is attached
    extension_tx: Option<mpsc::UnboundedSender<String>>,
    /// Control-side requests waiting for extension responses, by request id
    pending: HashMap<u64, oneshot::Sender<Value>>,
    /// Monotonically increasing request id counter
    next_id: u64,
}

impl BridgeState {
    fn new(token: String) -> Self {
        Self {
            token,
            extension_tx: None,
            pending: HashMap::new(),
            next_id: 1,
        }
    }
}

/// Control-side handle for sending correlated requests to the extension.
#[derive(Clone)]
pub struct BridgeHandle {
    state: Arc<Mutex<BridgeState>>,
    request_timeout: Duration,
}

impl BridgeHandle {
    /// Whether an extension is currently attached.
    pub async fn connected(&self) -> bool {
        self.state.lock().await.extension_tx.is_some()
    }

    /// Send `{id, method, params}` to the extension and await the response
    /// with the same id. A response carrying an `error` object becomes a
    /// bridge error; a missing extension or a timeout never panics the
    /// control context.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let (id, rx) = {
            let mut state = self.state.lock().await;
            let tx = state
                .extension_tx
                .clone()
                .ok_or(VoxpilotError::ExtensionNotConnected)?;

            let id = state.next_id;
            state.next_id += 1;

            let (done_tx, done_rx) = oneshot::channel();
            state.pending.insert(id, done_tx);

            let message = json!({ "id": id, "method": method, "params": params });
            if tx.send(message.to_string()).is_err() {
                state.pending.remove(&id);
                return Err(VoxpilotError::ExtensionNotConnected);
            }
            (id, done_rx)
        };

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => value,
            Ok(Err(_)) => {
                return Err(VoxpilotError::BridgeError(
                    "Extension disconnected mid-request".to_string(),
                ))
            }
            Err(_) => {
                self.state.lock().await.pending.remove(&id);
                return Err(VoxpilotError::Timeout(format!(
                    "No response from extension for {}",
                    method
                )));
            }
        };

        if let Some(err) = response.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown extension error");
            return Err(VoxpilotError::BridgeError(message.to_string()));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// The bridge WebSocket server: one listener, at most one extension client.
///
/// The event handler is supplied to `serve` rather than the constructor so
/// callers can build it around the handle first.
pub struct BridgeServer {
    port: u16,
    state: Arc<Mutex<BridgeState>>,
}

impl BridgeServer {
    pub fn new(port: u16, token: String) -> Self {
        Self {
            port,
            state: Arc::new(Mutex::new(BridgeState::new(token))),
        }
    }

    pub fn handle(&self, request_timeout: Duration) -> BridgeHandle {
        BridgeHandle {
            state: Arc::clone(&self.state),
            request_timeout,
        }
    }

    /// Run the server until shutdown. Blocks the calling task.
    pub async fn serve(self, events: Arc<dyn ExtensionEvents>) -> Result<()> {
        // Clean up stale discovery files from an ungraceful shutdown
        delete_port_file().await;

        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| VoxpilotError::BridgeError(format!("Failed to bind to {}: {}", addr, e)))?;
        let port = listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.port);

        println!("Bridge listening on ws://127.0.0.1:{}", port);

        if let Err(e) = write_port_file(port).await {
            tracing::warn!("Failed to write port file: {}. Extension auto-pairing may not work.", e);
        }

        let shutdown = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigint =
                    signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");
                let mut sigterm =
                    signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
                tokio::select! {
                    _ = sigint.recv() => tracing::info!("Received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                }
            }
            #[cfg(not(unix))]
            {
                tokio::signal::ctrl_c().await.ok();
            }
        };

        let accept_loop = async {
            loop {
                let (stream, peer) = listener.accept().await.map_err(|e| {
                    VoxpilotError::BridgeError(format!("Accept failed: {}", e))
                })?;

                tracing::debug!("New connection from {}", peer);

                // Only loopback peers may even start the upgrade.
                if !peer.ip().is_loopback() {
                    tracing::warn!("Rejected non-loopback connection from {}", peer);
                    drop(stream);
                    continue;
                }

                let state = Arc::clone(&self.state);
                let events = Arc::clone(&events);
                tokio::spawn(handle_connection(stream, state, events));
            }
        };

        let result: Result<()> = tokio::select! {
            r = accept_loop => r,
            _ = shutdown => {
                tracing::info!("Shutting down bridge...");
                Ok(())
            }
        };

        delete_port_file().await;
        result
    }
}

/// Spawn a server on the given port with a fresh handle. Convenience wrapper
/// used by the CLI and tests.
pub fn serve(
    port: u16,
    token: String,
    events: Arc<dyn ExtensionEvents>,
    request_timeout: Duration,
) -> (BridgeHandle, tokio::task::JoinHandle<Result<()>>) {
    let server = BridgeServer::new(port, token);
    let handle = server.handle(request_timeout);
    let join = tokio::spawn(server.serve(events));
    (handle, join)
}

/// Parse an origin string into (scheme, host).
fn parse_origin(origin: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = origin.split_once("://")?;
    if rest.is_empty() {
        return None;
    }
    // IPv6 bracket notation, e.g. [::1]:8080; the brackets are part of the
    // host and may contain colons.
    if rest.starts_with('[') {
        let end_bracket = rest.find(']')?;
        let host = &rest[..end_bracket + 1];
        let after = &rest[end_bracket + 1..];
        if after.is_empty() || after == "/" || after.starts_with(':') {
            Some((scheme, host))
        } else {
            None
        }
    } else {
        let host_end = rest.find([':', '/']).unwrap_or(rest.len());
        let host = &rest[..host_end];
        if host.is_empty() {
            None
        } else {
            Some((scheme, host))
        }
    }
}

/// Accept extension origins and loopback http pages; browsers omit the
/// header for non-page clients, which is also fine.
fn is_origin_allowed(origin: Option<&str>) -> bool {
    match origin {
        None => true,
        Some(o) => {
            let lower = o.to_lowercase();
            match parse_origin(&lower) {
                None => false,
                Some((scheme, host)) => match scheme {
                    "chrome-extension" | "moz-extension" => true,
                    "http" => matches!(host, "127.0.0.1" | "localhost" | "[::1]"),
                    _ => false,
                },
            }
        }
    }
}

/// Handle one incoming connection: origin check during the upgrade, hello
/// handshake, then the extension message loop.
async fn handle_connection(
    stream: TcpStream,
    state: Arc<Mutex<BridgeState>>,
    events: Arc<dyn ExtensionEvents>,
) {
    let ws = match tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &tokio_tungstenite::tungstenite::http::Request<()>,
         resp: tokio_tungstenite::tungstenite::http::Response<()>|
         -> std::result::Result<
            tokio_tungstenite::tungstenite::http::Response<()>,
            tokio_tungstenite::tungstenite::http::Response<Option<String>>,
        > {
            let origin = req.headers().get("origin").and_then(|v| v.to_str().ok());

            if !is_origin_allowed(origin) {
                tracing::warn!("Rejected WebSocket connection with origin: {:?}", origin);
                let rejection = tokio_tungstenite::tungstenite::http::Response::builder()
                    .status(StatusCode::FORBIDDEN)
                    .body(Some("Forbidden origin".to_string()))
                    .unwrap();
                return Err(rejection);
            }

            Ok(resp)
        },
    )
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws.split();

    // First message must be the hello handshake
    let first_msg =
        match tokio::time::timeout(Duration::from_secs(5), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => text.to_string(),
            _ => {
                tracing::warn!("Client disconnected or timed out before sending hello");
                return;
            }
        };

    let parsed: Value = match serde_json::from_str(&first_msg) {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!("Invalid JSON from client");
            return;
        }
    };

    let msg_type = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
    if msg_type != "hello" {
        tracing::warn!("Expected hello message, got type={}", msg_type);
        return;
    }

    let client_token = parsed.get("token").and_then(|t| t.as_str()).unwrap_or("");
    let client_version = parsed
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0");

    let min_version = semver::Version::parse(MIN_PROTOCOL_VERSION).unwrap();
    match semver::Version::parse(client_version) {
        Ok(v) if v >= min_version => {}
        _ => {
            tracing::warn!(
                "Rejected extension with protocol version {} (minimum: {})",
                client_version,
                MIN_PROTOCOL_VERSION
            );
            let err_msg = json!({
                "type": "hello_error",
                "error": "version_mismatch",
                "message": format!(
                    "Protocol version {} is not supported. Minimum required: {}",
                    client_version, MIN_PROTOCOL_VERSION
                ),
                "required_version": PROTOCOL_VERSION,
            });
            let _ = write.send(Message::Text(err_msg.to_string().into())).await;
            return;
        }
    }

    // Constant-time token check to avoid a timing side-channel
    {
        let s = state.lock().await;
        if client_token.as_bytes().ct_eq(s.token.as_bytes()).unwrap_u8() != 1 {
            tracing::warn!("Invalid token from extension");
            let err_msg = json!({
                "type": "hello_error",
                "error": "invalid_token",
                "message": "Token mismatch. Re-read the token file and reconnect.",
            });
            let _ = write.send(Message::Text(err_msg.to_string().into())).await;
            return;
        }
    }

    let ack = json!({ "type": "hello_ack", "version": PROTOCOL_VERSION });
    if write.send(Message::Text(ack.to_string().into())).await.is_err() {
        tracing::warn!("Failed to send hello_ack");
        return;
    }

    run_extension_loop(write, read, state, events).await;
}

/// Message loop for an authenticated extension connection. Routes responses
/// to the pending control requests and dispatches `action` requests to the
/// event handler without blocking the reader (a handler may itself need a
/// round-trip through this same connection).
async fn run_extension_loop(
    mut write: futures::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<TcpStream>,
        Message,
    >,
    mut read: futures::stream::SplitStream<tokio_tungstenite::WebSocketStream<TcpStream>>,
    state: Arc<Mutex<BridgeState>>,
    events: Arc<dyn ExtensionEvents>,
) {
    println!("  {} Extension connected", colored::Colorize::green("✓"));

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    {
        let mut s = state.lock().await;
        s.extension_tx = Some(tx.clone());
    }

    let write_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
        let _ = write
            .send(Message::Close(Some(
                tokio_tungstenite::tungstenite::protocol::CloseFrame {
                    code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
                    reason: "Session ended".into(),
                },
            )))
            .await;
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let message: Value = match serde_json::from_str(text.as_str()) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::error!("Invalid JSON from extension: {}", e);
                        continue;
                    }
                };

                if let Some(action) = message.get("action").and_then(|a| a.as_str()) {
                    let action = action.to_string();
                    let events = Arc::clone(&events);
                    let reply_tx = tx.clone();
                    tokio::spawn(async move {
                        let id = message.get("id").and_then(|i| i.as_u64());
                        let result = events.on_request(&action, message).await;
                        if let Some(id) = id {
                            let reply = match result {
                                Ok(value) => json!({ "id": id, "result": value }),
                                Err(e) => json!({
                                    "id": id,
                                    "error": { "message": e.to_string() }
                                }),
                            };
                            let _ = reply_tx.send(reply.to_string());
                        } else if let Err(e) = result {
                            tracing::warn!(action = %action, "request failed: {}", e);
                        }
                    });
                } else if let Some(id) = message.get("id").and_then(|i| i.as_u64()) {
                    let mut s = state.lock().await;
                    if let Some(sender) = s.pending.remove(&id) {
                        let _ = sender.send(message);
                    } else {
                        // Late response for a superseded request; drop it.
                        tracing::debug!("Response for unknown request id: {}", id);
                    }
                } else {
                    tracing::debug!("Extension message without action or id: {}", message);
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!("Extension WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    println!("  {} Extension disconnected", colored::Colorize::yellow("!"));

    {
        let mut s = state.lock().await;
        for (id, sender) in s.pending.drain() {
            let _ = sender.send(json!({
                "id": id,
                "error": { "code": -32000, "message": "Extension disconnected" }
            }));
        }
        s.extension_tx = None;
    }
    write_handle.abort();
}
