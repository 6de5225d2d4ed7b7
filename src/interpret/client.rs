use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use super::types::{InterpretationResult, SpokenCommand};
use crate::config::InterpreterConfig;
use crate::error::{Result, VoxpilotError};
use crate::page::PageSnapshot;

/// The interpretation contract: user text plus a page snapshot in, either an
/// executable command or a clarifying question out. Seam for substituting
/// the HTTP collaborator in tests.
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(
        &self,
        user_text: &str,
        snapshot: &PageSnapshot,
    ) -> Result<InterpretationResult>;
}

/// Client for the language-understanding collaborator.
///
/// The collaborator owns speech-to-text and text-to-speech; this side only
/// speaks its HTTP shape and turns failures into user-meaningful messages.
pub struct InterpreterClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl InterpreterClient {
    /// Create a new client from config
    pub fn from_config(config: &InterpreterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                VoxpilotError::InterpreterError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Build a request with common headers
    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.post(&url);

        if let Some(ref key) = self.api_key {
            req = req.header("X-API-Key", key);
        }

        req
    }

    /// Classify a recorded utterance into a `{key, value}` spoken command.
    pub async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<SpokenCommand> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("utterance.wav")
            .mime_str(mime_type)
            .map_err(|e| VoxpilotError::InterpreterError(format!("Bad audio mime type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .request("/analyze-audio")
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoxpilotError::InterpreterError(format!("Request failed: {}", e)))?;

        self.handle_response(response).await
    }

    /// Synthesize speech for a user-facing message. Returns WAV bytes.
    pub async fn speak(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .request("/generate-tts")
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| VoxpilotError::InterpreterError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| {
                VoxpilotError::InterpreterError(format!("Failed to read audio: {}", e))
            })?;
            Ok(bytes.to_vec())
        } else {
            Err(VoxpilotError::InterpreterError(status_message(status)))
        }
    }

    /// Handle a JSON response from the collaborator
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                VoxpilotError::InterpreterError(format!("Malformed response: {}", e))
            })
        } else {
            // Try to surface the service's own error message first
            let message = match response.json::<serde_json::Value>().await {
                Ok(body) => body
                    .get("error")
                    .and_then(|e| e.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| status_message(status)),
                Err(_) => status_message(status),
            };
            Err(VoxpilotError::InterpreterError(message))
        }
    }
}

#[async_trait]
impl Interpreter for InterpreterClient {
    /// Turn user text plus the snapshot captured at request time into either
    /// an executable command or a clarifying question.
    ///
    /// The snapshot must be the one current when the user spoke; callers are
    /// responsible for discarding the result if the page moved on while this
    /// call was in flight.
    async fn interpret(
        &self,
        user_text: &str,
        snapshot: &PageSnapshot,
    ) -> Result<InterpretationResult> {
        let context = serde_json::to_string(snapshot)?;

        let response = self
            .request("/process-command")
            .json(&json!({
                "userPrompt": user_text,
                "pageHtmlContext": context,
            }))
            .send()
            .await
            .map_err(|e| VoxpilotError::InterpreterError(format!("Request failed: {}", e)))?;

        self.handle_response(response).await
    }
}

fn status_message(status: StatusCode) -> String {
    match status {
        StatusCode::NOT_FOUND => "Interpreter endpoint not found".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "Rate limited. Please try again later.".to_string(),
        StatusCode::UNAUTHORIZED => "Invalid or missing API key".to_string(),
        _ => format!("Interpreter error: {}", status),
    }
}
