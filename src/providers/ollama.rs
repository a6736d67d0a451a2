//! Ollama backend: `/api/generate` for completions, `/api/tags` for the
//! model listing.
//!
//! Ollama streams newline-delimited JSON objects rather than SSE frames, so
//! the streaming loop buffers raw bytes and only parses complete lines.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::traits::{InferenceBackend, ModelInfo, RelayError};
use crate::config::schema::DEFAULT_BODY_LIMIT_BYTES;
use crate::config::OllamaConfig;

const GENERATE_PATH: &str = "/api/generate";
const TAGS_PATH: &str = "/api/tags";

/// Longest unterminated line tolerated while streaming.
const MAX_PENDING_LINE_BYTES: usize = DEFAULT_BODY_LIMIT_BYTES;

pub struct OllamaClient {
    base_url: String,
    model: String,
    options: GenerateOptions,
    timeout: Duration,
    probe_timeout: Duration,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: GenerateOptions {
                temperature: config.temperature,
                top_p: config.top_p,
                num_predict: config.num_predict,
            },
            timeout: Duration::from_secs(config.timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn path_ends_with(&self, suffix: &str) -> bool {
        if let Ok(url) = reqwest::Url::parse(&self.base_url) {
            return url.path().trim_end_matches('/').ends_with(suffix);
        }

        self.base_url.ends_with(suffix)
    }

    /// Completion endpoint. The configured URL may be the server root or the
    /// full `/api/generate` endpoint.
    pub fn generate_url(&self) -> String {
        if self.path_ends_with(GENERATE_PATH) {
            self.base_url.clone()
        } else {
            format!("{}{GENERATE_PATH}", self.base_url)
        }
    }

    /// Model listing endpoint, derived as a sibling of the completion endpoint.
    pub fn tags_url(&self) -> String {
        if let Some(prefix) = self.base_url.strip_suffix(GENERATE_PATH) {
            return format!("{prefix}{TAGS_PATH}");
        }
        if self.path_ends_with(TAGS_PATH) {
            return self.base_url.clone();
        }
        format!("{}{TAGS_PATH}", self.base_url)
    }

    fn request<'a>(&'a self, prompt: &'a str, stream: bool) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: &self.options,
        }
    }

    async fn post_generate(
        &self,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, RelayError> {
        let response = self
            .client
            .post(self.generate_url())
            .timeout(self.timeout)
            .json(&self.request(prompt, stream))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %self.generate_url(), "Request to Ollama failed: {e}");
                RelayError::ConnectionFailure(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(super::api_error(response).await);
        }
        Ok(response)
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// One line of a streamed `/api/generate` response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Drain complete lines off the front of `buffer`, leaving the incomplete
/// tail in place. Returns the non-empty trimmed lines.
pub fn drain_ndjson_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let Some(last_newline) = buffer.iter().rposition(|b| *b == b'\n') else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for raw in buffer.drain(..=last_newline).as_slice().split(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(raw).trim().to_string();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

enum LineOutcome {
    Continue,
    Done,
    ReceiverGone,
}

async fn handle_line(
    line: &str,
    answer: &mut String,
    tx: &mpsc::Sender<String>,
    status: u16,
) -> Result<LineOutcome, RelayError> {
    let chunk = match serde_json::from_str::<GenerateChunk>(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!("Skipping malformed stream line: {e}");
            return Ok(LineOutcome::Continue);
        }
    };

    if let Some(error) = chunk.error {
        tracing::error!(status, "Ollama stream reported an error: {error}");
        return Err(RelayError::BackendError {
            status,
            body: super::sanitize_api_error(&error),
        });
    }

    if !chunk.response.is_empty() {
        answer.push_str(&chunk.response);
        if tx.send(chunk.response).await.is_err() {
            return Ok(LineOutcome::ReceiverGone);
        }
    }

    Ok(if chunk.done {
        LineOutcome::Done
    } else {
        LineOutcome::Continue
    })
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, RelayError> {
        let response = self.post_generate(prompt, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::ConnectionFailure(e.to_string()))?;

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Unparseable Ollama response: {e}");
            RelayError::MalformedResponse(format!(
                "{e}: {}",
                super::sanitize_api_error(&body)
            ))
        })?;

        Ok(parsed.response.trim().to_string())
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String, RelayError> {
        let response = self.post_generate(prompt, true).await?;
        let status = response.status().as_u16();

        let mut answer = String::new();
        let mut buffer: Vec<u8> = Vec::new();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = chunk_result.map_err(|e| RelayError::ConnectionFailure(e.to_string()))?;
            buffer.extend_from_slice(&bytes);

            for line in drain_ndjson_lines(&mut buffer) {
                match handle_line(&line, &mut answer, &tx, status).await? {
                    LineOutcome::Continue => {}
                    LineOutcome::Done => return Ok(answer),
                    LineOutcome::ReceiverGone => {
                        tracing::debug!("Stream consumer went away, stopping relay");
                        return Ok(answer);
                    }
                }
            }

            if buffer.len() > MAX_PENDING_LINE_BYTES {
                tracing::error!(
                    pending = buffer.len(),
                    "Ollama stream line exceeds buffer limit"
                );
                return Err(RelayError::MalformedResponse(format!(
                    "stream line exceeds {MAX_PENDING_LINE_BYTES} bytes without a newline"
                )));
            }
        }

        // The final object may arrive without a trailing newline
        let tail = String::from_utf8_lossy(&buffer).trim().to_string();
        if !tail.is_empty() {
            handle_line(&tail, &mut answer, &tx, status).await?;
        }

        Ok(answer)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, RelayError> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| RelayError::ConnectionFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(super::api_error(response).await);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| RelayError::MalformedResponse(e.to_string()))?;
        Ok(tags.models)
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
