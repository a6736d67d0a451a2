//! Inference backend trait and the errors it surfaces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Failure talking to the inference backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Network, DNS or timeout failure before a usable response arrived.
    #[error("connection to inference backend failed: {0}")]
    ConnectionFailure(String),
    /// The backend answered with a non-2xx status.
    #[error("inference backend returned {status}: {body}")]
    BackendError { status: u16, body: String },
    /// The backend answered 2xx but the payload could not be understood.
    #[error("malformed response from inference backend: {0}")]
    MalformedResponse(String),
}

impl RelayError {
    /// Short player-facing summary; details stay in [`RelayError::detail`].
    pub fn summary(&self) -> String {
        match self {
            Self::ConnectionFailure(_) => "Failed to connect to AI service".to_string(),
            Self::BackendError { status, .. } => format!("API Error: {status}"),
            Self::MalformedResponse(_) => "Unexpected response from AI service".to_string(),
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::ConnectionFailure(detail) | Self::MalformedResponse(detail) => detail,
            Self::BackendError { body, .. } => body,
        }
    }
}

/// A model advertised by the backend's listing endpoint.
///
/// Fields this crate does not read (`digest`, `details`, ...) are kept in
/// `extra` and serialized back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A text-completion backend.
///
/// Implementations own transport, timeouts and payload formats; callers
/// only hand over a finished prompt.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Complete `prompt` in one round trip.
    async fn generate(&self, prompt: &str) -> Result<String, RelayError>;

    /// Complete `prompt`, sending fragments into `tx` as they arrive.
    /// Returns the assembled answer. Stops early if `tx` is closed.
    async fn stream_generate(
        &self,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String, RelayError>;

    /// Models the backend can serve.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, RelayError>;

    /// Configured endpoint, for diagnostics.
    fn endpoint(&self) -> &str;

    /// Configured model name.
    fn model(&self) -> &str;

    fn name(&self) -> &str;
}
