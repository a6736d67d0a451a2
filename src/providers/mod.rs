//! Inference backends and the relay that drives them.

pub mod ollama;
pub mod relay;
pub mod traits;

pub use ollama::OllamaClient;
pub use relay::{InferenceRelay, RelayChunk};
pub use traits::{InferenceBackend, ModelInfo, RelayError};

use crate::config::OllamaConfig;
use std::sync::Arc;

const MAX_API_ERROR_CHARS: usize = 200;

/// Collapse whitespace and truncate backend error text before it reaches
/// logs or clients.
pub fn sanitize_api_error(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= MAX_API_ERROR_CHARS {
        return collapsed;
    }

    let end = collapsed
        .char_indices()
        .nth(MAX_API_ERROR_CHARS)
        .map_or(collapsed.len(), |(idx, _)| idx);

    format!("{}...", &collapsed[..end])
}

/// Build a [`RelayError::BackendError`] from a failed HTTP response.
pub async fn api_error(response: reqwest::Response) -> RelayError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read backend error body>".to_string());
    tracing::error!(status, "Inference backend returned an error status");
    RelayError::BackendError {
        status,
        body: sanitize_api_error(&body),
    }
}

/// Factory: the inference backend described by `[ollama]`.
pub fn create_backend(config: &OllamaConfig) -> Arc<dyn InferenceBackend> {
    Arc::new(OllamaClient::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_truncates_long_error() {
        let long = "a".repeat(400);
        let result = sanitize_api_error(&long);
        assert_eq!(result.chars().count(), MAX_API_ERROR_CHARS + 3);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let result = sanitize_api_error(&long);
        assert!(result.starts_with('é'));
        assert!(result.ends_with("..."));
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        let input = "<html>\n  <body>Bad Gateway</body>\n</html>";
        assert_eq!(
            sanitize_api_error(input),
            "<html> <body>Bad Gateway</body> </html>"
        );
    }

    #[test]
    fn sanitize_short_error_unchanged() {
        let input = "simple upstream timeout";
        assert_eq!(sanitize_api_error(input), input);
    }

    #[test]
    fn factory_builds_ollama_backend() {
        let backend = create_backend(&OllamaConfig::default());
        assert_eq!(backend.name(), "ollama");
        assert_eq!(backend.model(), OllamaConfig::default().model);
    }
}
