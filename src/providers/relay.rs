//! Inference Relay: builds prompts, calls the backend, and exposes streamed
//! answers as a finite sequence of chunks.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::traits::{InferenceBackend, ModelInfo, RelayError};
use crate::prompt::build_prompt;

/// Bound on buffered chunks between the producer and the HTTP writer.
const CHANNEL_CAPACITY: usize = 32;

/// One item of a streamed answer.
///
/// A stream carries zero or more `Fragment`s followed by exactly one `Done`
/// or `Failed`, then ends.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayChunk {
    Fragment(String),
    Done { answer: String, prompt: String },
    Failed(RelayError),
}

impl RelayChunk {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment(_))
    }
}

#[derive(Clone)]
pub struct InferenceRelay {
    backend: Arc<dyn InferenceBackend>,
}

impl InferenceRelay {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    pub fn endpoint(&self) -> &str {
        self.backend.endpoint()
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Ask the backend one question in the given context; returns the
    /// trimmed answer.
    pub async fn get_answer(&self, context: &str, question: &str) -> Result<String, RelayError> {
        let prompt = build_prompt(context, question);
        tracing::debug!(
            backend = self.backend.name(),
            prompt_chars = prompt.len(),
            "Requesting answer"
        );
        let answer = self.backend.generate(&prompt).await?;
        Ok(answer.trim().to_string())
    }

    pub fn stream_answer(&self, context: &str, question: &str) -> ReceiverStream<RelayChunk> {
        self.stream_prompt(build_prompt(context, question))
    }

    /// Stream a completion for a pre-built prompt.
    ///
    /// The producer runs on its own task. If the consumer drops the stream
    /// the producer notices on its next send and stops.
    pub fn stream_prompt(&self, prompt: String) -> ReceiverStream<RelayChunk> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let backend = Arc::clone(&self.backend);

        tokio::spawn(async move {
            let (fragment_tx, mut fragment_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
            let forward_tx = tx.clone();
            let forward = async move {
                while let Some(fragment) = fragment_rx.recv().await {
                    if forward_tx.send(RelayChunk::Fragment(fragment)).await.is_err() {
                        break;
                    }
                }
            };

            let (result, ()) = tokio::join!(backend.stream_generate(&prompt, fragment_tx), forward);

            let terminal = match result {
                Ok(answer) => RelayChunk::Done {
                    answer: answer.trim().to_string(),
                    prompt,
                },
                Err(err) => {
                    tracing::warn!(backend = backend.name(), "Streaming answer failed: {err}");
                    RelayChunk::Failed(err)
                }
            };

            if tx.send(terminal).await.is_err() {
                tracing::debug!("Stream consumer went away before the final chunk");
            }
        });

        ReceiverStream::new(rx)
    }

    /// Reachability check; returns what the backend can serve.
    pub async fn probe(&self) -> Result<Vec<ModelInfo>, RelayError> {
        self.backend.list_models().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_stream::StreamExt;

    struct ScriptedBackend {
        fragments: Vec<&'static str>,
        failure: Option<RelayError>,
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, RelayError> {
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(format!("  {}  ", self.fragments.concat())),
            }
        }

        async fn stream_generate(
            &self,
            _prompt: &str,
            tx: mpsc::Sender<String>,
        ) -> Result<String, RelayError> {
            let mut answer = String::new();
            for fragment in &self.fragments {
                answer.push_str(fragment);
                if tx.send((*fragment).to_string()).await.is_err() {
                    return Ok(answer);
                }
            }
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(answer),
            }
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, RelayError> {
            Ok(vec![ModelInfo {
                name: "scripted".into(),
                ..ModelInfo::default()
            }])
        }

        fn endpoint(&self) -> &str {
            "scripted://"
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn relay(fragments: Vec<&'static str>, failure: Option<RelayError>) -> InferenceRelay {
        InferenceRelay::new(Arc::new(ScriptedBackend { fragments, failure }))
    }

    #[tokio::test]
    async fn get_answer_trims() {
        let answer = relay(vec!["Yes."], None)
            .get_answer("context", "Is it blue?")
            .await
            .unwrap();
        assert_eq!(answer, "Yes.");
    }

    #[tokio::test]
    async fn get_answer_propagates_failure() {
        let err = relay(vec![], Some(RelayError::ConnectionFailure("refused".into())))
            .get_answer("context", "Is it blue?")
            .await
            .unwrap_err();
        assert_eq!(err.summary(), "Failed to connect to AI service");
    }

    #[tokio::test]
    async fn stream_ends_with_single_done() {
        let chunks: Vec<RelayChunk> = relay(vec!["Y", "es"], None)
            .stream_answer("context", "Is it blue?")
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], RelayChunk::Fragment("Y".into()));
        assert_eq!(chunks[1], RelayChunk::Fragment("es".into()));
        let RelayChunk::Done { answer, prompt } = &chunks[2] else {
            panic!("expected Done, got {:?}", chunks[2]);
        };
        assert_eq!(answer, "Yes");
        assert!(prompt.contains("Human: Is it blue?"));
        assert_eq!(chunks.iter().filter(|c| c.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn stream_failure_is_last_chunk() {
        let failure = RelayError::BackendError {
            status: 500,
            body: "boom".into(),
        };
        let chunks: Vec<RelayChunk> = relay(vec!["Ma"], Some(failure.clone()))
            .stream_prompt("prompt".into())
            .collect()
            .await;

        assert_eq!(
            chunks,
            vec![RelayChunk::Fragment("Ma".into()), RelayChunk::Failed(failure)]
        );
    }

    /// Offers `total` fragments and records how many the relay accepted.
    struct CountingBackend {
        total: usize,
        sent: AtomicUsize,
        finished: Notify,
    }

    #[async_trait]
    impl InferenceBackend for CountingBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, RelayError> {
            Ok(String::new())
        }

        async fn stream_generate(
            &self,
            _prompt: &str,
            tx: mpsc::Sender<String>,
        ) -> Result<String, RelayError> {
            for _ in 0..self.total {
                if tx.send("x".into()).await.is_err() {
                    break;
                }
                self.sent.fetch_add(1, Ordering::SeqCst);
            }
            self.finished.notify_one();
            Ok(String::new())
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, RelayError> {
            Ok(Vec::new())
        }

        fn endpoint(&self) -> &str {
            "counting://"
        }

        fn model(&self) -> &str {
            "counting"
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn dropped_consumer_stops_backend_reads() {
        let backend = Arc::new(CountingBackend {
            total: 10_000,
            sent: AtomicUsize::new(0),
            finished: Notify::new(),
        });
        let relay = InferenceRelay::new(backend.clone());

        let mut stream = relay.stream_prompt("prompt".into());
        assert_eq!(stream.next().await, Some(RelayChunk::Fragment("x".into())));
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), backend.finished.notified())
            .await
            .expect("producer should stop once the consumer is gone");

        let sent = backend.sent.load(Ordering::SeqCst);
        // At most both channel buffers plus the chunk in flight.
        assert!(sent <= 2 * CHANNEL_CAPACITY + 2, "sent {sent} fragments");
        assert!(sent < backend.total);
    }

    #[tokio::test]
    async fn probe_lists_models() {
        let models = relay(vec![], None).probe().await.unwrap();
        assert_eq!(models[0].name, "scripted");
    }
}
