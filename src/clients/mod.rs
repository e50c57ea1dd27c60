//! External service interfaces the engine depends on.
//!
//! The engine never talks to a model provider, vector database, or thread
//! catalog directly. It talks to these traits, and the concrete clients are
//! injected through [`Resources`] when a runner is built. Tests substitute
//! deterministic fakes; production wires real adapters. Nothing in the
//! crate reaches for ambient globals.
//!
//! All trait methods are `async` and every call site in the engine wraps
//! them with [`call_with_retry`], so implementations can stay simple and
//! report failures through [`ModelError`] / [`StoreError`].

mod retry;

pub use retry::{call_with_retry, RetryPolicy, Retryable};

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::message::Message;

/// Response shape requested from the chat model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Free-form prose.
    Text,
    /// A single JSON object the caller will deserialize.
    Json,
}

/// One chat-model invocation: system instruction, conversation, and the
/// requested response shape.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub format: OutputFormat,
}

impl GenerateRequest {
    /// Request for free-form prose.
    #[must_use]
    pub fn text(system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system: system.into(),
            messages,
            format: OutputFormat::Text,
        }
    }

    /// Request for a JSON object response.
    #[must_use]
    pub fn json(system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system: system.into(),
            messages,
            format: OutputFormat::Json,
        }
    }
}

/// A chat-model response in the requested shape.
///
/// A client asked for [`OutputFormat::Json`] must either return
/// [`ModelOutput::Json`] or fail with [`ModelError::InvalidResponse`];
/// it never hands malformed payloads to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelOutput {
    Text(String),
    Json(Value),
}

impl ModelOutput {
    /// Unwraps prose output; a JSON payload is rendered to its string form.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            ModelOutput::Text(text) => text,
            ModelOutput::Json(value) => value.to_string(),
        }
    }

    /// Unwraps a JSON payload, rejecting prose.
    pub fn into_json(self) -> Result<Value, ModelError> {
        match self {
            ModelOutput::Json(value) => Ok(value),
            ModelOutput::Text(text) => Err(ModelError::InvalidResponse {
                message: format!("expected a JSON object, got prose: {text:.60}"),
            }),
        }
    }
}

/// Failures a model client can report.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    /// Provider throttled the call.
    #[error("model rate limited")]
    #[diagnostic(
        code(tutorgraph::clients::rate_limited),
        help("The call is retried automatically; tune RetryPolicy if limits persist.")
    )]
    RateLimited,

    /// The call did not finish inside the per-attempt timeout.
    #[error("model call timed out")]
    #[diagnostic(code(tutorgraph::clients::timed_out))]
    TimedOut,

    /// Response did not match the requested output format.
    #[error("model response invalid: {message}")]
    #[diagnostic(
        code(tutorgraph::clients::invalid_response),
        help("Not retried: the same prompt would fail the same way.")
    )]
    InvalidResponse { message: String },

    /// Provider unreachable or misconfigured.
    #[error("model unavailable: {message}")]
    #[diagnostic(code(tutorgraph::clients::unavailable))]
    Unavailable { message: String },
}

impl Retryable for ModelError {
    fn is_retryable(&self) -> bool {
        matches!(self, ModelError::RateLimited | ModelError::TimedOut)
    }
    fn timed_out() -> Self {
        ModelError::TimedOut
    }
}

/// Failures a store client can report.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// The call did not finish inside the per-attempt timeout.
    #[error("store call timed out")]
    #[diagnostic(code(tutorgraph::clients::store_timed_out))]
    TimedOut,

    /// Backend rejected or failed the operation.
    #[error("store backend error: {message}")]
    #[diagnostic(code(tutorgraph::clients::store_backend))]
    Backend { message: String },
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, StoreError::TimedOut)
    }
    fn timed_out() -> Self {
        StoreError::TimedOut
    }
}

/// Conversational model producing tutor replies and structured decisions.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelOutput, ModelError>;
}

/// Text embedding model used for knowledge retrieval and storage.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

/// A ranked snippet returned from a vector query.
#[derive(Clone, Debug, PartialEq)]
pub struct SnippetHit {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// A snippet to upsert into a vector namespace.
///
/// Ids are chosen by the caller; a repeated id replaces the earlier entry,
/// which is what makes knowledge storage safe to replay.
#[derive(Clone, Debug, PartialEq)]
pub struct SnippetEntry {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

/// Per-user semantic knowledge storage.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ranked nearest snippets for the given query embeddings.
    async fn query(
        &self,
        namespace: &str,
        embeddings: &[Vec<f32>],
        limit: usize,
    ) -> Result<Vec<SnippetHit>, StoreError>;

    /// Inserts or replaces snippets by id.
    async fn upsert(&self, namespace: &str, entries: Vec<SnippetEntry>) -> Result<(), StoreError>;
}

/// Outcome of a thread registration attempt.
///
/// `AlreadyExists` is a normal answer, not an error: it is the guard that
/// keeps thread naming idempotent across checkpoint replays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCreation {
    Created,
    AlreadyExists,
}

/// Catalog of conversation threads, kept by the serving layer that sits
/// outside this crate.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn thread_exists(&self, thread_id: &str) -> Result<bool, StoreError>;

    async fn create_thread(
        &self,
        thread_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<ThreadCreation, StoreError>;
}

/// Vector namespace holding one user's mastered knowledge.
#[must_use]
pub fn knowledge_namespace(user_id: &str) -> String {
    format!("user_{user_id}_knowledge")
}

/// The injected client bundle handed to every node through its context.
///
/// Cloning is cheap; all clients are shared behind [`Arc`].
#[derive(Clone)]
pub struct Resources {
    pub chat: Arc<dyn ChatModel>,
    pub embeddings: Arc<dyn EmbeddingModel>,
    pub vectors: Arc<dyn VectorStore>,
    pub threads: Arc<dyn ThreadStore>,
}

impl Resources {
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatModel>,
        embeddings: Arc<dyn EmbeddingModel>,
        vectors: Arc<dyn VectorStore>,
        threads: Arc<dyn ThreadStore>,
    ) -> Self {
        Self {
            chat,
            embeddings,
            vectors,
            threads,
        }
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_retryability_matches_contract() {
        assert!(ModelError::RateLimited.is_retryable());
        assert!(ModelError::TimedOut.is_retryable());
        assert!(!ModelError::InvalidResponse {
            message: "not json".into()
        }
        .is_retryable());
        assert!(!ModelError::Unavailable {
            message: "down".into()
        }
        .is_retryable());
    }

    #[test]
    fn json_output_rejects_prose() {
        let output = ModelOutput::Text("hello".into());
        assert!(matches!(
            output.into_json(),
            Err(ModelError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn namespace_is_per_user() {
        assert_eq!(knowledge_namespace("42"), "user_42_knowledge");
    }
}
