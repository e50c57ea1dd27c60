//! Node execution framework for the tutorgraph workflow engine.
//!
//! This module provides the core abstractions for executable workflow nodes:
//! the [`Node`] trait, the execution context with its injected clients, the
//! partial state update nodes return, and node-level error handling.

// Standard library and external crates
use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

// Internal crate modules
use crate::clients::{
    call_with_retry, GenerateRequest, ModelError, ModelOutput, Resources, SnippetEntry,
    SnippetHit, StoreError, ThreadCreation,
};
use crate::message::Message;
use crate::runtimes::RunConfig;
use crate::state::StateSnapshot;

// ============================================================================
// Core Trait
// ============================================================================

/// Core trait defining executable workflow nodes.
///
/// A node is a single unit of tutoring work: it receives an immutable state
/// snapshot plus its execution context, talks to the injected clients if it
/// needs to, and returns the partial update it wants merged.
///
/// # Error Handling
///
/// Returning `Err(NodeError)` does not abort the run. The executor converts
/// the failure into an update of the reserved `error` field and routing
/// continues toward a pause node, so the conversation survives the failure.
///
/// # Examples
///
/// ```rust
/// use tutorgraph::node::{Node, NodeContext, NodePartial, NodeError};
/// use tutorgraph::state::StateSnapshot;
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// struct EchoTopic;
///
/// #[async_trait]
/// impl Node for EchoTopic {
///     async fn run(
///         &self,
///         snapshot: StateSnapshot,
///         _ctx: NodeContext,
///     ) -> Result<NodePartial, NodeError> {
///         let topic = snapshot
///             .last_human()
///             .ok_or(NodeError::MissingInput { what: "a human message" })?;
///         Ok(NodePartial::new().with_field("context_focus", json!(topic.content)))
///     }
/// }
/// ```
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node with the given state snapshot and context.
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError>;
}

// ============================================================================
// Execution Context
// ============================================================================

/// Execution context passed to nodes during a run.
///
/// Carries the node's identity and step, the conversation identity, the
/// injected external clients, and the per-run configuration. Everything a
/// node touches outside its snapshot comes through here.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Name of the executing node.
    pub node_id: String,
    /// Step number this execution occupies in the thread's history.
    pub step: u64,
    /// Conversation thread this run belongs to.
    pub thread_id: String,
    /// Owner of the conversation; selects the knowledge namespace.
    pub user_id: String,
    /// Injected external clients.
    pub resources: Resources,
    /// Per-run configuration (model choice, retry policy, budgets).
    pub config: Arc<RunConfig>,
}

impl NodeContext {
    /// Calls the chat model under the run's timeout and retry policy.
    pub async fn generate(&self, request: GenerateRequest) -> Result<ModelOutput, ModelError> {
        call_with_retry(&self.config.retry, "chat.generate", || {
            self.resources.chat.generate(request.clone())
        })
        .await
    }

    /// Embeds texts under the run's timeout and retry policy.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        call_with_retry(&self.config.retry, "embeddings.embed", || {
            self.resources.embeddings.embed(texts)
        })
        .await
    }

    /// Ranked snippets from this user's knowledge namespace.
    pub async fn query_snippets(
        &self,
        embeddings: &[Vec<f32>],
        limit: usize,
    ) -> Result<Vec<SnippetHit>, StoreError> {
        let namespace = self.knowledge_namespace();
        call_with_retry(&self.config.retry, "vectors.query", || {
            self.resources.vectors.query(&namespace, embeddings, limit)
        })
        .await
    }

    /// Upserts snippets into this user's knowledge namespace.
    pub async fn upsert_snippets(&self, entries: Vec<SnippetEntry>) -> Result<(), StoreError> {
        let namespace = self.knowledge_namespace();
        call_with_retry(&self.config.retry, "vectors.upsert", || {
            self.resources.vectors.upsert(&namespace, entries.clone())
        })
        .await
    }

    /// Whether this thread is already registered in the thread catalog.
    pub async fn thread_exists(&self) -> Result<bool, StoreError> {
        call_with_retry(&self.config.retry, "threads.exists", || {
            self.resources.threads.thread_exists(&self.thread_id)
        })
        .await
    }

    /// Registers this thread under the given display name.
    pub async fn register_thread(&self, name: &str) -> Result<ThreadCreation, StoreError> {
        call_with_retry(&self.config.retry, "threads.create", || {
            self.resources
                .threads
                .create_thread(&self.thread_id, &self.user_id, name)
        })
        .await
    }

    /// Vector namespace holding this user's knowledge.
    #[must_use]
    pub fn knowledge_namespace(&self) -> String {
        crate::clients::knowledge_namespace(&self.user_id)
    }
}

// ============================================================================
// State Updates
// ============================================================================

/// Partial state update returned by node execution.
///
/// Both parts are optional: a node updates only what it cares about, and
/// the merge barrier folds the partial into state under the channel rules
/// (messages append; fields follow their declared merge policy).
///
/// # Examples
///
/// ```rust
/// use tutorgraph::node::NodePartial;
/// use tutorgraph::message::Message;
/// use serde_json::json;
///
/// // A reply plus the fields it settles.
/// let partial = NodePartial::new()
///     .with_messages(vec![Message::assistant("Recursion needs a base case.")])
///     .with_field("response", json!("Recursion needs a base case."))
///     .with_field("learning_complete", json!(false));
///
/// // Field-only update appending one goal.
/// let partial = NodePartial::new().with_field("goals", json!(["identify the base case"]));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NodePartial {
    /// Messages to append to the conversation history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Field updates, merged under each field's declared policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FxHashMap<String, Value>>,
}

impl NodePartial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the messages to append.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Replaces the full field update map.
    #[must_use]
    pub fn with_fields(mut self, fields: FxHashMap<String, Value>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Adds one field update, creating the map on first use.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields
            .get_or_insert_with(FxHashMap::default)
            .insert(name.into(), value);
        self
    }

    /// Whether the partial carries no updates at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.as_ref().is_none_or(|m| m.is_empty())
            && self.fields.as_ref().is_none_or(|f| f.is_empty())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during node execution.
///
/// All of these are recoverable: the executor records them in the
/// reserved `error` field and the run continues to its pause node. Nothing
/// in this enum aborts a run.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(tutorgraph::node::missing_input),
        help("Check that an earlier node produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// Chat or embedding model failure that survived the retry budget.
    #[error("model call failed: {0}")]
    #[diagnostic(code(tutorgraph::node::model))]
    Model(#[from] ModelError),

    /// Vector or thread store failure that survived the retry budget.
    #[error("store call failed: {0}")]
    #[diagnostic(code(tutorgraph::node::store))]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(tutorgraph::node::serde_json))]
    Serde(#[from] serde_json::Error),
}
