//! Learning pipeline walkthrough: a scripted three-turn tutoring session.
//!
//! Runs the learning workflow end to end against canned clients, so no
//! API keys or databases are needed:
//! - Turn 1 opens a thread: goals, a display name, retrieval queries and
//!   the first tutoring reply, then a pause for the learner.
//! - Turn 2 resumes from the checkpoint, skips straight to the reply and
//!   stores the mastered concept under the user's knowledge namespace.
//! - Turn 3 starts a fresh thread whose retrieval step finds what the
//!   previous session stored.
//!
//! Events stream live while each turn runs; the turn reports and the
//! stored snippets print as the session progresses.
//!
//! ```bash
//! cargo run --example learning_turns
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use miette::Result;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::json;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tutorgraph::clients::{
    ChatModel, EmbeddingModel, GenerateRequest, ModelError, ModelOutput, Resources, SnippetEntry,
    SnippetHit, StoreError, ThreadCreation, ThreadStore, VectorStore, knowledge_namespace,
};
use tutorgraph::events::{RunEvent, RunOutcome};
use tutorgraph::runtimes::{TurnReport, TurnRequest, TurnRunner};
use tutorgraph::tutor::learning_graph;
use tutorgraph::tutor::workflows::{GOALS_FIELD, KNOWLEDGE_FIELD, THREAD_NAME_FIELD};

/// Replays a fixed script of model outputs, one per chat call.
struct ScriptedChat {
    script: Mutex<VecDeque<ModelOutput>>,
}

impl ScriptedChat {
    fn new(outputs: impl IntoIterator<Item = ModelOutput>) -> Self {
        Self {
            script: Mutex::new(outputs.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn generate(&self, _: GenerateRequest) -> Result<ModelOutput, ModelError> {
        self.script
            .lock()
            .pop_front()
            .ok_or(ModelError::Unavailable {
                message: "demo script exhausted".to_string(),
            })
    }
}

/// Deterministic hash-derived vectors, good enough for a demo index.
struct HashEmbeddings;

#[async_trait]
impl EmbeddingModel for HashEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts.iter().map(|text| hash_to_vec(text)).collect())
    }
}

/// In-memory vector namespaces keyed by snippet id.
#[derive(Default)]
struct MemoryVectors {
    namespaces: Mutex<FxHashMap<String, Vec<SnippetEntry>>>,
}

impl MemoryVectors {
    fn stored(&self, namespace: &str) -> Vec<SnippetEntry> {
        self.namespaces
            .lock()
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectors {
    async fn query(
        &self,
        namespace: &str,
        embeddings: &[Vec<f32>],
        limit: usize,
    ) -> Result<Vec<SnippetHit>, StoreError> {
        let namespaces = self.namespaces.lock();
        let entries = namespaces.get(namespace).map(Vec::as_slice).unwrap_or(&[]);
        let mut hits: Vec<SnippetHit> = entries
            .iter()
            .map(|entry| {
                let score = embeddings
                    .iter()
                    .map(|query| cosine(query, &entry.embedding))
                    .fold(0.0, f32::max);
                SnippetHit {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    score,
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert(&self, namespace: &str, entries: Vec<SnippetEntry>) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.lock();
        let stored = namespaces.entry(namespace.to_string()).or_default();
        for entry in entries {
            stored.retain(|existing| existing.id != entry.id);
            stored.push(entry);
        }
        Ok(())
    }
}

/// Thread catalog; remembers the display names the naming node registers.
#[derive(Default)]
struct MemoryThreads {
    names: Mutex<FxHashMap<String, String>>,
}

#[async_trait]
impl ThreadStore for MemoryThreads {
    async fn thread_exists(&self, thread_id: &str) -> Result<bool, StoreError> {
        Ok(self.names.lock().contains_key(thread_id))
    }

    async fn create_thread(
        &self,
        thread_id: &str,
        _user_id: &str,
        name: &str,
    ) -> Result<ThreadCreation, StoreError> {
        let mut names = self.names.lock();
        if names.contains_key(thread_id) {
            return Ok(ThreadCreation::AlreadyExists);
        }
        names.insert(thread_id.to_string(), name.to_string());
        Ok(ThreadCreation::Created)
    }
}

/// Model outputs for the whole session, in call order.
///
/// Turn 1 makes four calls (goals, title, queries, reply), turn 2 one
/// call that reaches mastery, and turn 3 four more on a fresh thread.
fn lesson_script() -> Vec<ModelOutput> {
    vec![
        // ==== turn 1: new topic =============================================
        ModelOutput::Json(json!({
            "goals": [
                "explain what owning a value means",
                "show how moves transfer ownership",
            ]
        })),
        ModelOutput::Text("Ownership Basics".to_string()),
        ModelOutput::Json(json!({
            "queries": ["rust ownership rules", "move semantics"]
        })),
        ModelOutput::Json(json!({
            "reply": "Every value in Rust has exactly one owner. When you write \
                      `let b = a;` for a String, what happens to `a`?",
            "mastered": false
        })),
        // ==== turn 2: the learner answers and reaches mastery ===============
        ModelOutput::Json(json!({
            "reply": "Exactly. The move leaves `a` unusable and `b` becomes the \
                      sole owner. That is the whole rule.",
            "mastered": true
        })),
        // ==== turn 3: a fresh thread builds on the stored concept ===========
        ModelOutput::Json(json!({
            "goals": ["trace ownership through a function call"]
        })),
        ModelOutput::Text("Passing Values to Functions".to_string()),
        ModelOutput::Json(json!({
            "queries": ["passing a String to a function"]
        })),
        ModelOutput::Json(json!({
            "reply": "Passing a String by value moves it into the function, the \
                      same move you mastered with plain assignment.",
            "mastered": false
        })),
    ]
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("tutorgraph=info".parse().unwrap())
                .add_directive("learning_turns=info".parse().unwrap()),
        )
        .with(ErrorLayer::default())
        .init();
}

fn init_miette() {
    miette::set_panic_hook();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_miette();

    let chat = Arc::new(ScriptedChat::new(lesson_script()));
    let vectors = Arc::new(MemoryVectors::default());
    let threads = Arc::new(MemoryThreads::default());
    let resources = Resources::new(
        chat,
        Arc::new(HashEmbeddings),
        vectors.clone(),
        threads.clone(),
    );

    let runner = TurnRunner::new(learning_graph()?, resources);
    let user_id = "learner-1";

    // ========================================================================
    // Turn 1: a brand-new thread
    // ========================================================================
    let thread_id = format!("lesson-{}", Uuid::new_v4());
    info!("## Turn 1: opening a new topic");

    let report = streamed_turn(
        &runner,
        TurnRequest::new(
            thread_id.clone(),
            user_id,
            "Can you teach me how ownership works in Rust?",
        ),
    )
    .await?;

    info!("   nodes ran: {}", path_of(&report));
    if let Some(name) = report.snapshot.field_text(THREAD_NAME_FIELD) {
        info!("   thread named: {:?}", name);
    }
    info!("   goals: {:?}", report.snapshot.text_list(GOALS_FIELD));
    if let Some(reply) = report.snapshot.last_assistant() {
        info!("   tutor: {}", reply.content);
    }

    // ========================================================================
    // Turn 2: resume from the checkpoint; mastery stores the concept
    // ========================================================================
    info!("## Turn 2: the learner answers");

    let report = streamed_turn(
        &runner,
        TurnRequest::new(
            thread_id.clone(),
            user_id,
            "The move invalidates `a`; only `b` owns the String afterwards.",
        ),
    )
    .await?;

    info!("   nodes ran: {}", path_of(&report));
    info!("   steps accumulated on this thread: {}", report.step);

    let namespace = knowledge_namespace(user_id);
    let stored = vectors.stored(&namespace);
    info!("   snippets in {}: {}", namespace, stored.len());
    for entry in &stored {
        info!("      [{}] {}", entry.id, entry.text);
    }

    // ========================================================================
    // Turn 3: a fresh thread retrieves what the last session stored
    // ========================================================================
    info!("## Turn 3: a new session on the same topic area");

    let report = streamed_turn(
        &runner,
        TurnRequest::new(
            format!("lesson-{}", Uuid::new_v4()),
            user_id,
            "What happens when I pass a String to a function?",
        ),
    )
    .await?;

    info!("   nodes ran: {}", path_of(&report));
    info!(
        "   knowledge pulled in: {:?}",
        report.snapshot.text_list(KNOWLEDGE_FIELD)
    );
    if let Some(reply) = report.snapshot.last_assistant() {
        info!("   tutor: {}", reply.content);
    }

    info!("## Session complete");
    info!("   threads on this runner: {:?}", runner.threads().await?);

    Ok(())
}

/// Runs one turn, printing each event as it streams, and returns the report.
async fn streamed_turn(runner: &TurnRunner, request: TurnRequest) -> Result<TurnReport> {
    let mut handle = runner.run(request);
    if let Some(events) = handle.events() {
        while let Some(event) = events.recv().await {
            match event {
                RunEvent::Node { node, step, update } => {
                    let added = update.messages.as_ref().map_or(0, Vec::len);
                    let mut fields: Vec<&str> = update
                        .fields
                        .as_ref()
                        .map(|fields| fields.keys().map(String::as_str).collect())
                        .unwrap_or_default();
                    fields.sort_unstable();
                    info!(
                        "   step {}: {} (+{} message(s), fields {:?})",
                        step, node, added, fields
                    );
                }
                RunEvent::RunEnd { outcome, step } => match outcome {
                    RunOutcome::Completed => info!("   ✓ turn completed at step {}", step),
                    RunOutcome::Failed { message } => {
                        info!("   ✗ turn failed at step {}: {}", step, message);
                    }
                },
            }
        }
    }
    Ok(handle.join().await?)
}

fn path_of(report: &TurnReport) -> String {
    report
        .ran_nodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn hash_to_vec(text: &str) -> Vec<f32> {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..8u32)
        .map(|i| {
            let bits = seed.rotate_left(i * 8) ^ (u64::from(i) << 24);
            (bits as f32) / (u32::MAX as f32)
        })
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 { 0.0 } else { dot / denom }
}
