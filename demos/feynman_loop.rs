//! Feynman workflow walkthrough: explain, research, evaluate, retry.
//!
//! Drives the explain-and-evaluate shape against canned clients. The
//! first turn researches background until the assessment is satisfied,
//! then judges the learner's explanation and pauses because it falls
//! short. The second turn resumes from the checkpoint, passes the
//! evaluation and stores the mastered concept.
//!
//! A step budget caps the assess/search cycle so a model that keeps
//! asking for more context can only pause the turn, never hang it.
//!
//! ```bash
//! cargo run --example feynman_loop
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use miette::Result;
use parking_lot::Mutex;
use serde_json::json;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tutorgraph::channels::schema::LEARNING_COMPLETE_FIELD;
use tutorgraph::clients::{
    ChatModel, EmbeddingModel, GenerateRequest, ModelError, ModelOutput, Resources, SnippetEntry,
    SnippetHit, StoreError, ThreadCreation, ThreadStore, VectorStore,
};
use tutorgraph::events::{RunEvent, RunOutcome};
use tutorgraph::runtimes::{RunConfig, TurnReport, TurnRequest, TurnRunner};
use tutorgraph::tutor::feynman_graph;
use tutorgraph::tutor::workflows::KNOWLEDGE_FIELD;

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

/// Constant embedding; similarity ranking never matters in this demo.
struct FlatEmbeddings;

#[async_trait]
impl EmbeddingModel for FlatEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
    }
}

/// Records stored snippets; the Feynman shape never queries them back.
#[derive(Default)]
struct SnippetLog {
    entries: Mutex<Vec<(String, SnippetEntry)>>,
}

impl SnippetLog {
    fn stored(&self) -> Vec<(String, SnippetEntry)> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl VectorStore for SnippetLog {
    async fn query(
        &self,
        _namespace: &str,
        _embeddings: &[Vec<f32>],
        _limit: usize,
    ) -> Result<Vec<SnippetHit>, StoreError> {
        Ok(Vec::new())
    }

    async fn upsert(&self, namespace: &str, entries: Vec<SnippetEntry>) -> Result<(), StoreError> {
        let mut stored = self.entries.lock();
        for entry in entries {
            stored.push((namespace.to_string(), entry));
        }
        Ok(())
    }
}

/// The Feynman shape never registers threads; this stub fills the bundle.
struct NoThreads;

#[async_trait]
impl ThreadStore for NoThreads {
    async fn thread_exists(&self, _: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn create_thread(
        &self,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<ThreadCreation, StoreError> {
        Ok(ThreadCreation::Created)
    }
}

/// Model outputs for both turns, in call order.
///
/// Turn 1: goals, a research round (assess, search, assess) and a failed
/// evaluation. Turn 2: one more assessment and the passing evaluation.
fn explain_script() -> Vec<ModelOutput> {
    vec![
        ModelOutput::Json(json!({
            "goals": ["explain what a closure captures"]
        })),
        ModelOutput::Json(json!({
            "needs_more_context": true,
            "focus": "capture modes"
        })),
        ModelOutput::Text(
            "A closure captures the variables its body mentions from the \
             enclosing scope. The compiler picks the weakest capture that \
             works, from shared borrow up to a full move."
                .to_string(),
        ),
        ModelOutput::Json(json!({ "needs_more_context": false })),
        ModelOutput::Json(json!({
            "mastered": false,
            "feedback": "You described the braces and pipes but not what crosses \
                         into the closure. Which variables does the closure \
                         actually take from its scope?"
        })),
        ModelOutput::Json(json!({ "needs_more_context": false })),
        ModelOutput::Json(json!({
            "mastered": true,
            "feedback": "Right: the closure captures exactly the variables it \
                         uses, and the compiler picks the weakest capture that \
                         still compiles."
        })),
    ]
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("tutorgraph=info".parse().unwrap())
                .add_directive("feynman_loop=info".parse().unwrap()),
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

    let vectors = Arc::new(SnippetLog::default());
    let resources = Resources::new(
        Arc::new(ScriptedChat::new(explain_script())),
        Arc::new(FlatEmbeddings),
        vectors.clone(),
        Arc::new(NoThreads),
    );

    let runner = TurnRunner::new(feynman_graph()?, resources);
    let thread_id = format!("feynman-{}", Uuid::new_v4());

    // The cycle can only run as far as the budget allows.
    let config = RunConfig::default().with_step_budget(12);

    // ========================================================================
    // Turn 1: first explanation attempt
    // ========================================================================
    info!("## Turn 1: the learner explains closures");

    let report = streamed_turn(
        &runner,
        TurnRequest::new(
            thread_id.clone(),
            "learner-1",
            "Let me try: a closure is a block with pipes that you can call later.",
        )
        .with_config(config.clone()),
    )
    .await?;

    info!("   nodes ran: {}", path_of(&report));
    info!(
        "   background gathered: {:?}",
        report.snapshot.text_list(KNOWLEDGE_FIELD)
    );
    info!(
        "   mastered: {}",
        report.snapshot.flag(LEARNING_COMPLETE_FIELD)
    );
    if let Some(feedback) = report.snapshot.last_assistant() {
        info!("   tutor: {}", feedback.content);
    }
    info!("   the turn paused; the learner gets another attempt");

    // ========================================================================
    // Turn 2: the retry, resumed from the checkpoint
    // ========================================================================
    info!("## Turn 2: second attempt");

    let report = streamed_turn(
        &runner,
        TurnRequest::new(
            thread_id,
            "learner-1",
            "Second try: it captures the variables it uses from the scope \
             around it, borrowing when it can and moving when it must.",
        )
        .with_config(config),
    )
    .await?;

    info!("   nodes ran: {}", path_of(&report));
    info!(
        "   mastered: {}",
        report.snapshot.flag(LEARNING_COMPLETE_FIELD)
    );
    if let Some(feedback) = report.snapshot.last_assistant() {
        info!("   tutor: {}", feedback.content);
    }

    info!("## Stored knowledge");
    for (namespace, entry) in vectors.stored() {
        info!("   {} [{}]", namespace, entry.id);
        for line in entry.text.lines() {
            info!("      {}", line);
        }
    }

    Ok(())
}

/// Runs one turn, printing each event as it streams, and returns the report.
async fn streamed_turn(runner: &TurnRunner, request: TurnRequest) -> Result<TurnReport> {
    let mut handle = runner.run(request);
    if let Some(events) = handle.events() {
        while let Some(event) = events.recv().await {
            match event {
                RunEvent::Node { node, step, update } => {
                    let mut fields: Vec<&str> = update
                        .fields
                        .as_ref()
                        .map(|fields| fields.keys().map(String::as_str).collect())
                        .unwrap_or_default();
                    fields.sort_unstable();
                    info!("   step {}: {} merged {:?}", step, node, fields);
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
