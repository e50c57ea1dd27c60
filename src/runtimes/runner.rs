//! Turn execution engine: per-thread serialization, routing, checkpoints.
//!
//! [`TurnRunner`] wraps a compiled [`App`] and executes turns against it.
//! One turn is one request/response cycle: load the thread's checkpoint
//! (or start fresh), merge the incoming human message, walk nodes from the
//! entry decision until routing reaches `End`, persist one checkpoint, and
//! report. Progress streams over a bounded per-turn event channel.
//!
//! # Concurrency model
//!
//! Turns on the *same* thread are serialized through a per-thread async
//! mutex; turns on *different* threads run concurrently. The runner is
//! cheaply cloneable (all shared parts are behind `Arc`), so one instance
//! can serve many concurrent callers.
//!
//! # Failure handling
//!
//! Node failures and schema-rejected updates are contained: the failure is
//! recorded into the reserved `error` field, the turn pauses, and the
//! checkpoint is still written, so the conversation survives. Exactly one
//! failure class is fatal: a decision function returning a key its edge
//! map does not contain. That aborts the turn *before* the checkpoint
//! write, leaving the previous checkpoint intact, because an unmapped key
//! is a workflow definition bug rather than a runtime condition.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::instrument;

use crate::app::App;
use crate::channels::schema::ERROR_FIELD;
use crate::clients::Resources;
use crate::events::{event_channel, EventEmitter, EventStream, RunEvent, RunOutcome};
use crate::message::Message;
use crate::node::{NodeContext, NodePartial};
use crate::reducers::ReducerError;
use crate::runtimes::checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
};
use crate::runtimes::execution::TurnReport;
use crate::runtimes::runtime_config::RunConfig;
use crate::state::{AgentState, StateSnapshot};
use crate::types::NodeKind;

/// One turn's worth of input: who is talking, on which thread, and what
/// they said.
///
/// # Examples
///
/// ```rust
/// use tutorgraph::runtimes::{RunConfig, TurnRequest};
///
/// let request = TurnRequest::new("thread-7", "user-42", "Explain recursion")
///     .with_config(RunConfig::default().with_step_budget(12));
/// assert_eq!(request.thread_id, "thread-7");
/// ```
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Conversation thread to run on.
    pub thread_id: String,
    /// Owner of the conversation; selects the knowledge namespace.
    pub user_id: String,
    /// The user's message for this turn.
    pub message: String,
    /// Per-turn configuration override; `None` uses the app default.
    pub config: Option<RunConfig>,
}

impl TurnRequest {
    #[must_use]
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            message: message.into(),
            config: None,
        }
    }

    /// Overrides the app-level [`RunConfig`] for this turn only.
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("thread not found: {thread_id}")]
    #[diagnostic(code(tutorgraph::runner::thread_not_found))]
    ThreadNotFound { thread_id: String },

    #[error("no route for decision key \"{key}\" leaving {node}")]
    #[diagnostic(
        code(tutorgraph::runner::routing),
        help("Map every key the decision function can return when adding the conditional edge.")
    )]
    Routing { node: NodeKind, key: String },

    #[error("node not registered: {node}")]
    #[diagnostic(code(tutorgraph::runner::missing_node))]
    MissingNode { node: NodeKind },

    #[error("no nodes to run from Start")]
    #[diagnostic(
        code(tutorgraph::runner::no_start_nodes),
        help("Add an edge from Start or configure a conditional entry.")
    )]
    NoStartNodes,

    #[error("turn task join error: {0}")]
    #[diagnostic(code(tutorgraph::runner::join))]
    Join(#[from] JoinError),

    #[error(transparent)]
    #[diagnostic(code(tutorgraph::runner::checkpointer))]
    Checkpointer(#[from] CheckpointerError),

    #[error("state merge failed: {0}")]
    #[diagnostic(code(tutorgraph::runner::merge))]
    Merge(#[from] ReducerError),
}

/// Handle to one in-flight turn.
///
/// The turn runs on a spawned task; this handle carries its event stream
/// and its eventual [`TurnReport`]. Dropping the handle does not cancel
/// the turn (use [`abort`](Self::abort) for that).
pub struct TurnHandle {
    events: Option<EventStream>,
    join: JoinHandle<Result<TurnReport, RunnerError>>,
}

impl TurnHandle {
    /// Takes the turn's event stream. Returns `None` after the first call.
    pub fn events(&mut self) -> Option<EventStream> {
        self.events.take()
    }

    /// Waits for the turn to finish and returns its report.
    pub async fn join(self) -> Result<TurnReport, RunnerError> {
        self.join.await?
    }

    /// Cancels the turn task. The thread's previous checkpoint is intact
    /// unless the turn already reached its save.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Whether the turn task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Executes turns against a compiled workflow.
///
/// # Examples
///
/// ```rust,no_run
/// use tutorgraph::runtimes::{TurnRequest, TurnRunner};
/// # use tutorgraph::app::App;
/// # use tutorgraph::clients::Resources;
/// # async fn example(app: App, resources: Resources) -> Result<(), Box<dyn std::error::Error>> {
/// let runner = TurnRunner::new(app, resources);
///
/// let mut handle = runner.run(TurnRequest::new("thread-1", "user-1", "Explain recursion"));
/// if let Some(events) = handle.events() {
///     tokio::spawn(async move {
///         while let Some(event) = events.recv().await {
///             println!("{event:?}");
///         }
///     });
/// }
/// let report = handle.join().await?;
/// println!("finished at step {}", report.step);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TurnRunner {
    app: Arc<App>,
    resources: Resources,
    checkpointer: Arc<dyn Checkpointer>,
    thread_locks: Arc<parking_lot::Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TurnRunner {
    /// Creates a runner with volatile in-memory checkpoints.
    #[must_use]
    pub fn new(app: App, resources: Resources) -> Self {
        Self::with_checkpointer(app, resources, Arc::new(InMemoryCheckpointer::new()))
    }

    /// Creates a runner with an explicit checkpoint backend.
    #[must_use]
    pub fn with_checkpointer(
        app: App,
        resources: Resources,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        Self {
            app: Arc::new(app),
            resources,
            checkpointer,
            thread_locks: Arc::new(parking_lot::Mutex::new(FxHashMap::default())),
        }
    }

    /// Creates a runner with a backend resolved from a [`CheckpointerType`].
    ///
    /// The SQLite variant reads `TUTORGRAPH_SQLITE_URL` (full URL) or
    /// `TUTORGRAPH_DB_NAME` (bare filename, default `tutorgraph.db`) from
    /// the environment, creating the database file if needed.
    pub async fn with_checkpointer_type(
        app: App,
        resources: Resources,
        checkpointer_type: CheckpointerType,
    ) -> Result<Self, RunnerError> {
        let checkpointer = Self::create_checkpointer(checkpointer_type).await?;
        Ok(Self::with_checkpointer(app, resources, checkpointer))
    }

    async fn create_checkpointer(
        checkpointer_type: CheckpointerType,
    ) -> Result<Arc<dyn Checkpointer>, RunnerError> {
        match checkpointer_type {
            CheckpointerType::InMemory => Ok(Arc::new(InMemoryCheckpointer::new())),
            #[cfg(feature = "sqlite")]
            CheckpointerType::SQLite => {
                dotenvy::dotenv().ok();
                let db_url = std::env::var("TUTORGRAPH_SQLITE_URL").unwrap_or_else(|_| {
                    let name = std::env::var("TUTORGRAPH_DB_NAME")
                        .unwrap_or_else(|_| "tutorgraph.db".to_string());
                    format!("sqlite://{name}")
                });
                // Ensure the underlying sqlite file exists:
                // 1. Strip the "sqlite://" scheme to get a filesystem path.
                // 2. Create parent directories if needed.
                // 3. Create the file, ignoring failure if it already exists.
                if let Some(path) = db_url.strip_prefix("sqlite://") {
                    let path = path.trim();
                    if !path.is_empty() {
                        let p = std::path::Path::new(path);
                        if let Some(parent) = p.parent() {
                            let _ = std::fs::create_dir_all(parent);
                        }
                        if !p.exists() {
                            let _ = std::fs::File::create_new(p);
                        }
                    }
                }
                let checkpointer =
                    crate::runtimes::checkpointer_sqlite::SQLiteCheckpointer::connect(&db_url)
                        .await?;
                Ok(Arc::new(checkpointer))
            }
        }
    }

    /// Starts one turn and returns its handle immediately.
    ///
    /// The turn runs on its own task. Its events flow over a bounded
    /// channel ([`RunConfig::event_capacity`]); a consumer that falls
    /// behind backpressures the turn rather than losing events, and a
    /// dropped stream lets the turn finish unobserved.
    pub fn run(&self, mut request: TurnRequest) -> TurnHandle {
        let config = Arc::new(
            request
                .config
                .take()
                .unwrap_or_else(|| self.app.run_config().clone()),
        );
        let (emitter, events) = event_channel(config.event_capacity);
        let runner = self.clone();
        let join = tokio::spawn(runner.run_turn(request, config, emitter));
        TurnHandle {
            events: Some(events),
            join,
        }
    }

    /// Runs one turn to its end, draining events, and returns the report.
    pub async fn run_to_completion(
        &self,
        request: TurnRequest,
    ) -> Result<TurnReport, RunnerError> {
        let mut handle = self.run(request);
        if let Some(events) = handle.events() {
            // Drain so the bounded queue never blocks the turn.
            while events.recv().await.is_some() {}
        }
        handle.join().await
    }

    /// The latest persisted state of a thread.
    pub async fn state(&self, thread_id: &str) -> Result<StateSnapshot, RunnerError> {
        let checkpoint = self
            .checkpointer
            .load_latest(thread_id)
            .await?
            .ok_or_else(|| RunnerError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            })?;
        Ok(checkpoint.state.snapshot())
    }

    /// Every thread with a persisted checkpoint.
    pub async fn threads(&self) -> Result<Vec<String>, RunnerError> {
        Ok(self.checkpointer.list_threads().await?)
    }

    /// The per-thread lock that serializes turns on one conversation.
    fn thread_lock(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.thread_locks.lock();
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    #[instrument(
        skip(self, request, config, emitter),
        fields(thread_id = %request.thread_id),
        err
    )]
    async fn run_turn(
        self,
        request: TurnRequest,
        config: Arc<RunConfig>,
        emitter: EventEmitter,
    ) -> Result<TurnReport, RunnerError> {
        let lock = self.thread_lock(&request.thread_id);
        let _guard = lock.lock().await;

        tracing::info!(thread_id = %request.thread_id, "turn started");

        // A corrupted record was already demoted to None (and logged) by
        // the backend, so this distinguishes only resume from fresh.
        let restored = match self.checkpointer.load_latest(&request.thread_id).await {
            Ok(restored) => restored,
            Err(err) => return self.abort_turn(err.into(), 0, &emitter).await,
        };
        let (mut state, mut step) = match restored {
            Some(checkpoint) => {
                tracing::debug!(step = checkpoint.step, "resumed from checkpoint");
                (checkpoint.state, checkpoint.step)
            }
            None => {
                tracing::debug!("no checkpoint; starting fresh");
                (AgentState::default(), 0)
            }
        };

        // The incoming human message goes through the same merge barrier
        // as node output, so channel versions stay consistent.
        let seed = NodePartial::new().with_messages(vec![Message::human(&request.message)]);
        self.app.apply_update(&mut state, &NodeKind::Start, &seed)?;

        let mut current = match self.entry_node(&state.snapshot()) {
            Ok(entry) => entry,
            Err(err) => return self.abort_turn(err, step, &emitter).await,
        };

        let mut ran_nodes: Vec<NodeKind> = Vec::new();
        let mut failure: Option<String> = None;

        while let Some(node_kind) = current {
            if ran_nodes.len() as u32 >= config.step_budget {
                let message = format!(
                    "step budget of {} exhausted before reaching {node_kind}",
                    config.step_budget
                );
                tracing::warn!(
                    budget = config.step_budget,
                    next = %node_kind,
                    "step budget exhausted; pausing turn"
                );
                self.app
                    .apply_update(&mut state, &node_kind, &Self::failure_update(&message))?;
                failure = Some(message);
                break;
            }

            step += 1;
            let node = match self.app.node(&node_kind) {
                Some(node) => Arc::clone(node),
                None => {
                    let err = RunnerError::MissingNode { node: node_kind };
                    return self.abort_turn(err, step, &emitter).await;
                }
            };
            let ctx = NodeContext {
                node_id: node_kind.to_string(),
                step,
                thread_id: request.thread_id.clone(),
                user_id: request.user_id.clone(),
                resources: self.resources.clone(),
                config: Arc::clone(&config),
            };

            let update = match node.run(state.snapshot(), ctx).await {
                Ok(update) => match self.app.apply_update(&mut state, &node_kind, &update) {
                    Ok(_) => update,
                    Err(ReducerError::Schema(schema_err)) => {
                        let message =
                            format!("{node_kind} produced an invalid update: {schema_err}");
                        tracing::warn!(
                            node = %node_kind,
                            error = %schema_err,
                            "update rejected by schema; recording failure"
                        );
                        let contained = Self::failure_update(&message);
                        self.app.apply_update(&mut state, &node_kind, &contained)?;
                        failure = Some(message);
                        contained
                    }
                    Err(other) => return self.abort_turn(other.into(), step, &emitter).await,
                },
                Err(node_err) => {
                    let message = format!("{node_kind} failed: {node_err}");
                    tracing::warn!(
                        node = %node_kind,
                        error = %node_err,
                        "node failed; recording failure"
                    );
                    let contained = Self::failure_update(&message);
                    self.app.apply_update(&mut state, &node_kind, &contained)?;
                    failure = Some(message);
                    contained
                }
            };

            ran_nodes.push(node_kind.clone());
            emitter
                .emit(RunEvent::Node {
                    node: node_kind.to_string(),
                    step,
                    update,
                })
                .await;

            if failure.is_some() {
                break;
            }

            current = match self.next_node(&node_kind, &state.snapshot()) {
                Ok(next) => next,
                Err(err) => return self.abort_turn(err, step, &emitter).await,
            };
        }

        // One checkpoint per turn; the pause and failure paths land here too.
        let checkpoint = Checkpoint::new(&request.thread_id, step, state.clone());
        if let Err(err) = self.checkpointer.save(checkpoint).await {
            return self.abort_turn(err.into(), step, &emitter).await;
        }

        let outcome = match failure {
            None => RunOutcome::Completed,
            Some(message) => RunOutcome::Failed { message },
        };
        emitter
            .emit(RunEvent::RunEnd {
                outcome: outcome.clone(),
                step,
            })
            .await;
        tracing::info!(
            step,
            ran = ran_nodes.len(),
            completed = matches!(outcome, RunOutcome::Completed),
            "turn finished"
        );

        Ok(TurnReport {
            thread_id: request.thread_id,
            step,
            ran_nodes,
            outcome,
            snapshot: state.snapshot(),
        })
    }

    /// Terminates the event stream and rethrows; the checkpoint is not
    /// written on this path.
    async fn abort_turn(
        &self,
        err: RunnerError,
        step: u64,
        emitter: &EventEmitter,
    ) -> Result<TurnReport, RunnerError> {
        tracing::error!(error = %err, step, "turn aborted before checkpoint");
        emitter
            .emit(RunEvent::RunEnd {
                outcome: RunOutcome::Failed {
                    message: err.to_string(),
                },
                step,
            })
            .await;
        Err(err)
    }

    /// Resolves where the turn starts: the conditional entry decision when
    /// one is configured, otherwise the first `Start` edge.
    fn entry_node(&self, snapshot: &StateSnapshot) -> Result<Option<NodeKind>, RunnerError> {
        if let Some(entry) = self.app.entry() {
            let key = entry.decide(snapshot);
            return match entry.target_for(&key) {
                Some(target) => {
                    tracing::debug!(key = %key, to = %target, "conditional entry routed");
                    Ok(Some(target.clone()))
                }
                None => Err(RunnerError::Routing {
                    node: NodeKind::Start,
                    key,
                }),
            };
        }
        let targets = self
            .app
            .edges()
            .get(&NodeKind::Start)
            .map(Vec::as_slice)
            .unwrap_or_default();
        match targets {
            [] => Err(RunnerError::NoStartNodes),
            [target, rest @ ..] => {
                if !rest.is_empty() {
                    tracing::warn!(
                        extra = rest.len(),
                        "multiple Start edges; running the first"
                    );
                }
                Ok(if target.is_end() {
                    None
                } else {
                    Some(target.clone())
                })
            }
        }
    }

    /// Resolves a completed node's successor. Conditional edges win over
    /// unconditional ones; `Ok(None)` means the turn is over.
    fn next_node(
        &self,
        current: &NodeKind,
        snapshot: &StateSnapshot,
    ) -> Result<Option<NodeKind>, RunnerError> {
        if let Some(edge) = self
            .app
            .conditional_edges()
            .iter()
            .find(|edge| edge.from() == current)
        {
            let key = edge.decide(snapshot);
            return match edge.target_for(&key) {
                Some(target) => {
                    tracing::debug!(from = %current, key = %key, to = %target, "conditional edge routed");
                    Ok(if target.is_end() {
                        None
                    } else {
                        Some(target.clone())
                    })
                }
                None => Err(RunnerError::Routing {
                    node: current.clone(),
                    key,
                }),
            };
        }

        let targets = self
            .app
            .edges()
            .get(current)
            .map(Vec::as_slice)
            .unwrap_or_default();
        match targets {
            [] => {
                tracing::debug!(from = %current, "no outgoing edges; completing turn");
                Ok(None)
            }
            [target, rest @ ..] => {
                if !rest.is_empty() {
                    tracing::warn!(
                        from = %current,
                        extra = rest.len(),
                        "multiple unconditional targets; taking the first"
                    );
                }
                Ok(if target.is_end() {
                    None
                } else {
                    Some(target.clone())
                })
            }
        }
    }

    fn failure_update(message: &str) -> NodePartial {
        NodePartial::new().with_field(ERROR_FIELD, json!(message))
    }
}
