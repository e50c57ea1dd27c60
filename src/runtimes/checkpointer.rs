//! Checkpoint persistence for conversation threads.
//!
//! A [`Checkpoint`] is the durable record of one thread after a turn: the
//! merged state plus the thread's step counter. The runner saves exactly
//! one checkpoint per turn, and only stores the latest per thread; a
//! paused thread resumes by loading it back and merging the next human
//! message on top.
//!
//! [`Checkpointer`] is the pluggable backend seam. The crate ships
//! [`InMemoryCheckpointer`] for tests and short-lived processes, and a
//! SQLite backend behind the `sqlite` feature for durability across
//! restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::state::AgentState;

/// Snapshot of one thread's merged state after a completed turn.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// The conversation thread this checkpoint belongs to.
    pub thread_id: String,
    /// The thread's step counter: total nodes executed across all turns.
    pub step: u64,
    /// The merged state, channel versions included.
    pub state: AgentState,
    /// When this checkpoint was taken.
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Builds a checkpoint stamped with the current time.
    #[must_use]
    pub fn new(thread_id: impl Into<String>, step: u64, state: AgentState) -> Self {
        Self {
            thread_id: thread_id.into(),
            step,
            state,
            created_at: Utc::now(),
        }
    }
}

/// Failures raised by checkpoint backends.
///
/// Unreadable checkpoint *content* is not an error: backends treat a
/// corrupted record as absent (loading yields `Ok(None)` plus a warning)
/// so a damaged row never wedges its thread.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    /// The storage backend failed (connection, query, transaction).
    #[error("checkpoint backend error: {message}")]
    #[diagnostic(
        code(tutorgraph::checkpointer::backend),
        help("Check the database URL and that migrations have been applied.")
    )]
    Backend { message: String },

    /// Anything else, serialization failures included.
    #[error("checkpoint error: {message}")]
    #[diagnostic(code(tutorgraph::checkpointer::other))]
    Other { message: String },
}

pub type Result<T> = std::result::Result<T, CheckpointerError>;

/// Pluggable persistence backend for thread checkpoints.
///
/// Backends keep only the latest checkpoint per thread; `save` replaces
/// whatever was stored before.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persists a checkpoint, replacing the thread's previous one.
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Loads the latest checkpoint for a thread.
    ///
    /// `Ok(None)` means the thread has no usable checkpoint, either
    /// because it never ran or because the stored record could not be
    /// decoded (logged as a warning by the backend).
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Lists every thread with a stored checkpoint.
    async fn list_threads(&self) -> Result<Vec<String>>;
}

/// Selects which checkpoint backend a runner should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointerType {
    /// Volatile storage; state is lost when the process exits.
    InMemory,
    /// Durable SQLite storage resolved from the environment.
    #[cfg(feature = "sqlite")]
    SQLite,
}

/// Volatile checkpoint storage for tests and short-lived processes.
///
/// # Examples
///
/// ```rust,no_run
/// use tutorgraph::runtimes::{Checkpoint, Checkpointer, InMemoryCheckpointer};
/// use tutorgraph::state::AgentState;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryCheckpointer::new();
/// let state = AgentState::new_with_human_message("Explain recursion");
/// store.save(Checkpoint::new("thread-1", 4, state)).await?;
///
/// let restored = store.load_latest("thread-1").await?;
/// assert_eq!(restored.map(|cp| cp.step), Some(4));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    latest: RwLock<FxHashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        self.latest
            .write()
            .insert(checkpoint.thread_id.clone(), checkpoint);
        Ok(())
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.latest.read().get(thread_id).cloned())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let mut threads: Vec<String> = self.latest.read().keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }
}
