//! Turn execution reports.
//!
//! A turn is one request/response cycle on a thread: the runner merges the
//! incoming human message, walks nodes until routing reaches `End` (or the
//! run is forced to pause), persists a checkpoint, and hands back a
//! [`TurnReport`].

use crate::events::RunOutcome;
use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Result of executing one turn on a thread.
///
/// # Examples
///
/// ```rust
/// use tutorgraph::runtimes::TurnReport;
///
/// fn summarize(report: &TurnReport) {
///     println!(
///         "thread {} at step {}: ran {} nodes",
///         report.thread_id,
///         report.step,
///         report.ran_nodes.len()
///     );
///     if let Some(message) = report.error_message() {
///         println!("recorded failure: {message}");
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The thread this turn ran on.
    pub thread_id: String,
    /// The thread's step counter after the turn (nodes executed, all turns).
    pub step: u64,
    /// Nodes executed during this turn, in completion order.
    pub ran_nodes: Vec<NodeKind>,
    /// How the turn ended. `Failed` still leaves a usable checkpoint: the
    /// failure was recorded into state and the thread paused.
    pub outcome: RunOutcome,
    /// The merged state after the turn, as persisted.
    pub snapshot: StateSnapshot,
}

impl TurnReport {
    /// Whether the turn routed cleanly to `End`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    /// The recorded failure message, when the turn was forced to pause.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Failed { message } => Some(message),
        }
    }
}
