//! Live progress events for a single run.
//!
//! Each run owns one bounded flume channel. The runner sends exactly one
//! [`RunEvent::Node`] per completed node execution, in completion order,
//! followed by one [`RunEvent::RunEnd`] marker, then closes the channel.
//!
//! The channel is bounded on purpose: a slow consumer backpressures the
//! runner (node progress waits on `send`), so delivery is never lossy. A
//! consumer that drops its [`EventStream`] simply stops the flow of
//! events; the run itself carries on to its checkpoint.
//!
//! Events serialize to JSON for the API layer that sits outside this
//! crate.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::node::NodePartial;

/// Terminal status reported by the end-of-run marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The run reached `End`; the checkpoint is persisted.
    Completed,
    /// The run aborted; the prior checkpoint is intact.
    Failed { message: String },
}

/// One event on a run's progress stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// A node finished and its partial update was merged.
    Node {
        /// Name of the completed node.
        node: String,
        /// Step number the execution occupied.
        step: u64,
        /// The partial update the node produced (post-containment, so a
        /// failed node shows up as an `error` field update).
        update: NodePartial,
    },
    /// The run is over; no further events follow.
    RunEnd { outcome: RunOutcome, step: u64 },
}

impl RunEvent {
    /// Name of the node for node events, `None` for the end marker.
    #[must_use]
    pub fn node_name(&self) -> Option<&str> {
        match self {
            RunEvent::Node { node, .. } => Some(node),
            RunEvent::RunEnd { .. } => None,
        }
    }

    /// Whether this is the end-of-run marker.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, RunEvent::RunEnd { .. })
    }
}

/// Sending half of a run's event channel. Held by the runner only.
#[derive(Clone)]
pub(crate) struct EventEmitter {
    sender: flume::Sender<RunEvent>,
}

impl EventEmitter {
    /// Delivers one event, waiting if the consumer is behind.
    ///
    /// A dropped receiver means the caller stopped listening; the run
    /// continues without event delivery.
    pub(crate) async fn emit(&self, event: RunEvent) {
        let _ = self.sender.send_async(event).await;
    }
}

/// Receiving half of a run's event channel.
pub struct EventStream {
    receiver: flume::Receiver<RunEvent>,
}

impl EventStream {
    /// Next event, or `None` once the run has ended and the channel drained.
    pub async fn recv(&self) -> Option<RunEvent> {
        self.receiver.recv_async().await.ok()
    }

    /// Non-blocking poll for the next event.
    #[must_use]
    pub fn try_recv(&self) -> Option<RunEvent> {
        self.receiver.try_recv().ok()
    }

    /// Adapts the stream for `futures_util` combinators.
    #[must_use]
    pub fn into_async_stream(self) -> BoxStream<'static, RunEvent> {
        self.receiver.into_stream().boxed()
    }

    /// Drains every remaining event; finishes once the sender closes.
    pub async fn collect_all(self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.recv_async().await {
            events.push(event);
        }
        events
    }
}

/// Builds the bounded per-run event channel.
pub(crate) fn event_channel(capacity: usize) -> (EventEmitter, EventStream) {
    let (sender, receiver) = flume::bounded(capacity.max(1));
    (EventEmitter { sender }, EventStream { receiver })
}
