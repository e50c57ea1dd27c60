//! Edge types and decision functions for conditional graph flow.
//!
//! Conditional routing splits into two parts: a pure decision function
//! computes a routing key from the state snapshot, and an explicit map
//! resolves that key to a target node. Targets are visible at build time
//! and validated during compilation; only the key itself is computed at
//! run time.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Decision function for conditional routing.
///
/// Evaluated against the merged state after the source node completes,
/// it returns a routing key that must appear in the edge's target map.
/// A key outside the map is a fatal routing failure for the run.
///
/// # Examples
///
/// ```
/// use tutorgraph::graphs::DecisionFn;
/// use std::sync::Arc;
///
/// // Branch on the completion flag written by the response node.
/// let mastery: DecisionFn = Arc::new(|snapshot| {
///     if snapshot.flag("learning_complete") {
///         "complete".to_string()
///     } else {
///         "continue".to_string()
///     }
/// });
/// ```
pub type DecisionFn = Arc<dyn Fn(&StateSnapshot) -> String + Send + Sync + 'static>;

/// A conditional edge: source node, decision function, and the key map
/// the decision resolves through.
///
/// # Examples
///
/// ```
/// use tutorgraph::graphs::ConditionalEdge;
/// use tutorgraph::types::NodeKind;
/// use std::sync::Arc;
///
/// let edge = ConditionalEdge::new(
///     NodeKind::Custom("generate_response".into()),
///     Arc::new(|snapshot| {
///         if snapshot.flag("learning_complete") { "complete".into() } else { "continue".into() }
///     }),
///     [
///         ("complete", NodeKind::Custom("store_knowledge".into())),
///         ("continue", NodeKind::Custom("await_input".into())),
///     ],
/// );
/// assert_eq!(edge.targets().len(), 2);
/// ```
#[derive(Clone)]
pub struct ConditionalEdge {
    /// The source node for this conditional edge.
    from: NodeKind,
    /// Computes the routing key from merged state.
    decision: DecisionFn,
    /// Routing key to target node.
    targets: FxHashMap<String, NodeKind>,
}

impl ConditionalEdge {
    pub fn new<K>(
        from: impl Into<NodeKind>,
        decision: DecisionFn,
        targets: impl IntoIterator<Item = (K, NodeKind)>,
    ) -> Self
    where
        K: Into<String>,
    {
        Self {
            from: from.into(),
            decision,
            targets: targets
                .into_iter()
                .map(|(key, target)| (key.into(), target))
                .collect(),
        }
    }

    /// Source node of this conditional edge.
    #[must_use]
    pub fn from(&self) -> &NodeKind {
        &self.from
    }

    /// Runs the decision function against a snapshot.
    #[must_use]
    pub fn decide(&self, snapshot: &StateSnapshot) -> String {
        (self.decision)(snapshot)
    }

    /// Target registered for a routing key, if any.
    #[must_use]
    pub fn target_for(&self, key: &str) -> Option<&NodeKind> {
        self.targets.get(key)
    }

    /// The full key-to-target map.
    #[must_use]
    pub fn targets(&self) -> &FxHashMap<String, NodeKind> {
        &self.targets
    }
}

impl std::fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("from", &self.from)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

/// The graph's conditional entry point: a decision function choosing the
/// first node of each run from the freshly merged state.
///
/// Both required tutoring workflows enter this way (fresh thread with no
/// goals starts at goal generation; a resumed thread skips ahead), so the
/// entry is first-class rather than a conditional edge hung off `Start`.
///
/// # Examples
///
/// ```
/// use tutorgraph::graphs::ConditionalEntry;
/// use tutorgraph::types::NodeKind;
/// use std::sync::Arc;
///
/// let entry = ConditionalEntry::new(
///     Arc::new(|snapshot| {
///         if snapshot.text_list("goals").is_empty() { "fresh".into() } else { "resumed".into() }
///     }),
///     [
///         ("fresh", NodeKind::Custom("generate_goals".into())),
///         ("resumed", NodeKind::Custom("generate_response".into())),
///     ],
/// );
/// assert!(entry.target_for("fresh").is_some());
/// ```
#[derive(Clone)]
pub struct ConditionalEntry {
    decision: DecisionFn,
    targets: FxHashMap<String, NodeKind>,
}

impl ConditionalEntry {
    pub fn new<K>(decision: DecisionFn, targets: impl IntoIterator<Item = (K, NodeKind)>) -> Self
    where
        K: Into<String>,
    {
        Self {
            decision,
            targets: targets
                .into_iter()
                .map(|(key, target)| (key.into(), target))
                .collect(),
        }
    }

    /// Runs the entry decision against a snapshot.
    #[must_use]
    pub fn decide(&self, snapshot: &StateSnapshot) -> String {
        (self.decision)(snapshot)
    }

    /// Target registered for an entry key, if any.
    #[must_use]
    pub fn target_for(&self, key: &str) -> Option<&NodeKind> {
        self.targets.get(key)
    }

    /// The full key-to-target map.
    #[must_use]
    pub fn targets(&self) -> &FxHashMap<String, NodeKind> {
        &self.targets
    }
}

impl std::fmt::Debug for ConditionalEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalEntry")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}
