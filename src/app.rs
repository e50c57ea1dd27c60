//! Compiled workflow application: routing table, schema, and merge barrier.
//!
//! An [`App`] is what [`GraphBuilder::compile`](crate::graphs::GraphBuilder::compile)
//! produces: the immutable node registry, edge tables, conditional entry,
//! declared state schema, and the reducer registry that folds node output
//! into state. Execution lives in
//! [`TurnRunner`](crate::runtimes::TurnRunner); the app is the part a
//! runner reads but never mutates.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::channels::schema::StateSchema;
use crate::channels::Channel;
use crate::graphs::{ConditionalEdge, ConditionalEntry};
use crate::node::{Node, NodePartial};
use crate::reducers::{ReducerError, ReducerRegistry};
use crate::runtimes::RunConfig;
use crate::state::AgentState;
use crate::types::NodeKind;
use tracing::instrument;

/// Immutable compiled workflow: topology plus merge rules.
///
/// # Examples
///
/// ```rust
/// use tutorgraph::graphs::GraphBuilder;
/// use tutorgraph::types::NodeKind;
/// use tutorgraph::node::{Node, NodeContext, NodeError, NodePartial};
/// use tutorgraph::state::StateSnapshot;
/// use async_trait::async_trait;
///
/// # struct Respond;
/// # #[async_trait]
/// # impl Node for Respond {
/// #     async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
/// #         Ok(NodePartial::default())
/// #     }
/// # }
/// let app = GraphBuilder::new()
///     .add_node(NodeKind::Custom("respond".into()), Respond)
///     .add_edge(NodeKind::Start, NodeKind::Custom("respond".into()))
///     .add_edge(NodeKind::Custom("respond".into()), NodeKind::End)
///     .compile()
///     .expect("valid graph");
///
/// assert_eq!(app.nodes().len(), 1);
/// assert!(app.entry().is_none());
/// ```
#[derive(Clone)]
pub struct App {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    conditional_edges: Vec<ConditionalEdge>,
    entry: Option<ConditionalEntry>,
    schema: Arc<StateSchema>,
    reducer_registry: ReducerRegistry,
    run_config: RunConfig,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("conditional_edges", &self.conditional_edges)
            .field("entry", &self.entry)
            .field("schema", &self.schema)
            .field("run_config", &self.run_config)
            .finish_non_exhaustive()
    }
}

/// Result of merging one node's partial update.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Channel identifiers whose content changed in this merge.
    pub updated_channels: Vec<&'static str>,
}

impl App {
    /// Internal (crate) factory to build an App while keeping the tables private.
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
        edges: FxHashMap<NodeKind, Vec<NodeKind>>,
        conditional_edges: Vec<ConditionalEdge>,
        entry: Option<ConditionalEntry>,
        schema: StateSchema,
        run_config: RunConfig,
    ) -> Self {
        let schema = Arc::new(schema);
        App {
            nodes,
            edges,
            conditional_edges,
            entry,
            reducer_registry: ReducerRegistry::for_schema(Arc::clone(&schema)),
            schema,
            run_config,
        }
    }

    /// The node registry, keyed by `NodeKind`.
    #[must_use]
    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node>> {
        &self.nodes
    }

    /// One registered node implementation, if present.
    #[must_use]
    pub fn node(&self, kind: &NodeKind) -> Option<&Arc<dyn Node>> {
        self.nodes.get(kind)
    }

    /// The unconditional edges: source node to its targets in insertion order.
    #[must_use]
    pub fn edges(&self) -> &FxHashMap<NodeKind, Vec<NodeKind>> {
        &self.edges
    }

    /// The conditional edges in registration order.
    ///
    /// Conditional edges are consulted before unconditional ones when the
    /// runner resolves a completed node's successor.
    #[must_use]
    pub fn conditional_edges(&self) -> &[ConditionalEdge] {
        &self.conditional_edges
    }

    /// The conditional entry point, when one was configured.
    #[must_use]
    pub fn entry(&self) -> Option<&ConditionalEntry> {
        self.entry.as_ref()
    }

    /// The declared state schema.
    #[must_use]
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// The app-level default run configuration.
    #[must_use]
    pub fn run_config(&self) -> &RunConfig {
        &self.run_config
    }

    /// Merges one node's partial update into state under the channel rules.
    ///
    /// Field updates are validated against the schema before anything is
    /// applied, so a rejected update leaves both channels untouched.
    /// Reducers change content only; this barrier bumps each channel's
    /// version exactly when its content changed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tutorgraph::graphs::GraphBuilder;
    /// # use tutorgraph::types::NodeKind;
    /// # use tutorgraph::node::{Node, NodeContext, NodeError, NodePartial};
    /// # use tutorgraph::state::{AgentState, StateSnapshot};
    /// # use tutorgraph::message::Message;
    /// # use async_trait::async_trait;
    /// # struct Respond;
    /// # #[async_trait]
    /// # impl Node for Respond {
    /// #     async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
    /// #         Ok(NodePartial::default())
    /// #     }
    /// # }
    /// # let app = GraphBuilder::new()
    /// #     .add_node(NodeKind::Custom("respond".into()), Respond)
    /// #     .add_edge(NodeKind::Start, NodeKind::Custom("respond".into()))
    /// #     .add_edge(NodeKind::Custom("respond".into()), NodeKind::End)
    /// #     .compile()
    /// #     .expect("valid graph");
    /// let mut state = AgentState::new_with_human_message("Explain recursion");
    /// let update = NodePartial::new().with_messages(vec![Message::assistant("Sure.")]);
    /// let outcome = app
    ///     .apply_update(&mut state, &NodeKind::Custom("respond".into()), &update)
    ///     .expect("messages always merge");
    /// assert_eq!(outcome.updated_channels, vec!["messages"]);
    /// ```
    #[instrument(skip(self, state, update), err)]
    pub fn apply_update(
        &self,
        state: &mut AgentState,
        node: &NodeKind,
        update: &NodePartial,
    ) -> Result<MergeOutcome, ReducerError> {
        // Validate first so a schema rejection leaves state untouched.
        if let Some(fields) = &update.fields
            && !fields.is_empty()
        {
            self.schema.validate_update(fields)?;
        }

        let msgs_before_len = state.messages.len();
        let msgs_before_ver = state.messages.version();
        let fields_before = state.fields.snapshot();
        let fields_before_ver = state.fields.version();

        // Apply reducers (they do NOT bump versions)
        self.reducer_registry.apply_all(state, update)?;

        // Detect changes & bump versions
        let mut updated: Vec<&'static str> = Vec::new();

        let msgs_changed = state.messages.len() != msgs_before_len;
        if msgs_changed {
            state
                .messages
                .set_version(msgs_before_ver.saturating_add(1));
            tracing::info!(
                target: "tutorgraph::app",
                node = %node,
                channel = "messages",
                before_count = msgs_before_len,
                after_count = state.messages.len(),
                before_version = msgs_before_ver,
                after_version = state.messages.version(),
                "channel updated"
            );
            updated.push("messages");
        }

        let fields_after = state.fields.snapshot();
        let fields_changed = fields_after != fields_before;
        if fields_changed {
            state
                .fields
                .set_version(fields_before_ver.saturating_add(1));
            tracing::info!(
                target: "tutorgraph::app",
                node = %node,
                channel = "fields",
                before_count = fields_before.len(),
                after_count = fields_after.len(),
                before_version = fields_before_ver,
                after_version = state.fields.version(),
                "channel updated"
            );
            updated.push("fields");
        }

        Ok(MergeOutcome {
            updated_channels: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::schema::FieldSpec;
    use crate::graphs::GraphBuilder;
    use crate::message::Message;
    use crate::node::{NodeContext, NodeError};
    use crate::state::StateSnapshot;
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl Node for Noop {
        async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
            Ok(NodePartial::default())
        }
    }

    fn test_app() -> App {
        GraphBuilder::new()
            .add_node(NodeKind::Custom("n".into()), Noop)
            .add_edge(NodeKind::Start, NodeKind::Custom("n".into()))
            .add_edge(NodeKind::Custom("n".into()), NodeKind::End)
            .with_schema(
                StateSchema::new()
                    .with_field("goals", FieldSpec::appended_text_list())
                    .with_field("response", FieldSpec::overwritten_text()),
            )
            .compile()
            .expect("valid graph")
    }

    #[test]
    fn merge_bumps_versions_only_on_change() {
        let app = test_app();
        let mut state = AgentState::new_with_human_message("hi");
        let node = NodeKind::Custom("n".into());

        let outcome = app
            .apply_update(&mut state, &node, &NodePartial::new())
            .expect("empty update merges");
        assert!(outcome.updated_channels.is_empty());
        assert_eq!(state.messages.version(), 1);

        let outcome = app
            .apply_update(
                &mut state,
                &node,
                &NodePartial::new()
                    .with_messages(vec![Message::assistant("hello")])
                    .with_field("response", json!("hello")),
            )
            .expect("declared update merges");
        assert_eq!(outcome.updated_channels, vec!["messages", "fields"]);
        assert_eq!(state.messages.version(), 2);
        assert_eq!(state.fields.version(), 1);
    }

    #[test]
    fn rejected_update_leaves_state_untouched() {
        let app = test_app();
        let mut state = AgentState::new_with_human_message("hi");
        let node = NodeKind::Custom("n".into());

        let err = app
            .apply_update(
                &mut state,
                &node,
                &NodePartial::new()
                    .with_messages(vec![Message::assistant("leaks?")])
                    .with_field("undeclared", json!(1)),
            )
            .expect_err("undeclared field must reject the whole update");
        assert!(matches!(err, ReducerError::Schema(_)));
        // The message part of the same partial must not have been applied.
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages.version(), 1);
    }

    #[test]
    fn overwrite_keeps_last_value() {
        let app = test_app();
        let mut state = AgentState::default();
        let node = NodeKind::Custom("n".into());

        for text in ["first", "second"] {
            app.apply_update(
                &mut state,
                &node,
                &NodePartial::new().with_field("response", json!(text)),
            )
            .expect("declared update merges");
        }
        assert_eq!(state.fields.get_text("response"), Some("second"));
        assert_eq!(state.fields.version(), 2);
    }
}
