//! GraphBuilder implementation for constructing tutoring workflows.
//!
//! This module contains the main GraphBuilder type and its fluent API
//! for assembling nodes, edges, the conditional entry point, and the
//! state schema before compiling to an executable [`App`](crate::app::App).

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{ConditionalEdge, ConditionalEntry, DecisionFn};
use crate::channels::schema::StateSchema;
use crate::node::Node;
use crate::runtimes::RunConfig;
use crate::types::NodeKind;

/// Builder for workflow graphs with a fluent API.
///
/// A graph needs executable nodes, a way in (either edges from the
/// virtual `Start` marker or a conditional entry), and edges leading to
/// the virtual `End` marker. [`compile`](Self::compile) validates the
/// assembled graph and rejects broken wiring before anything runs.
///
/// `NodeKind::Start` and `NodeKind::End` are virtual endpoints: they are
/// never registered with `add_node` and never executed.
///
/// # Examples
///
/// ```
/// use tutorgraph::graphs::GraphBuilder;
/// use tutorgraph::types::NodeKind;
/// use std::sync::Arc;
///
/// # struct MyNode;
/// # #[async_trait::async_trait]
/// # impl tutorgraph::node::Node for MyNode {
/// #     async fn run(&self, _: tutorgraph::state::StateSnapshot, _: tutorgraph::node::NodeContext) -> Result<tutorgraph::node::NodePartial, tutorgraph::node::NodeError> {
/// #         Ok(tutorgraph::node::NodePartial::default())
/// #     }
/// # }
/// let app = GraphBuilder::new()
///     .add_node(NodeKind::Custom("respond".into()), MyNode)
///     .add_node(NodeKind::Custom("await_input".into()), MyNode)
///     .with_conditional_entry(
///         Arc::new(|_| "r".to_string()),
///         [("r", NodeKind::Custom("respond".into()))],
///     )
///     .add_edge(NodeKind::Custom("respond".into()), NodeKind::Custom("await_input".into()))
///     .add_edge(NodeKind::Custom("await_input".into()), NodeKind::End)
///     .compile()
///     .expect("valid graph");
/// ```
pub struct GraphBuilder {
    /// Registry of all nodes in the graph, keyed by their identifier.
    pub nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    /// Unconditional edges defining static graph topology.
    pub edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    /// Conditional edges for state-dependent routing.
    pub conditional_edges: Vec<ConditionalEdge>,
    /// Conditional entry point choosing each run's first node.
    pub entry: Option<ConditionalEntry>,
    /// Declared state fields and their merge policies.
    pub schema: StateSchema,
    /// Default per-run configuration for the compiled application.
    pub run_config: RunConfig,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a new, empty graph builder.
    ///
    /// Starts with no nodes or edges, the base schema (reserved fields
    /// only), and default run configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
            entry: None,
            schema: StateSchema::new(),
            run_config: RunConfig::default(),
        }
    }

    /// Adds a node to the graph.
    ///
    /// NOTE: `NodeKind::Start` and `NodeKind::End` are virtual structural
    /// endpoints. If either is passed to `add_node`, the registration is
    /// ignored and a warning is emitted; they are never stored in the
    /// registry and never executed.
    #[must_use]
    pub fn add_node(mut self, id: NodeKind, node: impl Node + 'static) -> Self {
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(
                    ?id,
                    "Ignoring registration of virtual node kind (Start/End are virtual)"
                );
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Adds an unconditional edge between two nodes.
    ///
    /// When the `from` node completes, the runner considers `to` next.
    /// Edges from `Start` define unconditional entry points; edges to
    /// `End` finish the run.
    #[must_use]
    pub fn add_edge(mut self, from: NodeKind, to: NodeKind) -> Self {
        self.edges.entry(from).or_default().push(to);
        self
    }

    /// Adds a conditional edge: after `from` completes, `decision` computes
    /// a routing key that `targets` resolves to the next node.
    ///
    /// Every target is validated at compile time. At run time a key
    /// missing from the map aborts the run before the checkpoint write.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutorgraph::graphs::GraphBuilder;
    /// use tutorgraph::types::NodeKind;
    /// use std::sync::Arc;
    ///
    /// # struct MyNode;
    /// # #[async_trait::async_trait]
    /// # impl tutorgraph::node::Node for MyNode {
    /// #     async fn run(&self, _: tutorgraph::state::StateSnapshot, _: tutorgraph::node::NodeContext) -> Result<tutorgraph::node::NodePartial, tutorgraph::node::NodeError> {
    /// #         Ok(tutorgraph::node::NodePartial::default())
    /// #     }
    /// # }
    /// let builder = GraphBuilder::new()
    ///     .add_node(NodeKind::Custom("evaluate".into()), MyNode)
    ///     .add_node(NodeKind::Custom("store".into()), MyNode)
    ///     .add_node(NodeKind::Custom("await_input".into()), MyNode)
    ///     .add_conditional_edge(
    ///         NodeKind::Custom("evaluate".into()),
    ///         Arc::new(|snapshot| {
    ///             if snapshot.flag("learning_complete") { "done".into() } else { "more".into() }
    ///         }),
    ///         [
    ///             ("done", NodeKind::Custom("store".into())),
    ///             ("more", NodeKind::Custom("await_input".into())),
    ///         ],
    ///     );
    /// ```
    #[must_use]
    pub fn add_conditional_edge<K>(
        mut self,
        from: NodeKind,
        decision: DecisionFn,
        targets: impl IntoIterator<Item = (K, NodeKind)>,
    ) -> Self
    where
        K: Into<String>,
    {
        self.conditional_edges
            .push(ConditionalEdge::new(from, decision, targets));
        self
    }

    /// Sets the conditional entry point choosing each run's first node.
    ///
    /// Replaces any previously set entry. Entry targets are validated at
    /// compile time just like conditional edge targets.
    #[must_use]
    pub fn with_conditional_entry<K>(
        mut self,
        decision: DecisionFn,
        targets: impl IntoIterator<Item = (K, NodeKind)>,
    ) -> Self
    where
        K: Into<String>,
    {
        self.entry = Some(ConditionalEntry::new(decision, targets));
        self
    }

    /// Declares the state fields nodes may write, with their merge
    /// policies. Reserved fields stay declared regardless.
    #[must_use]
    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the default per-run configuration for the compiled app.
    ///
    /// A run request may still carry its own `RunConfig`, which wins over
    /// this default.
    #[must_use]
    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }
}
