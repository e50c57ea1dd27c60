//! Graph compilation and validation.
//!
//! Compiling a [`GraphBuilder`](super::GraphBuilder) checks the wiring a
//! runner will rely on: the graph has executable nodes, a way in, and no
//! edge or decision key pointing at a node nobody registered. Broken
//! wiring is a construction-time failure; nothing invalid reaches a run.

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::app::App;
use crate::types::NodeKind;

/// Construction-time graph validation failures.
///
/// These abort app startup; they are never produced during a run.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// No executable nodes were registered.
    #[error("graph has no executable nodes")]
    #[diagnostic(
        code(tutorgraph::graph::empty),
        help("Register at least one node with add_node before compiling.")
    )]
    EmptyGraph,

    /// Neither `Start` edges nor a conditional entry were provided.
    #[error("graph has no entry point")]
    #[diagnostic(
        code(tutorgraph::graph::no_entry),
        help("Add an edge from NodeKind::Start or set a conditional entry.")
    )]
    NoEntry,

    /// An edge leaves a node that is neither `Start` nor registered.
    #[error("edge source {from} is not a registered node")]
    #[diagnostic(code(tutorgraph::graph::unknown_edge_source))]
    UnknownEdgeSource { from: String },

    /// An edge points at a node that is neither `End` nor registered.
    #[error("edge from {from} targets unregistered node {to}")]
    #[diagnostic(code(tutorgraph::graph::unknown_edge_target))]
    UnknownEdgeTarget { from: String, to: String },

    /// A conditional edge has nothing to route to.
    #[error("conditional edge from {from} has an empty target map")]
    #[diagnostic(
        code(tutorgraph::graph::empty_decision_map),
        help("Every decision key the function can return needs a mapped target.")
    )]
    EmptyDecisionMap { from: String },

    /// A conditional edge maps a key to an unregistered node.
    #[error("conditional edge from {from} maps key {key:?} to unregistered node {target}")]
    #[diagnostic(code(tutorgraph::graph::unknown_decision_target))]
    UnknownDecisionTarget {
        from: String,
        key: String,
        target: String,
    },

    /// The conditional entry has nothing to route to.
    #[error("conditional entry has an empty target map")]
    #[diagnostic(code(tutorgraph::graph::empty_entry_map))]
    EmptyEntryMap,

    /// The conditional entry maps a key to an unregistered node.
    #[error("conditional entry maps key {key:?} to unregistered node {target}")]
    #[diagnostic(code(tutorgraph::graph::unknown_entry_target))]
    UnknownEntryTarget { key: String, target: String },
}

/// Compilation logic for GraphBuilder.
impl super::builder::GraphBuilder {
    /// Compiles the graph into an executable application.
    ///
    /// Validates the assembled wiring and converts it into an [`App`]:
    ///
    /// - at least one executable node is registered
    /// - the graph has an entry (`Start` edges or a conditional entry)
    /// - every edge source/target names `Start`/`End` or a registered node
    /// - every decision map is non-empty with registered targets
    ///
    /// Validation walks keys in sorted order so the first reported error
    /// is stable across runs.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutorgraph::graphs::GraphBuilder;
    /// use tutorgraph::types::NodeKind;
    ///
    /// # struct MyNode;
    /// # #[async_trait::async_trait]
    /// # impl tutorgraph::node::Node for MyNode {
    /// #     async fn run(&self, _: tutorgraph::state::StateSnapshot, _: tutorgraph::node::NodeContext) -> Result<tutorgraph::node::NodePartial, tutorgraph::node::NodeError> {
    /// #         Ok(tutorgraph::node::NodePartial::default())
    /// #     }
    /// # }
    /// let app = GraphBuilder::new()
    ///     .add_node(NodeKind::Custom("process".into()), MyNode)
    ///     .add_edge(NodeKind::Start, NodeKind::Custom("process".into()))
    ///     .add_edge(NodeKind::Custom("process".into()), NodeKind::End)
    ///     .compile()
    ///     .expect("valid graph");
    /// ```
    #[instrument(skip(self), err)]
    pub fn compile(self) -> Result<App, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let has_start_edges = self
            .edges
            .get(&NodeKind::Start)
            .is_some_and(|targets| !targets.is_empty());
        if self.entry.is_none() && !has_start_edges {
            return Err(GraphError::NoEntry);
        }

        if let Some(entry) = &self.entry {
            if entry.targets().is_empty() {
                return Err(GraphError::EmptyEntryMap);
            }
            let mut keys: Vec<&String> = entry.targets().keys().collect();
            keys.sort();
            for key in keys {
                let target = &entry.targets()[key];
                if !self.nodes.contains_key(target) {
                    return Err(GraphError::UnknownEntryTarget {
                        key: key.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        let mut sources: Vec<&NodeKind> = self.edges.keys().collect();
        sources.sort_by_key(|kind| kind.encode());
        for from in sources {
            if !from.is_start() && !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownEdgeSource {
                    from: from.to_string(),
                });
            }
            for to in &self.edges[from] {
                if !to.is_end() && !self.nodes.contains_key(to) {
                    return Err(GraphError::UnknownEdgeTarget {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
            }
        }

        for edge in &self.conditional_edges {
            if !self.nodes.contains_key(edge.from()) {
                return Err(GraphError::UnknownEdgeSource {
                    from: edge.from().to_string(),
                });
            }
            if edge.targets().is_empty() {
                return Err(GraphError::EmptyDecisionMap {
                    from: edge.from().to_string(),
                });
            }
            let mut keys: Vec<&String> = edge.targets().keys().collect();
            keys.sort();
            for key in keys {
                let target = &edge.targets()[key];
                if !target.is_end() && !self.nodes.contains_key(target) {
                    return Err(GraphError::UnknownDecisionTarget {
                        from: edge.from().to_string(),
                        key: key.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            nodes = self.nodes.len(),
            edges = self.edges.values().map(Vec::len).sum::<usize>(),
            conditional_edges = self.conditional_edges.len(),
            has_entry = self.entry.is_some(),
            "graph compiled"
        );

        Ok(App::from_parts(
            self.nodes,
            self.edges,
            self.conditional_edges,
            self.entry,
            self.schema,
            self.run_config,
        ))
    }
}
