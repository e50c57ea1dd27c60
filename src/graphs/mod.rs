//! Graph definition and compilation for tutoring workflows.
//!
//! This module provides the graph building functionality for assembling
//! workflows from nodes, edges, and conditional routing. The main entry
//! point is [`GraphBuilder`], which uses a builder pattern to construct
//! workflows that compile into executable [`App`](crate::app::App)
//! instances.
//!
//! # Core Concepts
//!
//! - **Nodes**: Executable units of work implementing the [`Node`](crate::node::Node) trait
//! - **Edges**: Connections between nodes defining execution flow
//! - **Conditional Edges**: A decision function computes a routing key,
//!   resolved through an explicit key-to-target map
//! - **Conditional Entry**: The same decision pattern choosing each run's
//!   first node from merged state
//! - **Virtual Endpoints**: `NodeKind::Start` and `NodeKind::End` for structural definition
//! - **Compilation**: Validation and conversion to an executable [`App`](crate::app::App)
//!
//! # Quick Start
//!
//! ```
//! use tutorgraph::graphs::GraphBuilder;
//! use tutorgraph::types::NodeKind;
//! use tutorgraph::node::{Node, NodeContext, NodePartial, NodeError};
//! use tutorgraph::state::StateSnapshot;
//! use async_trait::async_trait;
//!
//! // Define a simple node
//! struct MyNode;
//!
//! #[async_trait]
//! impl Node for MyNode {
//!     async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
//!         Ok(NodePartial::default())
//!     }
//! }
//!
//! // Build a simple workflow (virtual Start/End):
//! // Start (virtual) -> process -> End (virtual)
//! let app = GraphBuilder::new()
//!     .add_node(NodeKind::Custom("process".into()), MyNode)
//!     .add_edge(NodeKind::Start, NodeKind::Custom("process".into()))
//!     .add_edge(NodeKind::Custom("process".into()), NodeKind::End)
//!     .compile()
//!     .expect("valid graph");
//! ```
//!
//! # Conditional Routing
//!
//! Decision functions are pure: they read the snapshot and return a key.
//! All reachable targets are named in the map, so compilation can check
//! them up front, and a key that resolves to nothing is a fatal routing
//! failure at run time rather than a silent skip.
//!
//! ```
//! use tutorgraph::graphs::GraphBuilder;
//! use tutorgraph::types::NodeKind;
//! use std::sync::Arc;
//!
//! # struct MyNode;
//! # #[async_trait::async_trait]
//! # impl tutorgraph::node::Node for MyNode {
//! #     async fn run(&self, _: tutorgraph::state::StateSnapshot, _: tutorgraph::node::NodeContext) -> Result<tutorgraph::node::NodePartial, tutorgraph::node::NodeError> {
//! #         Ok(tutorgraph::node::NodePartial::default())
//! #     }
//! # }
//! let app = GraphBuilder::new()
//!     .add_node(NodeKind::Custom("evaluate".into()), MyNode)
//!     .add_node(NodeKind::Custom("store".into()), MyNode)
//!     .add_node(NodeKind::Custom("await_input".into()), MyNode)
//!     .add_edge(NodeKind::Start, NodeKind::Custom("evaluate".into()))
//!     .add_conditional_edge(
//!         NodeKind::Custom("evaluate".into()),
//!         Arc::new(|snapshot| {
//!             if snapshot.flag("learning_complete") { "done".into() } else { "more".into() }
//!         }),
//!         [
//!             ("done", NodeKind::Custom("store".into())),
//!             ("more", NodeKind::Custom("await_input".into())),
//!         ],
//!     )
//!     .add_edge(NodeKind::Custom("store".into()), NodeKind::End)
//!     .add_edge(NodeKind::Custom("await_input".into()), NodeKind::End)
//!     .compile()
//!     .expect("valid graph");
//! ```

// Internal module declarations
mod builder;
mod compilation;
mod edges;

// Public re-exports
pub use builder::GraphBuilder;
pub use compilation::GraphError;
pub use edges::{ConditionalEdge, ConditionalEntry, DecisionFn};
