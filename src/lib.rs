//! # Tutorgraph: Workflow Engine for a Multi-Turn Tutoring Agent
//!
//! Tutorgraph executes tutoring conversations as graph-driven workflows
//! with versioned state, schema-validated merges, and per-thread
//! checkpoints. A conversation advances one *turn* at a time: the runner
//! restores the thread's checkpoint, merges the incoming message, walks
//! nodes until routing reaches `End`, and persists exactly one new
//! checkpoint.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Async units of tutoring work over injected clients
//! - **State**: An append-only message channel plus declared scalar/list fields
//! - **Schema**: Merge policies and value shapes, enforced at the merge barrier
//! - **Graph**: Conditional entry and keyed conditional edges over named nodes
//! - **Runner**: Turn execution with checkpoints, events, and a step budget
//!
//! ## Quick Start
//!
//! ### Working with Messages
//!
//! ```
//! use tutorgraph::message::Message;
//!
//! let question = Message::human("What's a base case?");
//! let answer = Message::assistant("The input the recursion stops at.");
//! let instruction = Message::system("You are a patient tutor.");
//!
//! // Custom roles go through the general constructor.
//! let tool_msg = Message::new("tool", "retrieval finished");
//!
//! assert!(question.has_role(Message::HUMAN));
//! assert!(!question.has_role(Message::ASSISTANT));
//! ```
//!
//! ### Building a Workflow
//!
//! ```
//! use tutorgraph::graphs::GraphBuilder;
//! use tutorgraph::message::Message;
//! use tutorgraph::node::{Node, NodeContext, NodeError, NodePartial};
//! use tutorgraph::state::StateSnapshot;
//! use tutorgraph::types::NodeKind;
//! use async_trait::async_trait;
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Node for Greet {
//!     async fn run(
//!         &self,
//!         _snapshot: StateSnapshot,
//!         _ctx: NodeContext,
//!     ) -> Result<NodePartial, NodeError> {
//!         let reply = Message::assistant("What would you like to learn?");
//!         Ok(NodePartial::new().with_messages(vec![reply]))
//!     }
//! }
//!
//! let app = GraphBuilder::new()
//!     .add_node(NodeKind::Custom("greet".into()), Greet)
//!     .add_edge(NodeKind::Start, NodeKind::Custom("greet".into()))
//!     .add_edge(NodeKind::Custom("greet".into()), NodeKind::End)
//!     .compile()
//!     .expect("valid graph");
//! # let _ = app;
//! ```
//!
//! ### Seeding State
//!
//! ```
//! use tutorgraph::state::AgentState;
//! use serde_json::json;
//!
//! let state = AgentState::new_with_human_message("Explain recursion");
//!
//! // Or the builder for history plus initial fields.
//! let continuing = AgentState::builder()
//!     .with_human_message("Explain recursion")
//!     .with_assistant_message("Let's start from the base case.")
//!     .with_field("goals", json!(["identify the base case"]))
//!     .build();
//! # let _ = (state, continuing);
//! ```
//!
//! ## Module Guide
//!
//! - [`message`] - Role-tagged conversation messages
//! - [`state`] - Versioned state, snapshots, and the state builder
//! - [`channels`] - Channel storage, versioning, and the field schema
//! - [`reducers`] - Merge policies applied at the barrier
//! - [`node`] - The node trait, execution context, and partial updates
//! - [`graphs`] - Workflow definition and compilation
//! - [`app`] - The compiled workflow and its merge barrier
//! - [`runtimes`] - Turn execution, checkpoints, and persistence
//! - [`events`] - The bounded per-turn progress stream
//! - [`clients`] - External service traits and retry policy
//! - [`tutor`] - The tutoring nodes and the two workflow shapes

pub mod app;
pub mod channels;
pub mod clients;
pub mod events;
pub mod graphs;
pub mod message;
pub mod node;
pub mod reducers;
pub mod runtimes;
pub mod state;
pub mod tutor;
pub mod types;
