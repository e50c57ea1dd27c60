//! Core identifiers for the tutorgraph workflow engine.
//!
//! This module defines the fundamental types used throughout the engine for
//! naming nodes and channels in workflow graphs. These are the core domain
//! concepts that define what a workflow *is*.
//!
//! # Key Types
//!
//! - [`NodeKind`]: Identifies a node in a workflow graph, including the
//!   virtual `Start`/`End` markers
//! - [`ChannelType`]: Identifies the state channels that carry merged data
//!
//! # Examples
//!
//! ```rust
//! use tutorgraph::types::{NodeKind, ChannelType};
//!
//! let start = NodeKind::Start;
//! let respond = NodeKind::Custom("generate_response".to_string());
//! let end = NodeKind::End;
//!
//! // Encode for persistence
//! let encoded = respond.encode();
//! assert_eq!(encoded, "Custom:generate_response");
//!
//! let msgs = ChannelType::Messages;
//! println!("Channel: {msgs}");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `NodeKind` serves as the unique identifier for nodes in the routing
/// table. It provides special handling for the structural endpoints
/// (`Start`/`End`) while allowing arbitrary application nodes through the
/// `Custom` variant.
///
/// # Persistence
///
/// `NodeKind` supports serialization for checkpointing through both serde
/// and the [`encode`](Self::encode)/[`decode`](Self::decode) methods.
///
/// # Examples
///
/// ```rust
/// use tutorgraph::types::NodeKind;
///
/// let start = NodeKind::Start;
/// let end = NodeKind::End;
/// let goals = NodeKind::Custom("generate_goals".to_string());
///
/// // Persistence round-trip
/// let encoded = goals.encode();
/// let decoded = NodeKind::decode(&encoded);
/// assert_eq!(goals, decoded);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry marker that begins workflow execution.
    ///
    /// Start nodes are never implemented; they have no incoming edges and
    /// only serve as the source for the graph's first edges.
    Start,

    /// Virtual terminal marker that completes a run.
    ///
    /// End nodes are never implemented; routing a run to `End` means the
    /// turn is over and the checkpoint is persisted. Pause nodes are
    /// ordinary nodes whose outgoing edge targets `End`.
    End,

    /// Application node identified by a user-defined name.
    ///
    /// The name should be descriptive and unique within the workflow,
    /// e.g. `"generate_goals"` or `"retrieve_knowledge"`.
    Custom(String),
}

impl NodeKind {
    /// Encode a NodeKind into its persisted string form.
    ///
    /// The encoding format is human-readable and forward-compatible:
    /// - `Start` → `"Start"`
    /// - `End` → `"End"`
    /// - `Custom("X")` → `"Custom:X"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => "Start".to_string(),
            NodeKind::End => "End".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode a persisted string form back into a NodeKind.
    ///
    /// Unrecognized formats fall back to `Custom(s)` so older checkpoints
    /// stay loadable.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            NodeKind::Start
        } else if s == "End" {
            NodeKind::End
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    /// Returns `true` if this is a [`Start`](Self::Start) node.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is an [`End`](Self::End) node.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns `true` if this is an application node.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

// Developer experience: allow using string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

/// Identifies one of the state channels carrying merged data.
///
/// The engine keeps conversation history and schema-declared fields in
/// separate channels, each with its own version counter and merge rules.
///
/// # Examples
///
/// ```rust
/// use tutorgraph::types::ChannelType;
///
/// let msgs = ChannelType::Messages;
/// let fields = ChannelType::Fields;
/// println!("merging {msgs} then {fields}");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// The ordered, role-tagged conversation history (append-only).
    Messages,

    /// Schema-declared named fields, each with its own merge policy.
    ///
    /// Covers everything that is not a conversation message: pending
    /// search queries, learning goals, retrieved knowledge, completion
    /// flags, the recorded error string.
    Fields,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Messages => write!(f, "messages"),
            Self::Fields => write!(f, "fields"),
        }
    }
}
