//! Per-thread agent state: versioned channels plus snapshots for nodes.
//!
//! State is what a checkpoint persists and what nodes read. It is split
//! into two versioned channels:
//!
//! - **messages**: the ordered conversation history (append-only)
//! - **fields**: schema-declared named fields (per-field merge policy)
//!
//! Within a run the runner exclusively owns the [`AgentState`]; nodes only
//! ever see an immutable [`StateSnapshot`]. Between runs the checkpoint
//! store owns the persisted form.
//!
//! # Examples
//!
//! ```rust
//! use tutorgraph::state::AgentState;
//! use serde_json::json;
//!
//! let state = AgentState::builder()
//!     .with_human_message("Explain recursion")
//!     .with_field("goals", json!(["understand the base case"]))
//!     .build();
//!
//! let snapshot = state.snapshot();
//! assert_eq!(snapshot.messages.len(), 1);
//! assert_eq!(snapshot.text_list("goals"), vec!["understand the base case"]);
//! assert!(!snapshot.flag("learning_complete"));
//! ```

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::channels::{Channel, FieldsChannel, MessagesChannel};
use crate::message::Message;

/// The mutable state container the runner owns during a turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentState {
    /// Conversation history channel.
    pub messages: MessagesChannel,
    /// Schema-declared fields channel.
    pub fields: FieldsChannel,
}

impl AgentState {
    /// Creates a state holding a single human message, the usual shape of
    /// a brand-new thread's first turn.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tutorgraph::state::AgentState;
    ///
    /// let state = AgentState::new_with_human_message("Explain recursion");
    /// let snap = state.snapshot();
    /// assert_eq!(snap.messages[0].role, "human");
    /// assert_eq!(snap.messages_version, 1);
    /// ```
    #[must_use]
    pub fn new_with_human_message(text: &str) -> Self {
        Self {
            messages: MessagesChannel::seeded(vec![Message::human(text)]),
            fields: FieldsChannel::default(),
        }
    }

    /// Creates a state from an existing conversation history.
    #[must_use]
    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: MessagesChannel::seeded(messages),
            fields: FieldsChannel::default(),
        }
    }

    /// Fluent builder for states with custom messages and fields.
    #[must_use]
    pub fn builder() -> AgentStateBuilder {
        AgentStateBuilder::default()
    }

    /// Takes an immutable point-in-time view for a node or a caller.
    ///
    /// The snapshot clones channel content, so later mutation of the state
    /// leaves it untouched.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            messages: self.messages.snapshot(),
            messages_version: self.messages.version(),
            fields: self.fields.snapshot(),
            fields_version: self.fields.version(),
        }
    }
}

/// Immutable view of state handed to nodes and returned by
/// [`TurnRunner::state`](crate::runtimes::TurnRunner::state).
///
/// Carries channel versions alongside content so callers can tell what a
/// turn changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Conversation history at snapshot time.
    pub messages: Vec<Message>,
    /// Messages channel version at snapshot time.
    pub messages_version: u32,
    /// Field values at snapshot time.
    pub fields: FxHashMap<String, Value>,
    /// Fields channel version at snapshot time.
    pub fields_version: u32,
}

impl StateSnapshot {
    /// Raw value of a field, when present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Text value of a field, when present and a string.
    #[must_use]
    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Flag value of a field; absent reads as `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// String-list value of a field; absent reads as empty.
    #[must_use]
    pub fn text_list(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent message with the given role, if any.
    #[must_use]
    pub fn last_with_role(&self, role: &str) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.has_role(role))
    }

    /// The most recent human utterance, if any.
    #[must_use]
    pub fn last_human(&self) -> Option<&Message> {
        self.last_with_role(Message::HUMAN)
    }

    /// The most recent assistant reply, if any.
    #[must_use]
    pub fn last_assistant(&self) -> Option<&Message> {
        self.last_with_role(Message::ASSISTANT)
    }
}

/// Fluent builder for [`AgentState`].
///
/// Useful for tests and for seeding a thread with history plus initial
/// fields. Channels come out at version 1.
///
/// # Examples
///
/// ```rust
/// use tutorgraph::state::AgentState;
/// use serde_json::json;
///
/// let state = AgentState::builder()
///     .with_human_message("What is memoization?")
///     .with_assistant_message("Let's start from repeated work...")
///     .with_field("queries", json!(["memoization definition"]))
///     .build();
///
/// let snap = state.snapshot();
/// assert_eq!(snap.messages.len(), 2);
/// assert_eq!(snap.text_list("queries").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AgentStateBuilder {
    messages: Vec<Message>,
    fields: FxHashMap<String, Value>,
}

impl AgentStateBuilder {
    /// Appends a human message.
    #[must_use]
    pub fn with_human_message(mut self, content: &str) -> Self {
        self.messages.push(Message::human(content));
        self
    }

    /// Appends an assistant message.
    #[must_use]
    pub fn with_assistant_message(mut self, content: &str) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    /// Appends a system message.
    #[must_use]
    pub fn with_system_message(mut self, content: &str) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    /// Appends a message with an arbitrary role.
    #[must_use]
    pub fn with_message(mut self, role: &str, content: &str) -> Self {
        self.messages.push(Message::new(role, content));
        self
    }

    /// Sets a field value directly (no schema check; the merge barrier
    /// validates updates, the builder is for seeding known-good state).
    #[must_use]
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Builds the final state with both channels at version 1.
    #[must_use]
    pub fn build(self) -> AgentState {
        AgentState {
            messages: MessagesChannel::seeded(self.messages),
            fields: FieldsChannel::seeded(self.fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut state = AgentState::new_with_human_message("first");
        let snap = state.snapshot();
        state.messages.extend([Message::assistant("second")]);
        assert_eq!(snap.messages.len(), 1);
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn snapshot_accessors_read_fields() {
        let state = AgentState::builder()
            .with_human_message("Explain recursion")
            .with_field("goals", json!(["base case", "recursive step"]))
            .with_field("learning_complete", json!(true))
            .with_field("response", json!("done"))
            .build();
        let snap = state.snapshot();
        assert_eq!(snap.text_list("goals").len(), 2);
        assert!(snap.flag("learning_complete"));
        assert_eq!(snap.field_text("response"), Some("done"));
        assert_eq!(snap.last_human().map(|m| m.content.as_str()), Some("Explain recursion"));
        assert!(snap.last_assistant().is_none());
    }
}
