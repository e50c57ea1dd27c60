//! Versioned state channels and the declared field schema.
//!
//! The engine keeps per-thread state in two channels, each carrying a
//! version counter that is bumped exactly when a merge changes its
//! content:
//!
//! - [`MessagesChannel`]: the ordered, role-tagged conversation history.
//!   Append-only; nodes contribute new messages, never rewrites.
//! - [`FieldsChannel`]: named fields declared in a
//!   [`StateSchema`](schema::StateSchema), each with its own merge policy
//!   (append or overwrite). Undeclared fields are rejected with
//!   [`SchemaError`](schema::SchemaError) before any merge happens.
//!
//! Versions exist for change detection: run reports expose which channels
//! a turn touched, and persistence stores versions alongside content so a
//! resumed thread continues counting where it left off.

pub mod schema;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::message::Message;

/// Common surface shared by the state channels.
///
/// A channel owns its content plus a version counter. The merge barrier
/// bumps the version only when content actually changed, so versions are
/// a cheap "did this turn touch the channel" signal.
pub trait Channel {
    /// Type handed out when snapshotting the channel content.
    type Snapshot;

    /// Current version counter.
    fn version(&self) -> u32;

    /// Overwrite the version counter (used when restoring checkpoints).
    fn set_version(&mut self, version: u32);

    /// Clone out the channel content.
    fn snapshot(&self) -> Self::Snapshot;

    /// Bump the version counter, saturating instead of wrapping.
    fn bump_version(&mut self) {
        self.set_version(self.version().saturating_add(1));
    }
}

/// Append-only conversation history channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagesChannel {
    items: Vec<Message>,
    version: u32,
}

impl MessagesChannel {
    /// Creates a channel seeded with the given messages at version 1.
    #[must_use]
    pub fn seeded(items: Vec<Message>) -> Self {
        Self { items, version: 1 }
    }

    /// Restores a channel from persisted content and version.
    #[must_use]
    pub fn restore(items: Vec<Message>, version: u32) -> Self {
        Self { items, version }
    }

    /// Read-only view of the history.
    #[must_use]
    pub fn items(&self) -> &[Message] {
        &self.items
    }

    /// Appends messages in order. Returns whether anything was added.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) -> bool {
        let before = self.items.len();
        self.items.extend(messages);
        self.items.len() != before
    }

    /// Number of messages in the history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The most recent message with the given role, if any.
    #[must_use]
    pub fn last_with_role(&self, role: &str) -> Option<&Message> {
        self.items.iter().rev().find(|m| m.has_role(role))
    }
}

impl Channel for MessagesChannel {
    type Snapshot = Vec<Message>;

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    fn snapshot(&self) -> Vec<Message> {
        self.items.clone()
    }
}

/// Schema-declared named fields with per-field merge policies.
///
/// The channel itself is policy-agnostic storage; the
/// [`reducers`](crate::reducers) apply updates according to the
/// [`StateSchema`](schema::StateSchema) and bump the version on change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldsChannel {
    values: FxHashMap<String, Value>,
    version: u32,
}

impl FieldsChannel {
    /// Creates a channel seeded with the given fields at version 1.
    #[must_use]
    pub fn seeded(values: FxHashMap<String, Value>) -> Self {
        Self { values, version: 1 }
    }

    /// Restores a channel from persisted content and version.
    #[must_use]
    pub fn restore(values: FxHashMap<String, Value>, version: u32) -> Self {
        Self { values, version }
    }

    /// Read-only view of all field values.
    #[must_use]
    pub fn values(&self) -> &FxHashMap<String, Value> {
        &self.values
    }

    /// Mutable access for the reducers.
    pub(crate) fn values_mut(&mut self) -> &mut FxHashMap<String, Value> {
        &mut self.values
    }

    /// Raw value of a field, when present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Text value of a field, when present and a string.
    #[must_use]
    pub fn get_text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    /// Flag value of a field, defaulting to `false` when absent.
    #[must_use]
    pub fn flag(&self, field: &str) -> bool {
        self.values
            .get(field)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// String list value of a field; absent fields read as empty.
    #[must_use]
    pub fn text_list(&self, field: &str) -> Vec<String> {
        self.values
            .get(field)
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
}

impl Channel for FieldsChannel {
    type Snapshot = FxHashMap<String, Value>;

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    fn snapshot(&self) -> FxHashMap<String, Value> {
        self.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_extend_reports_change() {
        let mut ch = MessagesChannel::seeded(vec![Message::human("hi")]);
        assert!(ch.extend([Message::assistant("hello")]));
        assert!(!ch.extend(Vec::<Message>::new()));
        assert_eq!(ch.len(), 2);
        assert_eq!(
            ch.last_with_role(Message::ASSISTANT).map(|m| m.content.as_str()),
            Some("hello")
        );
    }

    #[test]
    fn fields_typed_accessors() {
        let mut values = FxHashMap::default();
        values.insert("response".to_string(), json!("use a base case"));
        values.insert("learning_complete".to_string(), json!(true));
        values.insert("goals".to_string(), json!(["define recursion", "base case"]));
        let ch = FieldsChannel::seeded(values);

        assert_eq!(ch.get_text("response"), Some("use a base case"));
        assert!(ch.flag("learning_complete"));
        assert!(!ch.flag("missing"));
        assert_eq!(ch.text_list("goals").len(), 2);
        assert!(ch.text_list("missing").is_empty());
    }

    #[test]
    fn version_bump_saturates() {
        let mut ch = FieldsChannel::default();
        ch.set_version(u32::MAX);
        ch.bump_version();
        assert_eq!(ch.version(), u32::MAX);
    }
}
