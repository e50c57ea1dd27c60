//! Serde-friendly persisted shapes for checkpoints.
//!
//! These structs are the stored form of [`AgentState`] and [`Checkpoint`],
//! decoupled from the in-memory channel types so the storage layout can
//! stay stable while the engine evolves. Conversions are localized here
//! (`From` impls both ways); the module performs no I/O.
//!
//! The SQLite backend serializes [`PersistedState`] into a single JSON
//! column. A record that fails to decode is treated as corrupted and
//! discarded by the loader, never propagated as a hard error.

use chrono::Utc;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    channels::{Channel, FieldsChannel, MessagesChannel},
    message::Message,
    runtimes::checkpointer::Checkpoint,
    state::AgentState,
};

/// Stored form of the conversation history channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedMessages {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<Message>,
}

/// Stored form of the declared fields channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedFields {
    pub version: u32,
    #[serde(default)]
    pub values: FxHashMap<String, Value>,
}

/// Complete stored form of the in-memory [`AgentState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    pub messages: PersistedMessages,
    pub fields: PersistedFields,
}

/// Full stored form of a [`Checkpoint`].
///
/// `created_at` is kept as an RFC 3339 string so the serialized shape has
/// no chrono types in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub thread_id: String,
    pub step: u64,
    pub state: PersistedState,
    pub created_at: String,
}

impl From<&AgentState> for PersistedState {
    fn from(state: &AgentState) -> Self {
        PersistedState {
            messages: PersistedMessages {
                version: state.messages.version(),
                items: state.messages.snapshot(),
            },
            fields: PersistedFields {
                version: state.fields.version(),
                values: state.fields.snapshot(),
            },
        }
    }
}

impl From<PersistedState> for AgentState {
    fn from(persisted: PersistedState) -> Self {
        AgentState {
            messages: MessagesChannel::restore(
                persisted.messages.items,
                persisted.messages.version,
            ),
            fields: FieldsChannel::restore(persisted.fields.values, persisted.fields.version),
        }
    }
}

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(checkpoint: &Checkpoint) -> Self {
        PersistedCheckpoint {
            thread_id: checkpoint.thread_id.clone(),
            step: checkpoint.step,
            state: PersistedState::from(&checkpoint.state),
            created_at: checkpoint.created_at.to_rfc3339(),
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(persisted: PersistedCheckpoint) -> Self {
        // An unparseable timestamp is cosmetic; keep the checkpoint usable.
        let created_at = chrono::DateTime::parse_from_rfc3339(&persisted.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Checkpoint {
            thread_id: persisted.thread_id,
            step: persisted.step,
            state: AgentState::from(persisted.state),
            created_at,
        }
    }
}
