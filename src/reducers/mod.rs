mod add_messages;
mod apply_fields;
mod reducer_registry;

pub use add_messages::AddMessages;
pub use apply_fields::ApplyFields;
pub use reducer_registry::*;

use crate::channels::schema::SchemaError;
use crate::node::NodePartial;
use crate::state::AgentState;
use crate::types::ChannelType;
use std::fmt;

/// Unified reducer trait: every reducer folds a `NodePartial` delta into
/// `AgentState` content. Reducers never touch channel versions; the merge
/// barrier bumps versions after detecting content change.
///
/// Channels currently implemented: messages (append) and fields
/// (schema-directed append or overwrite per field).
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut AgentState, update: &NodePartial) -> Result<(), ReducerError>;
}

#[derive(Debug)]
pub enum ReducerError {
    UnknownChannel(ChannelType),

    Schema(SchemaError),
}

impl fmt::Display for ReducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerError::UnknownChannel(channel) => {
                write!(f, "no reducers registered for channel: {channel:?}")
            }
            ReducerError::Schema(err) => {
                write!(f, "field update rejected by schema: {err}")
            }
        }
    }
}

impl std::error::Error for ReducerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReducerError::Schema(err) => Some(err),
            ReducerError::UnknownChannel(_) => None,
        }
    }
}

impl From<SchemaError> for ReducerError {
    fn from(err: SchemaError) -> Self {
        ReducerError::Schema(err)
    }
}
