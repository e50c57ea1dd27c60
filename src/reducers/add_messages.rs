use super::{Reducer, ReducerError};
use crate::{node::NodePartial, state::AgentState};

/// Appends node-produced messages to the conversation history.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddMessages;

impl Reducer for AddMessages {
    fn apply(&self, state: &mut AgentState, update: &NodePartial) -> Result<(), ReducerError> {
        if let Some(messages) = &update.messages
            && !messages.is_empty()
        {
            state.messages.extend(messages.iter().cloned());
        }
        Ok(())
    }
}
