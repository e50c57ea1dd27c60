use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::{
    channels::schema::StateSchema,
    node::NodePartial,
    reducers::{AddMessages, ApplyFields, Reducer, ReducerError},
    state::AgentState,
    types::ChannelType,
};
use tracing::instrument;

#[derive(Clone)]
pub struct ReducerRegistry {
    reducer_map: FxHashMap<ChannelType, Vec<Arc<dyn Reducer>>>,
}

/// Guard that checks whether a NodePartial actually has meaningful data
/// for the specified channel. This lets the registry skip invoking
/// reducers when there is nothing to do.
fn channel_guard(channel: &ChannelType, partial: &NodePartial) -> bool {
    match channel {
        ChannelType::Messages => partial
            .messages
            .as_ref()
            .map(|v| !v.is_empty())
            .unwrap_or(false),
        ChannelType::Fields => partial
            .fields
            .as_ref()
            .map(|m| !m.is_empty())
            .unwrap_or(false),
    }
}

impl ReducerRegistry {
    /// Creates a new empty reducer registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reducer_map: FxHashMap::default(),
        }
    }

    /// Standard registry for a compiled graph: message appends plus
    /// schema-directed field merges.
    #[must_use]
    pub fn for_schema(schema: Arc<StateSchema>) -> Self {
        Self::new()
            .with_reducer(ChannelType::Messages, Arc::new(AddMessages))
            .with_reducer(ChannelType::Fields, Arc::new(ApplyFields::new(schema)))
    }

    /// Registers a reducer for a specific channel type.
    ///
    /// Multiple reducers can be registered for the same channel and will
    /// be applied in registration order.
    pub fn register(&mut self, channel: ChannelType, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducer_map.entry(channel).or_default().push(reducer);
        self
    }

    /// Builder-style method for registering a reducer.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use tutorgraph::reducers::{ReducerRegistry, AddMessages};
    /// use tutorgraph::types::ChannelType;
    ///
    /// let registry = ReducerRegistry::new()
    ///     .with_reducer(ChannelType::Messages, Arc::new(AddMessages));
    /// ```
    #[must_use]
    pub fn with_reducer(mut self, channel: ChannelType, reducer: Arc<dyn Reducer>) -> Self {
        self.register(channel, reducer);
        self
    }

    #[instrument(skip(self, state, to_update), err)]
    pub fn try_update(
        &self,
        channel_type: ChannelType,
        state: &mut AgentState,
        to_update: &NodePartial,
    ) -> Result<(), ReducerError> {
        // Skip if the partial has no applicable data for this channel.
        if !channel_guard(&channel_type, to_update) {
            return Ok(());
        }

        if let Some(reducers) = self.reducer_map.get(&channel_type) {
            for reducer in reducers {
                reducer.apply(state, to_update)?;
            }
            Ok(())
        } else {
            Err(ReducerError::UnknownChannel(channel_type))
        }
    }

    #[instrument(skip(self, state, merged_update), err)]
    pub fn apply_all(
        &self,
        state: &mut AgentState,
        merged_update: &NodePartial,
    ) -> Result<(), ReducerError> {
        // Fixed channel order keeps partially-applied failures deterministic.
        for channel in [ChannelType::Messages, ChannelType::Fields] {
            if self.reducer_map.contains_key(&channel) {
                self.try_update(channel, state, merged_update)?;
            }
        }
        Ok(())
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::for_schema(Arc::new(StateSchema::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::schema::{FieldSpec, ERROR_FIELD};
    use crate::message::Message;
    use serde_json::json;

    fn tutoring_schema() -> Arc<StateSchema> {
        Arc::new(
            StateSchema::new()
                .with_field("goals", FieldSpec::appended_text_list())
                .with_field("response", FieldSpec::overwritten_text()),
        )
    }

    #[test]
    fn applies_messages_and_fields_in_one_pass() {
        let registry = ReducerRegistry::for_schema(tutoring_schema());
        let mut state = AgentState::new_with_human_message("Explain recursion");

        let update = NodePartial {
            messages: Some(vec![Message::assistant("Let's begin.")]),
            fields: Some(
                [
                    ("goals".to_string(), json!(["understand the base case"])),
                    ("response".to_string(), json!("Let's begin.")),
                ]
                .into_iter()
                .collect(),
            ),
        };

        registry
            .apply_all(&mut state, &update)
            .expect("declared fields should merge");

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.fields.text_list("goals").len(), 1);
        assert_eq!(state.fields.get_text("response"), Some("Let's begin."));
    }

    #[test]
    fn append_policy_accumulates_across_updates() {
        let registry = ReducerRegistry::for_schema(tutoring_schema());
        let mut state = AgentState::default();

        for goal in ["base case", "recursive step"] {
            let update = NodePartial {
                messages: None,
                fields: Some([("goals".to_string(), json!([goal]))].into_iter().collect()),
            };
            registry
                .apply_all(&mut state, &update)
                .expect("append update should merge");
        }

        assert_eq!(
            state.fields.text_list("goals"),
            vec!["base case", "recursive step"]
        );
    }

    #[test]
    fn undeclared_field_is_rejected() {
        let registry = ReducerRegistry::for_schema(tutoring_schema());
        let mut state = AgentState::default();

        let update = NodePartial {
            messages: None,
            fields: Some([("mood".to_string(), json!("curious"))].into_iter().collect()),
        };

        let err = registry
            .apply_all(&mut state, &update)
            .expect_err("undeclared field must not merge");
        assert!(matches!(err, ReducerError::Schema(_)));
        assert!(state.fields.values().is_empty());
    }

    #[test]
    fn reserved_error_field_is_always_declared() {
        let registry = ReducerRegistry::for_schema(tutoring_schema());
        let mut state = AgentState::default();

        let update = NodePartial {
            messages: None,
            fields: Some(
                [(ERROR_FIELD.to_string(), json!("model timed out"))]
                    .into_iter()
                    .collect(),
            ),
        };

        registry
            .apply_all(&mut state, &update)
            .expect("reserved error field is pre-declared");
        assert_eq!(state.fields.get_text(ERROR_FIELD), Some("model timed out"));
    }
}
