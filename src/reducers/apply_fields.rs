use std::sync::Arc;

use serde_json::Value;

use super::{Reducer, ReducerError};
use crate::{
    channels::schema::{MergePolicy, SchemaError, StateSchema},
    node::NodePartial,
    state::AgentState,
};

/// Folds node-produced field updates into state under the declared schema.
///
/// Every field in the update must be declared; the field's [`MergePolicy`]
/// decides whether the incoming value replaces the stored one or is
/// appended to the stored list. Keys are applied in sorted order so the
/// resulting state is identical across runs.
#[derive(Clone)]
pub struct ApplyFields {
    schema: Arc<StateSchema>,
}

impl ApplyFields {
    #[must_use]
    pub fn new(schema: Arc<StateSchema>) -> Self {
        Self { schema }
    }
}

impl Reducer for ApplyFields {
    fn apply(&self, state: &mut AgentState, update: &NodePartial) -> Result<(), ReducerError> {
        let Some(fields) = &update.fields else {
            return Ok(());
        };
        if fields.is_empty() {
            return Ok(());
        }

        self.schema.validate_update(fields)?;

        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();

        let stored = state.fields.values_mut();
        for key in keys {
            let incoming = &fields[key];
            let Some(spec) = self.schema.spec(key) else {
                return Err(ReducerError::Schema(SchemaError::UndeclaredField {
                    field: key.clone(),
                }));
            };
            match spec.policy {
                MergePolicy::Overwrite => {
                    stored.insert(key.clone(), incoming.clone());
                }
                MergePolicy::Append => {
                    // Validation guarantees the incoming value is an array.
                    let items = incoming.as_array().cloned().unwrap_or_default();
                    match stored.get_mut(key) {
                        Some(Value::Array(existing)) => existing.extend(items),
                        _ => {
                            stored.insert(key.clone(), Value::Array(items));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
