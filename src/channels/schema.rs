//! Declared field schema and partial-update validation.
//!
//! Every named field a workflow uses must be declared up front: its value
//! shape ([`FieldKind`]) and how updates merge ([`MergePolicy`]). The
//! schema is attached to the compiled graph, so a node returning a field
//! nobody declared, or a value of the wrong shape, is caught at the merge
//! barrier with a [`SchemaError`] instead of silently accepted.
//!
//! Two fields are reserved by the engine and always declared:
//!
//! - `error` (text, overwrite): where the executor records node failures.
//! - `learning_complete` (flag, overwrite): the completion flag routing
//!   decisions read.
//!
//! # Examples
//!
//! ```
//! use tutorgraph::channels::schema::{FieldKind, FieldSpec, StateSchema};
//! use serde_json::json;
//! use rustc_hash::FxHashMap;
//!
//! let schema = StateSchema::new()
//!     .with_field("goals", FieldSpec::appended_text_list())
//!     .with_field("response", FieldSpec::overwritten_text());
//!
//! let mut update = FxHashMap::default();
//! update.insert("goals".to_string(), json!(["explain the base case"]));
//! assert!(schema.validate_update(&update).is_ok());
//!
//! update.insert("mood".to_string(), json!("curious"));
//! assert!(schema.validate_update(&update).is_err());
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Name of the reserved overwrite field holding a recorded error string.
pub const ERROR_FIELD: &str = "error";

/// Name of the reserved overwrite flag marking the conversation goal done.
pub const LEARNING_COMPLETE_FIELD: &str = "learning_complete";

/// How updates to a field combine with its existing value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// The update's elements are concatenated onto the existing sequence,
    /// in node-completion order. Updates must be arrays.
    Append,
    /// The update replaces the existing value wholesale; the last
    /// non-absent update wins.
    Overwrite,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// The value shape a declared field accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A single string.
    Text,
    /// An ordered list of strings.
    TextList,
    /// A boolean flag.
    Flag,
    /// Any JSON value (arrays required under [`MergePolicy::Append`]).
    Json,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::TextList => write!(f, "text list"),
            Self::Flag => write!(f, "flag"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Declared shape and merge policy for one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub policy: MergePolicy,
}

impl FieldSpec {
    #[must_use]
    pub fn new(kind: FieldKind, policy: MergePolicy) -> Self {
        Self { kind, policy }
    }

    /// Text field replaced wholesale by each update.
    #[must_use]
    pub fn overwritten_text() -> Self {
        Self::new(FieldKind::Text, MergePolicy::Overwrite)
    }

    /// String list grown by concatenation.
    #[must_use]
    pub fn appended_text_list() -> Self {
        Self::new(FieldKind::TextList, MergePolicy::Append)
    }

    /// Boolean flag replaced wholesale by each update.
    #[must_use]
    pub fn overwritten_flag() -> Self {
        Self::new(FieldKind::Flag, MergePolicy::Overwrite)
    }

    /// Free-form JSON with the given policy.
    #[must_use]
    pub fn json(policy: MergePolicy) -> Self {
        Self::new(FieldKind::Json, policy)
    }
}

/// A partial update broke the declared schema.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum SchemaError {
    /// The update names a field no workflow declared.
    #[error("field '{field}' is not declared in the state schema")]
    #[diagnostic(
        code(tutorgraph::schema::undeclared_field),
        help("declare the field with StateSchema::with_field before compiling the graph")
    )]
    UndeclaredField { field: String },

    /// The update's value does not match the declared shape.
    #[error("field '{field}' expects {expected}, got {found}")]
    #[diagnostic(
        code(tutorgraph::schema::kind_mismatch),
        help("check the node building this update against the declared FieldSpec")
    )]
    KindMismatch {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    /// An append-policy field received a non-array update.
    #[error("append field '{field}' requires an array update, got {found}")]
    #[diagnostic(
        code(tutorgraph::schema::append_requires_array),
        help("append updates carry the elements to add, wrapped in an array")
    )]
    AppendRequiresArray { field: String, found: &'static str },
}

/// The declared set of fields a workflow's state may carry.
///
/// Built once, attached to the compiled [`App`](crate::app::App), and
/// consulted by the merge barrier for every partial update (including the
/// caller-supplied seed of a turn).
#[derive(Clone, Debug)]
pub struct StateSchema {
    fields: FxHashMap<String, FieldSpec>,
}

impl Default for StateSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSchema {
    /// Creates a schema with only the reserved engine fields declared.
    #[must_use]
    pub fn new() -> Self {
        let mut fields = FxHashMap::default();
        fields.insert(ERROR_FIELD.to_string(), FieldSpec::overwritten_text());
        fields.insert(
            LEARNING_COMPLETE_FIELD.to_string(),
            FieldSpec::overwritten_flag(),
        );
        Self { fields }
    }

    /// Declares a field. Redeclaring a name replaces the earlier spec.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Spec for a declared field, if any.
    #[must_use]
    pub fn spec(&self, field: &str) -> Option<&FieldSpec> {
        self.fields.get(field)
    }

    /// Whether a field is declared.
    #[must_use]
    pub fn declares(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Declared field names (unordered).
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Validates a full partial update against the declared fields.
    ///
    /// Checks run field-by-field; the first violation is returned.
    pub fn validate_update(&self, update: &FxHashMap<String, Value>) -> Result<(), SchemaError> {
        // Sort for a deterministic first-error when several fields are bad.
        let mut names: Vec<&String> = update.keys().collect();
        names.sort();
        for name in names {
            let value = &update[name];
            let spec = self
                .fields
                .get(name)
                .ok_or_else(|| SchemaError::UndeclaredField {
                    field: name.clone(),
                })?;
            Self::validate_value(name, spec, value)?;
        }
        Ok(())
    }

    fn validate_value(field: &str, spec: &FieldSpec, value: &Value) -> Result<(), SchemaError> {
        if spec.policy == MergePolicy::Append && !value.is_array() {
            return Err(SchemaError::AppendRequiresArray {
                field: field.to_string(),
                found: json_type_name(value),
            });
        }
        let ok = match spec.kind {
            FieldKind::Text => value.is_string(),
            FieldKind::Flag => value.is_boolean(),
            FieldKind::TextList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldKind::Json => true,
        };
        if ok {
            Ok(())
        } else {
            Err(SchemaError::KindMismatch {
                field: field.to_string(),
                expected: spec.kind,
                found: json_type_name(value),
            })
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
