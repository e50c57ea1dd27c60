//! Structured payloads the tutoring nodes request from the chat model.
//!
//! Every JSON-mode call deserializes into one of these types through
//! [`parse`]. A payload that does not parse becomes a [`NodeError`], which
//! the executor records into the reserved `error` field; malformed model
//! output never crashes a run.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::clients::ModelOutput;
use crate::node::NodeError;

/// Sub-goals a learning request is broken into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalList {
    pub goals: Vec<String>,
}

/// Search queries derived from the learning goals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryList {
    pub queries: Vec<String>,
}

/// A tutoring reply plus the model's mastery judgement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorReply {
    pub reply: String,
    /// Whether the current goals are now mastered. Absent reads as "keep
    /// going".
    #[serde(default)]
    pub mastered: bool,
}

/// Whether more background material is needed before evaluating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAssessment {
    pub needs_more_context: bool,
    /// What to look up next, when the model named a direction.
    #[serde(default)]
    pub focus: String,
}

/// Verdict on the learner's own explanation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub mastered: bool,
    #[serde(default)]
    pub feedback: String,
}

/// Deserializes a JSON model output into one of the structured payloads.
///
/// Prose where JSON was requested surfaces as
/// [`ModelError::InvalidResponse`](crate::clients::ModelError::InvalidResponse);
/// a JSON object missing required keys surfaces as a serde failure. Both
/// are recoverable node errors.
pub fn parse<T: DeserializeOwned>(output: ModelOutput) -> Result<T, NodeError> {
    let value = output.into_json()?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ModelError;
    use serde_json::json;

    #[test]
    fn goal_list_parses_from_json_output() {
        let output = ModelOutput::Json(json!({
            "goals": ["identify the base case", "trace one recursive call"]
        }));
        let parsed: GoalList = parse(output).unwrap();
        assert_eq!(parsed.goals.len(), 2);
        assert_eq!(parsed.goals[0], "identify the base case");
    }

    #[test]
    fn prose_is_rejected_as_invalid_response() {
        let err = parse::<GoalList>(ModelOutput::Text("here are some goals".into())).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Model(ModelError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn missing_required_key_is_a_serde_failure() {
        let err = parse::<GoalList>(ModelOutput::Json(json!({"gls": []}))).unwrap_err();
        assert!(matches!(err, NodeError::Serde(_)));
    }

    #[test]
    fn optional_keys_default_when_absent() {
        let reply: TutorReply = parse(ModelOutput::Json(json!({"reply": "good start"}))).unwrap();
        assert!(!reply.mastered);

        let assessment: ContextAssessment =
            parse(ModelOutput::Json(json!({"needs_more_context": true}))).unwrap();
        assert!(assessment.needs_more_context);
        assert!(assessment.focus.is_empty());

        let evaluation: Evaluation = parse(ModelOutput::Json(json!({}))).unwrap();
        assert!(!evaluation.mastered);
        assert!(evaluation.feedback.is_empty());
    }
}
