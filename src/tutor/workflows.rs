//! The two tutoring workflow shapes.
//!
//! Both graphs share one node set and one state schema; they differ in
//! how a turn flows. The **learning pipeline** sets a session up once
//! (goals, thread name, retrieval) and then answers each turn. The
//! **Feynman workflow** cycles between assessing context and researching
//! until enough background exists, then evaluates the learner's own
//! explanation; a failed evaluation pauses so the learner can retry on
//! the next turn, resumed from the checkpoint.
//!
//! Routing reads two overwrite flags: `needs_more_context` drives the
//! research cycle and `learning_complete` decides between storing the
//! mastered concept and pausing for more input.

use std::sync::Arc;

use crate::app::App;
use crate::channels::schema::{FieldSpec, StateSchema, LEARNING_COMPLETE_FIELD};
use crate::graphs::{GraphBuilder, GraphError};
use crate::state::StateSnapshot;
use crate::types::NodeKind;

use super::nodes::{
    AssessContext, AwaitInput, EvaluateExplanation, GenerateGoals, GenerateQueries,
    GenerateResponse, NameThread, RetrieveKnowledge, SearchContext, StoreKnowledge,
};

/// Learning goals for the session, appended once when a topic starts.
pub const GOALS_FIELD: &str = "goals";
/// Knowledge-base queries pending retrieval.
pub const QUERIES_FIELD: &str = "queries";
/// Background material accumulated for the session.
pub const KNOWLEDGE_FIELD: &str = "knowledge";
/// The latest tutoring reply.
pub const RESPONSE_FIELD: &str = "response";
/// Display name registered for the thread.
pub const THREAD_NAME_FIELD: &str = "thread_name";
/// Whether the research cycle should run another round.
pub const NEEDS_MORE_CONTEXT_FIELD: &str = "needs_more_context";
/// What the next research round should look up.
pub const CONTEXT_FOCUS_FIELD: &str = "context_focus";

/// Node names registered in both graphs.
pub const GENERATE_GOALS: &str = "generate_goals";
pub const NAME_THREAD: &str = "name_thread";
pub const GENERATE_QUERIES: &str = "generate_queries";
pub const RETRIEVE_KNOWLEDGE: &str = "retrieve_knowledge";
pub const GENERATE_RESPONSE: &str = "generate_response";
pub const ASSESS_CONTEXT: &str = "assess_context";
pub const SEARCH_CONTEXT: &str = "search_context";
pub const EVALUATE_EXPLANATION: &str = "evaluate_explanation";
pub const STORE_KNOWLEDGE: &str = "store_knowledge";
pub const AWAIT_INPUT: &str = "await_input";

/// Entry key for a thread with no goals yet.
pub const NEW_TOPIC_KEY: &str = "new_topic";
/// Entry key for a thread resuming an existing session.
pub const CONTINUE_KEY: &str = "continue";
/// Context decision: research another round.
pub const NEEDS_CONTEXT_KEY: &str = "needs_context";
/// Context decision: enough background, move on.
pub const ENOUGH_CONTEXT_KEY: &str = "enough_context";
/// Completion decision: store the mastered concept.
pub const MASTERED_KEY: &str = "mastered";
/// Completion decision: pause for the learner's next message.
pub const AWAIT_KEY: &str = "await";

fn kind(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

/// State schema shared by both tutoring workflows.
///
/// The reserved `error` and `learning_complete` fields come along from
/// [`StateSchema::new`].
#[must_use]
pub fn tutor_schema() -> StateSchema {
    StateSchema::new()
        .with_field(GOALS_FIELD, FieldSpec::appended_text_list())
        .with_field(QUERIES_FIELD, FieldSpec::appended_text_list())
        .with_field(KNOWLEDGE_FIELD, FieldSpec::appended_text_list())
        .with_field(RESPONSE_FIELD, FieldSpec::overwritten_text())
        .with_field(THREAD_NAME_FIELD, FieldSpec::overwritten_text())
        .with_field(NEEDS_MORE_CONTEXT_FIELD, FieldSpec::overwritten_flag())
        .with_field(CONTEXT_FOCUS_FIELD, FieldSpec::overwritten_text())
}

fn entry_decision(snapshot: &StateSnapshot) -> String {
    if snapshot.text_list(GOALS_FIELD).is_empty() {
        NEW_TOPIC_KEY.to_string()
    } else {
        CONTINUE_KEY.to_string()
    }
}

fn context_decision(snapshot: &StateSnapshot) -> String {
    if snapshot.flag(NEEDS_MORE_CONTEXT_FIELD) {
        NEEDS_CONTEXT_KEY.to_string()
    } else {
        ENOUGH_CONTEXT_KEY.to_string()
    }
}

fn completion_decision(snapshot: &StateSnapshot) -> String {
    if snapshot.flag(LEARNING_COMPLETE_FIELD) {
        MASTERED_KEY.to_string()
    } else {
        AWAIT_KEY.to_string()
    }
}

/// Builder for the linear learning pipeline.
///
/// First turn on a thread: goals, thread name, queries, retrieval, reply.
/// Later turns skip straight to the reply. After the reply,
/// `learning_complete` routes to storage or to the pause node.
#[must_use]
pub fn learning_builder() -> GraphBuilder {
    GraphBuilder::new()
        .with_schema(tutor_schema())
        .add_node(kind(GENERATE_GOALS), GenerateGoals)
        .add_node(kind(NAME_THREAD), NameThread)
        .add_node(kind(GENERATE_QUERIES), GenerateQueries)
        .add_node(kind(RETRIEVE_KNOWLEDGE), RetrieveKnowledge)
        .add_node(kind(GENERATE_RESPONSE), GenerateResponse)
        .add_node(kind(STORE_KNOWLEDGE), StoreKnowledge)
        .add_node(kind(AWAIT_INPUT), AwaitInput)
        .with_conditional_entry(
            Arc::new(entry_decision),
            [
                (NEW_TOPIC_KEY, kind(GENERATE_GOALS)),
                (CONTINUE_KEY, kind(GENERATE_RESPONSE)),
            ],
        )
        .add_edge(kind(GENERATE_GOALS), kind(NAME_THREAD))
        .add_edge(kind(NAME_THREAD), kind(GENERATE_QUERIES))
        .add_edge(kind(GENERATE_QUERIES), kind(RETRIEVE_KNOWLEDGE))
        .add_edge(kind(RETRIEVE_KNOWLEDGE), kind(GENERATE_RESPONSE))
        .add_conditional_edge(
            kind(GENERATE_RESPONSE),
            Arc::new(completion_decision),
            [
                (MASTERED_KEY, kind(STORE_KNOWLEDGE)),
                (AWAIT_KEY, kind(AWAIT_INPUT)),
            ],
        )
        .add_edge(kind(STORE_KNOWLEDGE), NodeKind::End)
        .add_edge(kind(AWAIT_INPUT), NodeKind::End)
}

/// The compiled learning pipeline.
pub fn learning_graph() -> Result<App, GraphError> {
    learning_builder().compile()
}

/// Builder for the Feynman explain-and-evaluate workflow.
///
/// Assessment and research form a cycle that runs until the model judges
/// the background sufficient (or the step budget pauses the run); then
/// the learner's explanation is evaluated and the turn either stores the
/// mastered concept or pauses for a retry.
#[must_use]
pub fn feynman_builder() -> GraphBuilder {
    GraphBuilder::new()
        .with_schema(tutor_schema())
        .add_node(kind(GENERATE_GOALS), GenerateGoals)
        .add_node(kind(ASSESS_CONTEXT), AssessContext)
        .add_node(kind(SEARCH_CONTEXT), SearchContext)
        .add_node(kind(EVALUATE_EXPLANATION), EvaluateExplanation)
        .add_node(kind(STORE_KNOWLEDGE), StoreKnowledge)
        .add_node(kind(AWAIT_INPUT), AwaitInput)
        .with_conditional_entry(
            Arc::new(entry_decision),
            [
                (NEW_TOPIC_KEY, kind(GENERATE_GOALS)),
                (CONTINUE_KEY, kind(ASSESS_CONTEXT)),
            ],
        )
        .add_edge(kind(GENERATE_GOALS), kind(ASSESS_CONTEXT))
        .add_conditional_edge(
            kind(ASSESS_CONTEXT),
            Arc::new(context_decision),
            [
                (NEEDS_CONTEXT_KEY, kind(SEARCH_CONTEXT)),
                (ENOUGH_CONTEXT_KEY, kind(EVALUATE_EXPLANATION)),
            ],
        )
        .add_edge(kind(SEARCH_CONTEXT), kind(ASSESS_CONTEXT))
        .add_conditional_edge(
            kind(EVALUATE_EXPLANATION),
            Arc::new(completion_decision),
            [
                (MASTERED_KEY, kind(STORE_KNOWLEDGE)),
                (AWAIT_KEY, kind(AWAIT_INPUT)),
            ],
        )
        .add_edge(kind(STORE_KNOWLEDGE), NodeKind::End)
        .add_edge(kind(AWAIT_INPUT), NodeKind::End)
}

/// The compiled Feynman workflow.
pub fn feynman_graph() -> Result<App, GraphError> {
    feynman_builder().compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AgentState;
    use serde_json::json;

    #[test]
    fn both_workflows_compile() {
        assert!(learning_graph().is_ok());
        assert!(feynman_graph().is_ok());
    }

    #[test]
    fn schema_declares_every_workflow_field() {
        let schema = tutor_schema();
        for field in [
            GOALS_FIELD,
            QUERIES_FIELD,
            KNOWLEDGE_FIELD,
            RESPONSE_FIELD,
            THREAD_NAME_FIELD,
            NEEDS_MORE_CONTEXT_FIELD,
            CONTEXT_FOCUS_FIELD,
            LEARNING_COMPLETE_FIELD,
            crate::channels::schema::ERROR_FIELD,
        ] {
            assert!(schema.declares(field), "missing declaration for {field}");
        }
    }

    #[test]
    fn entry_routes_new_threads_to_goal_generation() {
        let fresh = AgentState::new_with_human_message("Explain recursion").snapshot();
        assert_eq!(entry_decision(&fresh), NEW_TOPIC_KEY);

        let continuing = AgentState::builder()
            .with_human_message("more please")
            .with_field(GOALS_FIELD, json!(["identify the base case"]))
            .build()
            .snapshot();
        assert_eq!(entry_decision(&continuing), CONTINUE_KEY);
    }

    #[test]
    fn context_decision_follows_the_flag() {
        let needy = AgentState::builder()
            .with_field(NEEDS_MORE_CONTEXT_FIELD, json!(true))
            .build()
            .snapshot();
        assert_eq!(context_decision(&needy), NEEDS_CONTEXT_KEY);

        let satisfied = AgentState::default().snapshot();
        assert_eq!(context_decision(&satisfied), ENOUGH_CONTEXT_KEY);
    }

    #[test]
    fn completion_decision_follows_the_flag() {
        let mastered = AgentState::builder()
            .with_field(LEARNING_COMPLETE_FIELD, json!(true))
            .build()
            .snapshot();
        assert_eq!(completion_decision(&mastered), MASTERED_KEY);
        assert_eq!(completion_decision(&AgentState::default().snapshot()), AWAIT_KEY);
    }
}
