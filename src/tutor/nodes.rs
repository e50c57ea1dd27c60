//! The tutoring nodes shared by both workflow shapes.
//!
//! Each node does one unit of work over the injected clients and hands the
//! result back as a [`NodePartial`]. Nodes never touch shared state
//! directly; the merge barrier applies their updates under the declared
//! schema. Failures propagate as [`NodeError`] and are recorded by the
//! executor rather than crashing the run.

use async_trait::async_trait;
use serde_json::json;

use crate::channels::schema::LEARNING_COMPLETE_FIELD;
use crate::clients::{GenerateRequest, ModelError, SnippetEntry};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::outputs::{self, ContextAssessment, Evaluation, GoalList, QueryList, TutorReply};
use super::prompts;
use super::workflows::{
    CONTEXT_FOCUS_FIELD, GOALS_FIELD, KNOWLEDGE_FIELD, NEEDS_MORE_CONTEXT_FIELD, QUERIES_FIELD,
    RESPONSE_FIELD, THREAD_NAME_FIELD,
};

/// How many knowledge snippets one retrieval pulls in.
const RETRIEVAL_LIMIT: usize = 4;

// ============================================================================
// Session setup
// ============================================================================

/// Breaks the opening request into learning goals.
pub struct GenerateGoals;

#[async_trait]
impl Node for GenerateGoals {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let request = GenerateRequest::json(prompts::GOALS_SYSTEM, snapshot.messages.clone());
        let parsed: GoalList = outputs::parse(ctx.generate(request).await?)?;
        tracing::debug!(goals = parsed.goals.len(), "learning goals generated");
        Ok(NodePartial::new().with_field(GOALS_FIELD, json!(parsed.goals)))
    }
}

/// Registers a display name for brand-new threads.
///
/// The `thread_exists` guard makes the node idempotent: a replay after a
/// crash between "node finished" and "checkpoint written" sees the thread
/// registered and skips. A concurrent registration losing the race lands
/// on `AlreadyExists`, which is tolerated for the same reason.
pub struct NameThread;

#[async_trait]
impl Node for NameThread {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        if ctx.thread_exists().await? {
            tracing::debug!(thread_id = %ctx.thread_id, "thread already registered; skipping");
            return Ok(NodePartial::new());
        }
        let request = GenerateRequest::text(prompts::TITLE_SYSTEM, snapshot.messages.clone());
        let title = ctx.generate(request).await?.into_text().trim().to_string();
        let created = ctx.register_thread(&title).await?;
        tracing::debug!(thread_id = %ctx.thread_id, title = %title, ?created, "thread named");
        Ok(NodePartial::new().with_field(THREAD_NAME_FIELD, json!(title)))
    }
}

// ============================================================================
// Knowledge retrieval
// ============================================================================

/// Derives personal-knowledge search queries from the goals.
pub struct GenerateQueries;

#[async_trait]
impl Node for GenerateQueries {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let goals = snapshot.text_list(GOALS_FIELD);
        let instruction = prompts::queries_instruction(&goals);
        let request = GenerateRequest::json(
            prompts::QUERIES_SYSTEM,
            vec![Message::human(&instruction)],
        );
        let parsed: QueryList = outputs::parse(ctx.generate(request).await?)?;
        tracing::debug!(queries = parsed.queries.len(), "retrieval queries generated");
        Ok(NodePartial::new().with_field(QUERIES_FIELD, json!(parsed.queries)))
    }
}

/// Pulls ranked snippets from the user's knowledge namespace.
pub struct RetrieveKnowledge;

#[async_trait]
impl Node for RetrieveKnowledge {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let queries = snapshot.text_list(QUERIES_FIELD);
        if queries.is_empty() {
            tracing::debug!("no queries recorded; skipping retrieval");
            return Ok(NodePartial::new());
        }
        let embeddings = ctx.embed(&queries).await?;
        let hits = ctx.query_snippets(&embeddings, RETRIEVAL_LIMIT).await?;
        tracing::debug!(hits = hits.len(), "knowledge snippets retrieved");
        let texts: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();
        Ok(NodePartial::new().with_field(KNOWLEDGE_FIELD, json!(texts)))
    }
}

// ============================================================================
// Tutoring replies
// ============================================================================

/// Produces the main tutoring reply, anchored to goals and knowledge.
pub struct GenerateResponse;

#[async_trait]
impl Node for GenerateResponse {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let goals = snapshot.text_list(GOALS_FIELD);
        let knowledge = snapshot.text_list(KNOWLEDGE_FIELD);
        let system = prompts::learning_system(&goals, &knowledge);
        let request = GenerateRequest::json(system, snapshot.messages.clone());
        let parsed: TutorReply = outputs::parse(ctx.generate(request).await?)?;
        Ok(NodePartial::new()
            .with_messages(vec![Message::assistant(&parsed.reply)])
            .with_field(RESPONSE_FIELD, json!(parsed.reply))
            .with_field(LEARNING_COMPLETE_FIELD, json!(parsed.mastered)))
    }
}

// ============================================================================
// Feynman cycle
// ============================================================================

/// Decides whether more background material is needed before evaluating.
pub struct AssessContext;

#[async_trait]
impl Node for AssessContext {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let goals = snapshot.text_list(GOALS_FIELD);
        let knowledge = snapshot.text_list(KNOWLEDGE_FIELD);
        let instruction = prompts::assess_instruction(&goals, &knowledge);
        let request = GenerateRequest::json(
            prompts::ASSESS_SYSTEM,
            vec![Message::human(&instruction)],
        );
        let parsed: ContextAssessment = outputs::parse(ctx.generate(request).await?)?;
        tracing::debug!(
            needs_more = parsed.needs_more_context,
            focus = %parsed.focus,
            "context need assessed"
        );
        Ok(NodePartial::new()
            .with_field(NEEDS_MORE_CONTEXT_FIELD, json!(parsed.needs_more_context))
            .with_field(CONTEXT_FOCUS_FIELD, json!(parsed.focus)))
    }
}

/// Researches the first goal and appends the summary to knowledge.
pub struct SearchContext;

#[async_trait]
impl Node for SearchContext {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let goals = snapshot.text_list(GOALS_FIELD);
        let Some(target) = goals.first() else {
            // Nothing to research; clear the flag so the cycle exits.
            tracing::debug!("no goals to research; clearing context flag");
            return Ok(NodePartial::new().with_field(NEEDS_MORE_CONTEXT_FIELD, json!(false)));
        };
        let focus = match snapshot.field_text(CONTEXT_FOCUS_FIELD) {
            Some(focus) if !focus.is_empty() => focus,
            _ => prompts::DEFAULT_FOCUS,
        };
        let request = GenerateRequest::text(
            prompts::RESEARCH_SYSTEM,
            vec![Message::human(&prompts::research_prompt(target, focus))],
        );
        let summary = ctx.generate(request).await?.into_text();
        tracing::debug!(target = %target, "context summary gathered");
        Ok(NodePartial::new().with_field(KNOWLEDGE_FIELD, json!([summary])))
    }
}

/// Judges the learner's own explanation against the target concept.
pub struct EvaluateExplanation;

#[async_trait]
impl Node for EvaluateExplanation {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let goals = snapshot.text_list(GOALS_FIELD);
        let target = goals.first().map_or("the main concept", String::as_str);
        let mut messages = snapshot.messages.clone();
        messages.push(Message::human(&prompts::evaluate_instruction(target)));
        let request = GenerateRequest::json(prompts::FEYNMAN_SYSTEM, messages);
        let parsed: Evaluation = outputs::parse(ctx.generate(request).await?)?;
        tracing::debug!(mastered = parsed.mastered, "explanation evaluated");
        Ok(NodePartial::new()
            .with_messages(vec![Message::assistant(&parsed.feedback)])
            .with_field(LEARNING_COMPLETE_FIELD, json!(parsed.mastered)))
    }
}

// ============================================================================
// Storage and pause
// ============================================================================

/// Persists the mastered concept into the user's knowledge namespace.
///
/// The snippet id is the topic itself, so a replay after a crash replaces
/// the earlier entry instead of duplicating it.
pub struct StoreKnowledge;

#[async_trait]
impl Node for StoreKnowledge {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let goals = snapshot.text_list(GOALS_FIELD);
        let Some(topic) = goals.first().cloned() else {
            tracing::warn!("no goals recorded; nothing to store");
            return Ok(NodePartial::new());
        };
        let mut pieces = snapshot.text_list(KNOWLEDGE_FIELD);
        if let Some(feedback) = snapshot.last_assistant() {
            pieces.push(feedback.content.clone());
        }
        if pieces.is_empty() {
            pieces.push(topic.clone());
        }
        let summary = pieces.join("\n\n");
        let embedding = ctx
            .embed(&[summary.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                NodeError::Model(ModelError::InvalidResponse {
                    message: "embedding client returned no vectors".to_string(),
                })
            })?;
        let entry = SnippetEntry {
            id: topic.clone(),
            text: summary,
            embedding,
            metadata: json!({ "topic": topic, "source": "tutor" }),
        };
        ctx.upsert_snippets(vec![entry]).await?;
        tracing::info!(topic = %topic, "mastered concept stored");
        Ok(NodePartial::new())
    }
}

/// Pause marker: hands the turn back to the learner.
pub struct AwaitInput;

#[async_trait]
impl Node for AwaitInput {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::new())
    }
}
