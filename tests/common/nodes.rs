//! Fixture nodes for exercising the engine without the tutoring stack.

use async_trait::async_trait;
use serde_json::Value;
use tutorgraph::clients::GenerateRequest;
use tutorgraph::message::Message;
use tutorgraph::node::{Node, NodeContext, NodeError, NodePartial};
use tutorgraph::state::StateSnapshot;

/// Appends one assistant message.
#[derive(Debug, Clone)]
pub struct SayNode {
    pub msg: &'static str,
}

#[async_trait]
impl Node for SayNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::new().with_messages(vec![Message::assistant(self.msg)]))
    }
}

/// Writes one field with a fixed value.
#[derive(Debug, Clone)]
pub struct WriteField {
    pub field: &'static str,
    pub value: Value,
}

#[async_trait]
impl Node for WriteField {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::new().with_field(self.field, self.value.clone()))
    }
}

/// Always fails with a missing-input error.
#[derive(Debug, Clone)]
pub struct FailNode;

#[async_trait]
impl Node for FailNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        Err(NodeError::MissingInput {
            what: "input this node always demands",
        })
    }
}

/// Does nothing.
#[derive(Debug, Clone)]
pub struct NoopNode;

#[async_trait]
impl Node for NoopNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        Ok(NodePartial::default())
    }
}

/// Calls the chat model once and appends the prose answer.
///
/// The call runs under the turn's retry policy, so this is the fixture
/// for timeout and retry behavior.
#[derive(Debug, Clone)]
pub struct AskModelNode;

#[async_trait]
impl Node for AskModelNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let request = GenerateRequest::text("answer briefly", snapshot.messages.clone());
        let text = ctx.generate(request).await?.into_text();
        Ok(NodePartial::new().with_messages(vec![Message::assistant(&text)]))
    }
}
