//! Routing through the runner: conditional entry, keyed conditional edges,
//! and the one fatal failure class (an unmapped decision key).

mod common;
use common::*;

use serde_json::json;
use std::sync::Arc;
use tutorgraph::app::App;
use tutorgraph::channels::schema::{FieldSpec, StateSchema};
use tutorgraph::events::{RunEvent, RunOutcome};
use tutorgraph::graphs::{DecisionFn, GraphBuilder};
use tutorgraph::runtimes::{
    Checkpointer, InMemoryCheckpointer, RunnerError, TurnRequest, TurnRunner,
};
use tutorgraph::types::NodeKind;

/// Start -> say, then a conditional edge that only maps the first turn's
/// key. The second turn's key has no target, which must be fatal.
fn partially_mapped_app() -> App {
    let decision: DecisionFn = Arc::new(|snapshot| {
        if snapshot.messages.len() > 2 {
            "again".into()
        } else {
            "first".into()
        }
    });
    GraphBuilder::new()
        .add_node(kind("say"), SayNode { msg: "reply" })
        .add_edge(NodeKind::Start, kind("say"))
        .add_conditional_edge(kind("say"), decision, [("first", NodeKind::End)])
        .compile()
        .expect("valid graph")
}

#[tokio::test]
async fn unmapped_decision_key_aborts_before_the_checkpoint() {
    let store = Arc::new(InMemoryCheckpointer::new());
    let runner = TurnRunner::with_checkpointer(
        partially_mapped_app(),
        FakeWorld::scripted(vec![]).resources(),
        Arc::clone(&store) as Arc<dyn Checkpointer>,
    );

    let first = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "hello"))
        .await
        .expect("mapped key completes");
    assert_eq!(first.step, 1);

    let err = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "hello again"))
        .await
        .expect_err("unmapped key is fatal");
    match err {
        RunnerError::Routing { node, key } => {
            assert_eq!(node, kind("say"));
            assert_eq!(key, "again");
        }
        other => panic!("expected routing error, got {other:?}"),
    }

    // The first turn's checkpoint must be untouched by the aborted turn.
    let intact = store
        .load_latest("thread-1")
        .await
        .expect("load")
        .expect("checkpoint survives");
    assert_eq!(intact.step, 1);
    assert_eq!(intact.state.snapshot().messages.len(), 2);
}

#[tokio::test]
async fn aborted_turn_still_announces_its_end_on_the_stream() {
    let runner = TurnRunner::new(
        partially_mapped_app(),
        FakeWorld::scripted(vec![]).resources(),
    );
    runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "hello"))
        .await
        .expect("first turn");

    let mut handle = runner.run(TurnRequest::new("thread-1", "user-1", "hello again"));
    let events = handle.events().expect("stream available once");
    let events = events.collect_all().await;
    handle.join().await.expect_err("turn aborts");

    // The failed node still ran, so its event precedes the end marker.
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].node_name(), Some("say"));
    match &events[1] {
        RunEvent::RunEnd {
            outcome: RunOutcome::Failed { message },
            ..
        } => assert!(message.contains("no route"), "got: {message}"),
        other => panic!("expected failed end marker, got {other:?}"),
    }
}

#[tokio::test]
async fn conditional_entry_selects_by_merged_state() {
    let decision: DecisionFn = Arc::new(|snapshot| {
        if snapshot.text_list("goals").is_empty() {
            "new".into()
        } else {
            "resume".into()
        }
    });
    let app = GraphBuilder::new()
        .add_node(
            kind("warmup"),
            WriteField {
                field: "goals",
                value: json!(["learn the basics"]),
            },
        )
        .add_node(kind("direct"), SayNode { msg: "welcome back" })
        .with_conditional_entry(decision, [("new", kind("warmup")), ("resume", kind("direct"))])
        .add_edge(kind("warmup"), NodeKind::End)
        .add_edge(kind("direct"), NodeKind::End)
        .with_schema(StateSchema::new().with_field("goals", FieldSpec::appended_text_list()))
        .compile()
        .expect("valid graph");
    let runner = TurnRunner::new(app, FakeWorld::scripted(vec![]).resources());

    let first = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "hi"))
        .await
        .expect("first turn");
    assert_eq!(first.ran_nodes, vec![kind("warmup")]);

    // Goals are persisted now, so the entry decision flips.
    let second = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "hi again"))
        .await
        .expect("second turn");
    assert_eq!(second.ran_nodes, vec![kind("direct")]);
}

#[tokio::test]
async fn entry_decision_reads_the_incoming_message() {
    // The turn's human message is merged before the entry decision runs.
    let decision: DecisionFn = Arc::new(|snapshot| {
        let text = snapshot.last_human().map(|m| m.content.as_str()).unwrap_or("");
        if text.starts_with("quiz") {
            "quiz".into()
        } else {
            "explain".into()
        }
    });
    let app = GraphBuilder::new()
        .add_node(kind("quiz"), SayNode { msg: "question one" })
        .add_node(kind("explain"), SayNode { msg: "definition first" })
        .with_conditional_entry(decision, [("quiz", kind("quiz")), ("explain", kind("explain"))])
        .add_edge(kind("quiz"), NodeKind::End)
        .add_edge(kind("explain"), NodeKind::End)
        .compile()
        .expect("valid graph");
    let runner = TurnRunner::new(app, FakeWorld::scripted(vec![]).resources());

    let report = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "quiz me on recursion"))
        .await
        .expect("turn completes");
    assert_eq!(report.ran_nodes, vec![kind("quiz")]);
}

#[tokio::test]
async fn unmapped_entry_key_leaves_no_checkpoint() {
    let decision: DecisionFn = Arc::new(|_| "surprise".into());
    let app = GraphBuilder::new()
        .add_node(kind("only"), NoopNode)
        .with_conditional_entry(decision, [("mapped", kind("only"))])
        .add_edge(kind("only"), NodeKind::End)
        .compile()
        .expect("valid graph");
    let runner = TurnRunner::new(app, FakeWorld::scripted(vec![]).resources());

    let err = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "hi"))
        .await
        .expect_err("unmapped entry key is fatal");
    assert!(matches!(
        err,
        RunnerError::Routing { node: NodeKind::Start, key } if key == "surprise"
    ));
    assert!(matches!(
        runner.state("thread-1").await,
        Err(RunnerError::ThreadNotFound { .. })
    ));
}

#[tokio::test]
async fn conditional_edges_win_over_unconditional_ones() {
    let decision: DecisionFn = Arc::new(|_| "always".into());
    let app = GraphBuilder::new()
        .add_node(kind("junction"), NoopNode)
        .add_node(kind("winner"), SayNode { msg: "conditional path" })
        .add_node(kind("loser"), SayNode { msg: "unconditional path" })
        .add_edge(NodeKind::Start, kind("junction"))
        .add_edge(kind("junction"), kind("loser"))
        .add_conditional_edge(kind("junction"), decision, [("always", kind("winner"))])
        .add_edge(kind("winner"), NodeKind::End)
        .add_edge(kind("loser"), NodeKind::End)
        .compile()
        .expect("valid graph");
    let runner = TurnRunner::new(app, FakeWorld::scripted(vec![]).resources());

    let report = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "go"))
        .await
        .expect("turn completes");
    assert_eq!(report.ran_nodes, vec![kind("junction"), kind("winner")]);
    assert_eq!(
        report.snapshot.last_assistant().map(|m| m.content.as_str()),
        Some("conditional path")
    );
}

#[tokio::test]
async fn decision_key_may_route_straight_to_end() {
    let decision: DecisionFn = Arc::new(|snapshot| {
        if snapshot.flag("learning_complete") {
            "done".into()
        } else {
            "more".into()
        }
    });
    let app = GraphBuilder::new()
        .add_node(
            kind("evaluate"),
            WriteField {
                field: "learning_complete",
                value: json!(true),
            },
        )
        .add_node(kind("another_round"), SayNode { msg: "keep going" })
        .add_edge(NodeKind::Start, kind("evaluate"))
        .add_conditional_edge(
            kind("evaluate"),
            decision,
            [("done", NodeKind::End), ("more", kind("another_round"))],
        )
        .add_edge(kind("another_round"), NodeKind::End)
        .compile()
        .expect("valid graph");
    let runner = TurnRunner::new(app, FakeWorld::scripted(vec![]).resources());

    let report = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "I explained it"))
        .await
        .expect("turn completes");
    assert!(report.succeeded());
    assert_eq!(report.ran_nodes, vec![kind("evaluate")]);
}
