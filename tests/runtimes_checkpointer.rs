//! Checkpoint persistence through whole turns: one save per turn, resume
//! equivalence, and thread listing via the runner.

mod common;
use common::*;

use std::sync::Arc;
use tutorgraph::runtimes::{
    Checkpointer, InMemoryCheckpointer, RunnerError, TurnRequest, TurnRunner,
};

#[tokio::test]
async fn turn_checkpoint_matches_the_reported_snapshot() {
    let runner = TurnRunner::new(
        say_app("Sure, recursion."),
        FakeWorld::scripted(vec![]).resources(),
    );

    let report = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "Explain recursion"))
        .await
        .expect("turn should complete");

    let persisted = runner.state("thread-1").await.expect("checkpoint exists");
    assert_eq!(persisted, report.snapshot);
    assert_eq!(persisted.messages.len(), 2);
    // Seed merge bumped the channel once, the node's reply once more.
    assert_eq!(persisted.messages_version, 2);
}

#[tokio::test]
async fn unknown_thread_has_no_state() {
    let runner = TurnRunner::new(say_app("hi"), FakeWorld::scripted(vec![]).resources());

    let err = runner.state("never-ran").await.expect_err("no checkpoint");
    assert!(matches!(
        err,
        RunnerError::ThreadNotFound { thread_id } if thread_id == "never-ran"
    ));
}

#[tokio::test]
async fn step_counter_accumulates_across_turns() {
    let runner = TurnRunner::new(say_app("And again."), FakeWorld::scripted(vec![]).resources());

    let first = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "One"))
        .await
        .expect("first turn");
    let second = runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "Two"))
        .await
        .expect("second turn");

    assert_eq!(first.step, 1);
    assert_eq!(second.step, 2);
    // Two human messages and two replies by now.
    assert_eq!(second.snapshot.messages.len(), 4);
}

#[tokio::test]
async fn threads_lists_every_conversation() {
    let runner = TurnRunner::new(say_app("noted"), FakeWorld::scripted(vec![]).resources());

    for thread in ["zeta", "alpha"] {
        runner
            .run_to_completion(TurnRequest::new(thread, "user-1", "hello"))
            .await
            .expect("turn should complete");
    }

    assert_eq!(
        runner.threads().await.expect("listing works"),
        vec!["alpha", "zeta"]
    );
}

#[tokio::test]
async fn a_resumed_thread_ends_up_where_a_continuous_one_does() {
    let resources = FakeWorld::scripted(vec![]).resources();

    // One runner drives the whole conversation.
    let continuous = TurnRunner::new(say_app("Echoed."), resources.clone());
    for prompt in ["One", "Two"] {
        continuous
            .run_to_completion(TurnRequest::new("lesson", "user-1", prompt))
            .await
            .expect("continuous turn");
    }

    // The same conversation again, restarting between the two turns.
    let store: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
    let before = TurnRunner::with_checkpointer(
        say_app("Echoed."),
        resources.clone(),
        Arc::clone(&store),
    );
    before
        .run_to_completion(TurnRequest::new("lesson", "user-1", "One"))
        .await
        .expect("turn before the restart");
    let after = TurnRunner::with_checkpointer(say_app("Echoed."), resources, store);
    after
        .run_to_completion(TurnRequest::new("lesson", "user-1", "Two"))
        .await
        .expect("turn after the restart");

    let continuous_state = continuous.state("lesson").await.expect("state");
    let resumed_state = after.state("lesson").await.expect("state");
    assert_eq!(resumed_state, continuous_state);
}

#[tokio::test]
async fn a_new_runner_over_the_same_store_resumes_the_thread() {
    let store: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
    let resources = FakeWorld::scripted(vec![]).resources();

    let first_runner = TurnRunner::with_checkpointer(
        say_app("From the first process."),
        resources.clone(),
        Arc::clone(&store),
    );
    let report = first_runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "Start here"))
        .await
        .expect("first turn");

    // Simulates a restart: a fresh runner, the same backend.
    let second_runner = TurnRunner::with_checkpointer(
        say_app("From the second process."),
        resources,
        store,
    );
    let restored = second_runner
        .state("thread-1")
        .await
        .expect("checkpoint survives the runner");
    assert_eq!(restored, report.snapshot);

    let resumed = second_runner
        .run_to_completion(TurnRequest::new("thread-1", "user-1", "Continue"))
        .await
        .expect("resumed turn");
    assert_eq!(resumed.step, 2);
    assert_eq!(resumed.snapshot.messages.len(), 4);
    assert_eq!(
        resumed
            .snapshot
            .last_assistant()
            .map(|m| m.content.as_str()),
        Some("From the second process.")
    );
}
