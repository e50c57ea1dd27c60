//! Concurrency guarantees: turns on one thread serialize, turns on
//! different threads run independently.

mod common;
use common::*;

use tutorgraph::message::Message;
use tutorgraph::runtimes::{TurnRequest, TurnRunner};

#[tokio::test]
async fn concurrent_turns_on_one_thread_serialize() {
    let runner = TurnRunner::new(say_app("noted"), FakeWorld::scripted(vec![]).resources());

    let mut first = runner.run(TurnRequest::new("thread-1", "user-1", "one"));
    let mut second = runner.run(TurnRequest::new("thread-1", "user-1", "two"));
    drop(first.events());
    drop(second.events());

    let first = first.join().await.expect("first turn");
    let second = second.join().await.expect("second turn");

    // Lock order is unspecified, but both turns ran whole: the later one
    // saw the earlier one's checkpoint.
    let mut steps = [first.step, second.step];
    steps.sort_unstable();
    assert_eq!(steps, [1, 2]);

    let persisted = runner.state("thread-1").await.expect("checkpoint");
    assert_eq!(persisted.messages.len(), 4);
    let humans: Vec<&str> = persisted
        .messages
        .iter()
        .filter(|m| m.has_role(Message::HUMAN))
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(humans.len(), 2);
    assert!(humans.contains(&"one"));
    assert!(humans.contains(&"two"));
}

#[tokio::test]
async fn turns_on_distinct_threads_run_independently() {
    let runner = TurnRunner::new(say_app("hello"), FakeWorld::scripted(vec![]).resources());

    let handles: Vec<_> = ["alpha", "beta", "gamma"]
        .into_iter()
        .map(|thread| {
            let mut handle = runner.run(TurnRequest::new(thread, "user-1", "hi"));
            drop(handle.events());
            handle
        })
        .collect();

    for handle in handles {
        let report = handle.join().await.expect("turn completes");
        // Each thread has its own step counter.
        assert_eq!(report.step, 1);
        assert_eq!(report.snapshot.messages.len(), 2);
    }

    assert_eq!(
        runner.threads().await.expect("listing"),
        vec!["alpha", "beta", "gamma"]
    );
}
