mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use paygate_core::adapters::InMemoryDeadLetters;
use paygate_core::domain::{StatusUpdate, TransactionStatus};
use paygate_core::error::ProcessingError;
use paygate_core::ports::StreamError;
use paygate_core::services::BreakerConfig;

fn journal(h: &Harness) -> Vec<String> {
    h.journal.lock().unwrap().clone()
}

#[tokio::test]
async fn test_full_batch_is_one_bulk_update_then_one_commit() {
    let h = harness(BreakerConfig::default(), 3);
    for id in 1..=3 {
        h.transactions.inner.put(transaction(id, TransactionStatus::Pending));
    }
    h.consumer.push(event_message(10, 1, TransactionStatus::Success));
    h.consumer.push(event_message(11, 2, TransactionStatus::Failed));
    h.consumer.push(event_message(12, 3, TransactionStatus::Success));

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert_eq!(journal(&h), vec!["bulk:3", "commit:3"]);
    assert_eq!(h.consumer.committed_offsets(), vec![vec![10, 11, 12]]);
    assert_eq!(h.transactions.inner.snapshot(1).unwrap().status, TransactionStatus::Success);
    assert_eq!(h.transactions.inner.snapshot(2).unwrap().status, TransactionStatus::Failed);
    assert_eq!(h.transactions.inner.snapshot(3).unwrap().status, TransactionStatus::Success);
}

#[tokio::test]
async fn test_batch_size_two_with_three_messages_leaves_last_uncommitted() {
    let h = harness(BreakerConfig::default(), 2);
    for id in 1..=3 {
        h.transactions.inner.put(transaction(id, TransactionStatus::Pending));
    }
    h.consumer.push(event_message(0, 1, TransactionStatus::Success));
    h.consumer.push(event_message(1, 2, TransactionStatus::Success));
    h.consumer.push(event_message(2, 3, TransactionStatus::Success));

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert_eq!(journal(&h), vec!["bulk:2", "commit:2"]);
    assert_eq!(h.consumer.committed_offsets(), vec![vec![0, 1]]);
    // Third message waits for a batch that never fills; it will be redelivered.
    assert_eq!(h.transactions.inner.snapshot(3).unwrap().status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_consecutive_batches_commit_in_order() {
    let h = harness(BreakerConfig::default(), 2);
    for id in 1..=4 {
        h.transactions.inner.put(transaction(id, TransactionStatus::Pending));
    }
    for (offset, id) in (0..4).zip(1..=4) {
        h.consumer.push(event_message(offset, id, TransactionStatus::Success));
    }

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert_eq!(journal(&h), vec!["bulk:2", "commit:2", "bulk:2", "commit:2"]);
    assert_eq!(h.consumer.committed_offsets(), vec![vec![0, 1], vec![2, 3]]);
}

#[tokio::test]
async fn test_duplicate_ids_keep_the_last_status() {
    let h = harness(BreakerConfig::default(), 2);
    h.transactions.inner.put(transaction(5, TransactionStatus::Pending));
    h.consumer.push(event_message(0, 5, TransactionStatus::Failed));
    h.consumer.push(event_message(1, 5, TransactionStatus::Success));

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    let bulk = h.transactions.bulk_calls.lock().unwrap().clone();
    assert_eq!(bulk, vec![vec![StatusUpdate { id: 5, status: TransactionStatus::Success }]]);
    assert_eq!(h.consumer.committed_offsets(), vec![vec![0, 1]]);
}

#[tokio::test]
async fn test_read_errors_and_idle_reads_are_skipped() {
    let h = harness(BreakerConfig::default(), 1);
    h.transactions.inner.put(transaction(1, TransactionStatus::Pending));
    h.consumer.push_result(Err(StreamError::Transport("rebalance".to_string())));
    h.consumer.push_result(Ok(None));
    h.consumer.push(event_message(3, 1, TransactionStatus::Success));

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert_eq!(h.consumer.committed_offsets(), vec![vec![3]]);
    assert_eq!(h.transactions.inner.snapshot(1).unwrap().status, TransactionStatus::Success);
}

#[tokio::test]
async fn test_cancelled_before_start_reads_nothing() {
    let h = harness(BreakerConfig::default(), 1);
    h.consumer.push(event_message(0, 1, TransactionStatus::Success));
    h.shutdown.cancel();

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert!(journal(&h).is_empty());
    assert_eq!(h.consumer.queue.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_message_aborts_batch_without_dead_letters() {
    let h = harness(BreakerConfig::default(), 2);
    h.transactions.inner.put(transaction(1, TransactionStatus::Pending));
    h.consumer.push(event_message(0, 1, TransactionStatus::Success));
    h.consumer.push(raw_message(1, b"{not json"));

    let err = h.orchestrator.consume(h.shutdown.clone()).await.unwrap_err();

    assert!(matches!(err, ProcessingError::Decode { offset: 1, .. }));
    assert!(journal(&h).is_empty(), "nothing applied or committed");
    assert_eq!(h.transactions.inner.snapshot(1).unwrap().status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_malformed_message_goes_to_dead_letters_and_is_committed() {
    let mut h = harness(BreakerConfig::default(), 2);
    let dead_letters = Arc::new(InMemoryDeadLetters::new());
    h.orchestrator = h.orchestrator.with_dead_letters(dead_letters.clone());

    h.transactions.inner.put(transaction(1, TransactionStatus::Pending));
    h.consumer.push(event_message(0, 1, TransactionStatus::Success));
    h.consumer.push(raw_message(1, b"{not json"));

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert_eq!(journal(&h), vec!["bulk:1", "commit:2"]);
    assert_eq!(h.consumer.committed_offsets(), vec![vec![0, 1]]);

    let entries = dead_letters.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0.offset, 1);
    assert!(!entries[0].1.is_empty());
}

#[tokio::test]
async fn test_batch_of_only_malformed_messages_skips_bulk_update() {
    let mut h = harness(BreakerConfig::default(), 1);
    h.orchestrator = h
        .orchestrator
        .with_dead_letters(Arc::new(InMemoryDeadLetters::new()));
    h.consumer.push(raw_message(0, b"garbage"));

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert_eq!(journal(&h), vec!["commit:1"]);
}

#[tokio::test]
async fn test_bulk_update_failure_stops_the_loop_uncommitted() {
    let h = harness(BreakerConfig::default(), 1);
    h.transactions.fail_bulk.store(true, Ordering::SeqCst);
    h.consumer.push(event_message(0, 1, TransactionStatus::Success));
    h.consumer.push(event_message(1, 2, TransactionStatus::Success));

    let err = h.orchestrator.consume(h.shutdown.clone()).await.unwrap_err();

    assert!(matches!(err, ProcessingError::BulkUpdate(_)));
    assert_eq!(journal(&h), vec!["bulk:1"]);
    assert!(h.consumer.committed_offsets().is_empty());
    // Loop stopped before reading the second message.
    assert_eq!(h.consumer.queue.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_id_in_batch_fails_all_or_nothing() {
    let h = harness(BreakerConfig::default(), 2);
    h.transactions.inner.put(transaction(1, TransactionStatus::Pending));
    h.consumer.push(event_message(0, 1, TransactionStatus::Success));
    h.consumer.push(event_message(1, 99, TransactionStatus::Success));

    let err = h.orchestrator.consume(h.shutdown.clone()).await.unwrap_err();

    assert!(matches!(err, ProcessingError::BulkUpdate(_)));
    assert_eq!(h.transactions.inner.snapshot(1).unwrap().status, TransactionStatus::Pending);
    assert!(h.consumer.committed_offsets().is_empty());
}

#[tokio::test]
async fn test_commit_failure_keeps_applied_batch_and_continues() {
    let h = harness(BreakerConfig::default(), 1);
    h.transactions.inner.put(transaction(1, TransactionStatus::Pending));
    h.transactions.inner.put(transaction(2, TransactionStatus::Pending));
    h.consumer.fail_next_commits(1);
    h.consumer.push(event_message(0, 1, TransactionStatus::Success));
    h.consumer.push(event_message(1, 2, TransactionStatus::Failed));

    h.orchestrator.consume(h.shutdown.clone()).await.unwrap();

    assert_eq!(journal(&h), vec!["bulk:1", "commit:1", "bulk:1", "commit:1"]);
    // First commit was rejected; only the second batch is acknowledged.
    assert_eq!(h.consumer.committed_offsets(), vec![vec![1]]);
    assert_eq!(h.transactions.inner.snapshot(1).unwrap().status, TransactionStatus::Success);
    assert_eq!(h.transactions.inner.snapshot(2).unwrap().status, TransactionStatus::Failed);
}
