//! Transaction processing integration tests.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use common::{key, processor_over, user, RacingStore, TestHarness};
use futures::future::join_all;
use ledger_core::{
    Amount, AmountError, TransactRequest, TransactionId, TransactionRecord, TransactionType,
};
use ledger_engine::{
    DegradedModePolicy, IdGenerator, TransactOutcome, TransactionError,
};
use ledger_store::{Store, StoreError};

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn non_finite_amounts_are_rejected_without_store_access() {
    let harness = TestHarness::new();

    for amount in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = harness
            .processor
            .transact(&TransactRequest::credit(key("1"), user("1"), amount))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransactionError::InvalidAmount(AmountError::NotANumber)
        ));
        assert_eq!(err.to_string(), "Amount must be a valid number.");
    }

    assert_eq!(harness.store.history_reads(), 0);
    assert_eq!(harness.store.balance_reads(), 0);
    assert_eq!(harness.store.writes(), 0);
}

#[tokio::test]
async fn non_positive_amounts_are_rejected_without_store_access() {
    let harness = TestHarness::new();

    for amount in [0.0, -0.0, -1.0, -250.0] {
        let err = harness
            .processor
            .transact(&TransactRequest::debit(key("1"), user("1"), amount))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Amount must be greater than zero.");
    }

    assert_eq!(harness.store.history_reads(), 0);
    assert_eq!(harness.store.writes(), 0);
}

#[tokio::test]
async fn fractional_amounts_are_rejected() {
    let harness = TestHarness::new();

    let err = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.5))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TransactionError::InvalidAmount(AmountError::NotWhole)
    ));
    assert_eq!(harness.store.writes(), 0);
}

// ============================================================================
// Idempotency
// ============================================================================

#[tokio::test]
async fn recorded_key_returns_already_processed_without_reading_balance() {
    let harness = TestHarness::new();
    harness
        .store
        .seed_record(TransactionRecord::new(
            key("1"),
            user("1"),
            Amount::try_from(10).unwrap(),
            TransactionType::Credit,
            TransactionId::generate(),
            Utc::now(),
        ))
        .await;

    let outcome = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.0))
        .await
        .unwrap();

    assert_eq!(outcome, TransactOutcome::AlreadyProcessed);
    assert_eq!(outcome.to_string(), "Transaction already processed");
    assert_eq!(harness.store.balance_reads(), 0);
    assert_eq!(harness.store.writes(), 0);
}

#[tokio::test]
async fn replay_ignores_amount_and_type() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;

    harness
        .processor
        .transact(&TransactRequest::credit(key("k"), user("1"), 10.0))
        .await
        .unwrap();

    let replay = harness
        .processor
        .transact(&TransactRequest::debit(key("k"), user("1"), 40.0))
        .await
        .unwrap();

    assert_eq!(replay, TransactOutcome::AlreadyProcessed);
    assert_eq!(harness.store.stored_balance(&user("1")).await, Some(60));
}

#[tokio::test]
async fn same_request_twice_commits_once() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;
    let request = TransactRequest::credit(key("retry"), user("1"), 25.0);

    let first = harness.processor.transact(&request).await.unwrap();
    let second = harness.processor.transact(&request).await.unwrap();

    assert!(first.is_committed());
    assert_eq!(second, TransactOutcome::AlreadyProcessed);
    assert_eq!(harness.store.writes(), 1);
    assert_eq!(harness.store.stored_balance(&user("1")).await, Some(75));

    let history = harness.processor.history(&user("1"), 10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].idempotency_key, key("retry"));
}

// ============================================================================
// Balance computation and commit
// ============================================================================

#[tokio::test]
async fn credit_adds_to_stored_balance() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;

    let outcome = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.0))
        .await
        .unwrap();

    assert_eq!(
        outcome.to_string(),
        "Transaction processed successfully. New balance: 60"
    );
    assert_eq!(
        harness.processor.reader().get_balance(&user("1")).await.unwrap(),
        60
    );
}

#[tokio::test]
async fn debit_subtracts_and_records_history() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;

    let outcome = harness
        .processor
        .transact(&TransactRequest::debit(key("d"), user("1"), 50.0))
        .await
        .unwrap();

    let TransactOutcome::Committed {
        new_balance,
        transaction_id,
    } = outcome
    else {
        panic!("expected a commit, got {outcome:?}");
    };
    assert_eq!(new_balance, 0);

    let record = harness.processor.lookup(&key("d")).await.unwrap().unwrap();
    assert_eq!(record.transaction_id, transaction_id);
    assert_eq!(record.user_id, user("1"));
    assert_eq!(record.amount.get(), 50);
    assert_eq!(record.transaction_type, TransactionType::Debit);
}

#[tokio::test]
async fn overdraft_is_rejected_without_writes() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;

    let err = harness
        .processor
        .transact(&TransactRequest::debit(key("1"), user("1"), 51.0))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TransactionError::InsufficientBalance {
            balance: 50,
            required: 51
        }
    ));
    assert_eq!(err.to_string(), "Insufficient balance.");
    assert_eq!(harness.store.writes(), 0);
    assert_eq!(harness.store.stored_balance(&user("1")).await, Some(50));
}

#[tokio::test]
async fn unknown_user_commit_is_rejected() {
    let harness = TestHarness::new();

    // Reads as the default balance, but the user row does not exist
    let err = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("ghost"), 10.0))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(!err.is_duplicate_key());
    assert!(err.to_string().starts_with("Transaction failed: "));
    assert!(harness.processor.lookup(&key("1")).await.unwrap().is_none());
}

#[tokio::test]
async fn opened_account_starts_at_default_balance() {
    let harness = TestHarness::new();
    harness.processor.open_account(&user("new")).await.unwrap();

    let outcome = harness
        .processor
        .transact(&TransactRequest::debit(key("1"), user("new"), 30.0))
        .await
        .unwrap();

    assert_eq!(
        outcome.to_string(),
        "Transaction processed successfully. New balance: 70"
    );
}

#[tokio::test]
async fn unparseable_balance_is_overwritten_from_default() {
    let harness = TestHarness::new();
    harness
        .store
        .seed_item(ledger_core::BalanceItem {
            user_id: user("1"),
            balance: Some("corrupt".into()),
            version: Some(2),
        })
        .await;

    let outcome = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 5.0))
        .await
        .unwrap();

    assert_eq!(
        outcome.to_string(),
        "Transaction processed successfully. New balance: 105"
    );
    assert_eq!(harness.store.stored_balance(&user("1")).await, Some(105));
}

#[tokio::test]
async fn store_failure_during_commit_is_wrapped() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;
    harness.store.fail_writes.store(true, Ordering::SeqCst);

    let err = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.0))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Transaction failed: database error: simulated outage"
    );
    assert!(!err.is_conflict());
    assert_eq!(harness.store.stored_balance(&user("1")).await, Some(50));
}

// ============================================================================
// Degraded mode
// ============================================================================

#[tokio::test]
async fn fail_open_treats_history_error_as_not_processed() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;
    harness.store.fail_history_reads.store(true, Ordering::SeqCst);

    let outcome = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.0))
        .await
        .unwrap();

    assert!(outcome.is_committed());
}

#[tokio::test]
async fn fail_open_replay_during_history_outage_is_caught_at_commit() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;
    let request = TransactRequest::credit(key("1"), user("1"), 10.0);
    harness.processor.transact(&request).await.unwrap();

    harness.store.fail_history_reads.store(true, Ordering::SeqCst);
    let err = harness.processor.transact(&request).await.unwrap_err();

    assert!(err.is_duplicate_key());
    assert_eq!(harness.store.stored_balance(&user("1")).await, Some(60));
}

#[tokio::test]
async fn fail_open_balance_error_reads_default() {
    let harness = TestHarness::new();
    harness.store.fail_balance_reads.store(true, Ordering::SeqCst);

    let balance = harness
        .processor
        .reader()
        .get_balance(&user("1"))
        .await
        .unwrap();

    assert_eq!(balance, 100);
}

#[tokio::test]
async fn fail_closed_surfaces_read_errors() {
    let harness = TestHarness::with_policy(DegradedModePolicy::FailClosed);
    harness.store.seed_balance(&user("1"), 50).await;

    harness.store.fail_history_reads.store(true, Ordering::SeqCst);
    let err = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, TransactionError::StoreUnavailable { .. }));

    harness.store.fail_history_reads.store(false, Ordering::SeqCst);
    harness.store.fail_balance_reads.store(true, Ordering::SeqCst);
    let err = harness
        .processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, TransactionError::StoreUnavailable { .. }));

    assert_eq!(harness.store.writes(), 0);
}

// ============================================================================
// Optimistic update
// ============================================================================

#[tokio::test]
async fn optimistic_update_checks_version() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;

    let updated = harness
        .processor
        .update_balance_optimistic(&user("1"), 80, 0)
        .await
        .unwrap();
    assert_eq!(updated.balance, 80);
    assert_eq!(updated.version, 1);

    let stale = harness
        .processor
        .update_balance_optimistic(&user("1"), 90, 0)
        .await
        .unwrap_err();
    assert!(stale.is_conflict());
    assert_eq!(harness.store.stored_balance(&user("1")).await, Some(80));
    assert!(harness.processor.history(&user("1"), 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn optimistic_update_invalidates_pending_transact_snapshot() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;

    let snapshot = harness.processor.reader().read(&user("1")).await.unwrap();
    harness
        .processor
        .update_balance_optimistic(&user("1"), 10, snapshot.version.unwrap())
        .await
        .unwrap();

    let err = harness
        .processor
        .update_balance_optimistic(&user("1"), 20, snapshot.version.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::TransactionFailed {
            source: StoreError::ConditionalCheckFailed { index: 0, .. }
        }
    ));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn concurrent_requests_with_same_key_apply_once() {
    const CALLS: usize = 8;
    let store = Arc::new(RacingStore::new(CALLS));
    store.seed_balance(&user("1"), 50).await;
    let processor = processor_over(&store);
    let request = TransactRequest::credit(key("race"), user("1"), 10.0);

    // Every call passes the idempotency check and reads version 0 before
    // any of them commits.
    let results = join_all((0..CALLS).map(|_| processor.transact(&request))).await;

    let committed = results
        .iter()
        .filter(|r| matches!(r, Ok(outcome) if outcome.is_committed()))
        .count();
    assert_eq!(committed, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(err.is_duplicate_key(), "unexpected error: {err}");
    }
    assert_eq!(
        results.iter().filter(|r| r.is_err()).count(),
        CALLS - 1
    );
    assert_eq!(store.stored_balance(&user("1")).await, Some(60));
}

#[tokio::test]
async fn concurrent_requests_for_same_user_never_lose_updates() {
    const CALLS: usize = 10;
    let store = Arc::new(RacingStore::new(CALLS));
    store.seed_balance(&user("1"), 100).await;
    let processor = processor_over(&store);

    let requests: Vec<_> = (0..CALLS)
        .map(|i| TransactRequest::credit(key(&format!("k{i}")), user("1"), 1.0))
        .collect();
    let results = join_all(requests.iter().map(|r| processor.transact(r))).await;

    // All calls read version 0, so only the first commit can apply
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(err.is_conflict(), "unexpected error: {err}");
        assert!(!err.is_duplicate_key(), "unexpected error: {err}");
    }
    assert_eq!(store.stored_balance(&user("1")).await, Some(101));
    assert_eq!(processor.history(&user("1"), 100, 0).await.unwrap().len(), 1);
}

// ============================================================================
// ID generation
// ============================================================================

struct FixedIds(TransactionId);

impl IdGenerator for FixedIds {
    fn new_id(&self) -> TransactionId {
        self.0
    }
}

#[tokio::test]
async fn injected_id_generator_is_used() {
    let harness = TestHarness::new();
    harness.store.seed_balance(&user("1"), 50).await;
    let fixed = TransactionId::generate();
    let processor = ledger_engine::TransactionProcessor::new(
        Arc::clone(&harness.store),
        &ledger_engine::LedgerConfig::default(),
    )
    .with_id_generator(Arc::new(FixedIds(fixed)));

    processor
        .transact(&TransactRequest::credit(key("1"), user("1"), 10.0))
        .await
        .unwrap();

    let record = harness.store.get_transaction(&key("1")).await.unwrap().unwrap();
    assert_eq!(record.transaction_id, fixed);
}
