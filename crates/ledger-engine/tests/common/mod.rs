//! Common test utilities for ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ledger_core::{BalanceItem, IdempotencyKey, TransactionRecord, UserId};
use ledger_engine::{DegradedModePolicy, LedgerConfig, TransactionProcessor};
use ledger_store::{MemoryStore, Result, Store, StoreError, WriteOp};
use tokio::sync::Barrier;

/// Store wrapper that counts calls and can fail on demand.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    pub fail_balance_reads: AtomicBool,
    pub fail_history_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub balance_reads: AtomicUsize,
    pub history_reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn balance_reads(&self) -> usize {
        self.balance_reads.load(Ordering::SeqCst)
    }

    pub fn history_reads(&self) -> usize {
        self.history_reads.load(Ordering::SeqCst)
    }

    /// Seed a balance row without counting it as a write.
    pub async fn seed_balance(&self, user_id: &UserId, balance: i64) {
        self.inner
            .put_balance_item(&BalanceItem::new(user_id.clone(), balance))
            .await
            .expect("seed balance");
    }

    /// Seed a raw balance row without counting it as a write.
    pub async fn seed_item(&self, item: BalanceItem) {
        self.inner.put_balance_item(&item).await.expect("seed item");
    }

    /// Seed a history record without counting it as a write.
    pub async fn seed_record(&self, record: TransactionRecord) {
        self.inner
            .transact_write(&[WriteOp::PutTransaction {
                record,
                condition: ledger_store::Condition::NotExists,
            }])
            .await
            .expect("seed record");
    }

    pub async fn stored_balance(&self, user_id: &UserId) -> Option<i64> {
        self.inner
            .get_balance_item(user_id)
            .await
            .expect("read balance")
            .and_then(|item| item.parsed_balance())
    }

    fn outage() -> StoreError {
        StoreError::Database("simulated outage".into())
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn get_balance_item(&self, user_id: &UserId) -> Result<Option<BalanceItem>> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance_reads.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.get_balance_item(user_id).await
    }

    async fn get_transaction(&self, key: &IdempotencyKey) -> Result<Option<TransactionRecord>> {
        self.history_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_history_reads.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.get_transaction(key).await
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        self.inner
            .list_transactions_by_user(user_id, limit, offset)
            .await
    }

    async fn transact_write(&self, ops: &[WriteOp]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.transact_write(ops).await
    }
}

/// Store wrapper that holds every balance read at a barrier.
///
/// With `parties` concurrent `transact` calls, all of them read the balance
/// before any of them commits.
pub struct RacingStore {
    inner: MemoryStore,
    barrier: Barrier,
}

impl RacingStore {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            barrier: Barrier::new(parties),
        }
    }

    pub async fn seed_balance(&self, user_id: &UserId, balance: i64) {
        self.inner
            .put_balance_item(&BalanceItem::new(user_id.clone(), balance))
            .await
            .expect("seed balance");
    }

    pub async fn stored_balance(&self, user_id: &UserId) -> Option<i64> {
        self.inner
            .get_balance_item(user_id)
            .await
            .expect("read balance")
            .and_then(|item| item.parsed_balance())
    }
}

#[async_trait]
impl Store for RacingStore {
    async fn get_balance_item(&self, user_id: &UserId) -> Result<Option<BalanceItem>> {
        let item = self.inner.get_balance_item(user_id).await;
        self.barrier.wait().await;
        item
    }

    async fn get_transaction(&self, key: &IdempotencyKey) -> Result<Option<TransactionRecord>> {
        self.inner.get_transaction(key).await
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        self.inner
            .list_transactions_by_user(user_id, limit, offset)
            .await
    }

    async fn transact_write(&self, ops: &[WriteOp]) -> Result<()> {
        self.inner.transact_write(ops).await
    }
}

/// Build a processor over a store with default configuration.
pub fn processor_over<S: Store>(store: &Arc<S>) -> TransactionProcessor<S> {
    TransactionProcessor::new(Arc::clone(store), &LedgerConfig::default())
}

/// Test harness holding a processor and its store.
pub struct TestHarness {
    pub store: Arc<FaultyStore>,
    pub processor: TransactionProcessor<FaultyStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_policy(DegradedModePolicy::FailOpen)
    }

    pub fn with_policy(degraded_mode: DegradedModePolicy) -> Self {
        let store = Arc::new(FaultyStore::new());
        let config = LedgerConfig {
            degraded_mode,
            ..LedgerConfig::default()
        };
        let processor = TransactionProcessor::new(Arc::clone(&store), &config);
        Self { store, processor }
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).expect("valid user id")
}

pub fn key(value: &str) -> IdempotencyKey {
    IdempotencyKey::new(value).expect("valid key")
}
