//! In-memory storage implementation.
//!
//! Holds typed values behind a single lock. Used by tests and by hosts that
//! do not need durability.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ledger_core::{BalanceItem, IdempotencyKey, TransactionId, TransactionRecord, UserId};

use crate::error::{Result, StoreError};
use crate::write::{self, WriteOp};
use crate::Store;

#[derive(Debug, Default)]
struct Tables {
    balances: HashMap<UserId, BalanceItem>,
    history: HashMap<IdempotencyKey, TransactionRecord>,
    by_user: BTreeMap<(UserId, TransactionId), IdempotencyKey>,
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_balance_item(&self, user_id: &UserId) -> Result<Option<BalanceItem>> {
        Ok(self.lock()?.balances.get(user_id).cloned())
    }

    async fn get_transaction(&self, key: &IdempotencyKey) -> Result<Option<TransactionRecord>> {
        Ok(self.lock()?.history.get(key).cloned())
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let tables = self.lock()?;

        let transactions = tables
            .by_user
            .iter()
            .filter(|((owner, _), _)| owner == user_id)
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|(_, key)| tables.history.get(key).cloned())
            .collect();

        Ok(transactions)
    }

    async fn transact_write(&self, ops: &[WriteOp]) -> Result<()> {
        write::validate(ops)?;

        let mut tables = self.lock()?;

        // Check every condition before touching anything
        for (index, op) in ops.iter().enumerate() {
            let current = match op {
                WriteOp::UpdateBalance(update) => tables
                    .balances
                    .get(&update.user_id)
                    .map(BalanceItem::current_version),
                WriteOp::PutBalance { item, .. } => tables
                    .balances
                    .get(&item.user_id)
                    .map(BalanceItem::current_version),
                WriteOp::PutTransaction { record, .. } => tables
                    .history
                    .get(&record.idempotency_key)
                    .map(|_| 0),
            };
            write::check(op, index, current)?;
        }

        for op in ops {
            match op {
                WriteOp::UpdateBalance(update) => {
                    let current = tables.balances.remove(&update.user_id);
                    tables
                        .balances
                        .insert(update.user_id.clone(), update.apply_to(current));
                }
                WriteOp::PutBalance { item, .. } => {
                    tables.balances.insert(item.user_id.clone(), item.clone());
                }
                WriteOp::PutTransaction { record, .. } => {
                    tables.by_user.insert(
                        (record.user_id.clone(), record.transaction_id),
                        record.idempotency_key.clone(),
                    );
                    tables
                        .history
                        .insert(record.idempotency_key.clone(), record.clone());
                }
            }
        }

        Ok(())
    }
}
