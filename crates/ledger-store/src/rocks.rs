//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Conditional writes are serialized behind a write lock: conditions are read
//! and checked under the lock and the resulting `WriteBatch` is committed
//! before it is released.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use ledger_core::{BalanceItem, IdempotencyKey, TransactionRecord, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_tables, table};
use crate::write::{self, WriteOp};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_tables()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read<T: serde::de::DeserializeOwned>(&self, table: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(table)?;

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn exists(&self, table: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(table)?;

        let exists = self
            .db
            .get_pinned_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        Ok(exists)
    }

    fn read_balance(&self, user_id: &UserId) -> Result<Option<BalanceItem>> {
        self.read(table::USER_BALANCES, &keys::balance_key(user_id))
    }

    fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let cf_by_user = self.cf(table::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);

        // Collect all matching index entries first (ULIDs sort by time)
        let mut history_keys: Vec<Vec<u8>> = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            history_keys.push(value.to_vec());
        }

        let mut transactions = Vec::new();
        for key in history_keys.iter().rev().skip(offset).take(limit) {
            if let Some(tx) = self.read(table::TRANSACTION_HISTORY, key)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn write_all(&self, ops: &[WriteOp]) -> Result<()> {
        write::validate(ops)?;

        let cf_balances = self.cf(table::USER_BALANCES)?;
        let cf_history = self.cf(table::TRANSACTION_HISTORY)?;
        let cf_by_user = self.cf(table::TRANSACTIONS_BY_USER)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))?;

        let mut batch = WriteBatch::default();
        for (index, op) in ops.iter().enumerate() {
            match op {
                WriteOp::UpdateBalance(update) => {
                    let current = self.read_balance(&update.user_id)?;
                    write::check(op, index, current.as_ref().map(BalanceItem::current_version))?;

                    let value = Self::serialize(&update.apply_to(current))?;
                    batch.put_cf(&cf_balances, keys::balance_key(&update.user_id), value);
                }
                WriteOp::PutBalance { item, .. } => {
                    let current = self.read_balance(&item.user_id)?;
                    write::check(op, index, current.as_ref().map(BalanceItem::current_version))?;

                    let value = Self::serialize(item)?;
                    batch.put_cf(&cf_balances, keys::balance_key(&item.user_id), value);
                }
                WriteOp::PutTransaction { record, .. } => {
                    let history_key = keys::history_key(&record.idempotency_key);
                    let current = self
                        .exists(table::TRANSACTION_HISTORY, &history_key)?
                        .then_some(0);
                    write::check(op, index, current)?;

                    let value = Self::serialize(record)?;
                    let index_key =
                        keys::user_transaction_key(&record.user_id, &record.transaction_id);
                    batch.put_cf(&cf_history, &history_key, value);
                    batch.put_cf(&cf_by_user, index_key, &history_key);
                }
            }
        }

        // Write atomically
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Store for RocksStore {
    async fn get_balance_item(&self, user_id: &UserId) -> Result<Option<BalanceItem>> {
        self.read_balance(user_id)
    }

    async fn get_transaction(&self, key: &IdempotencyKey) -> Result<Option<TransactionRecord>> {
        self.read(table::TRANSACTION_HISTORY, &keys::history_key(key))
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        self.list_by_user(user_id, limit, offset)
    }

    async fn transact_write(&self, ops: &[WriteOp]) -> Result<()> {
        self.write_all(ops)
    }
}
