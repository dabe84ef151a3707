//! Storage layer for the balance ledger.
//!
//! This crate provides the key-value store the ledger runs against: point
//! reads, conditional single-item updates and all-or-nothing multi-item
//! writes over two tables.
//!
//! # Architecture
//!
//! - `UserBalances`: one balance row per user, keyed by `user_id`
//! - `TransactionHistory`: accepted transactions, keyed by idempotency key
//! - `TransactionsByUser`: index for listing a user's history
//!
//! Two backends implement [`Store`]: [`MemoryStore`], and `RocksStore`
//! behind the `rocksdb-backend` feature.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{BalanceItem, UserId};
//! use ledger_store::{MemoryStore, Store};
//!
//! # async fn demo() -> ledger_store::Result<()> {
//! let store = MemoryStore::new();
//! let user_id = UserId::new("1").unwrap();
//!
//! store.put_balance_item(&BalanceItem::new(user_id.clone(), 50)).await?;
//! let item = store.get_balance_item(&user_id).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;
pub mod write;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;
pub use write::{BalanceUpdate, Condition, WriteOp};

use async_trait::async_trait;
use ledger_core::{BalanceItem, IdempotencyKey, TransactionRecord, UserId};

/// The storage trait defining all database operations.
///
/// Implementations must make `transact_write` all-or-nothing: either every
/// condition holds and every op is applied, or nothing changes.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Point Reads
    // =========================================================================

    /// Get a user's balance row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_balance_item(&self, user_id: &UserId) -> Result<Option<BalanceItem>>;

    /// Get a history record by idempotency key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_transaction(&self, key: &IdempotencyKey) -> Result<Option<TransactionRecord>>;

    /// List a user's history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>>;

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply several writes atomically.
    ///
    /// # Errors
    ///
    /// - `StoreError::ConditionalCheckFailed` naming the first op whose
    ///   condition failed; nothing is written.
    /// - `StoreError::InvalidRequest` if `ops` is empty or touches an item twice.
    async fn transact_write(&self, ops: &[WriteOp]) -> Result<()>;

    /// Conditionally update one balance row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionalCheckFailed` if the condition does not hold.
    async fn update_balance(&self, update: &BalanceUpdate) -> Result<()> {
        self.transact_write(&[WriteOp::UpdateBalance(update.clone())])
            .await
    }

    /// Unconditionally write a balance row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_balance_item(&self, item: &BalanceItem) -> Result<()> {
        self.transact_write(&[WriteOp::PutBalance {
            item: item.clone(),
            condition: Condition::Always,
        }])
        .await
    }
}
