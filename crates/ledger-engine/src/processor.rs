//! Transaction processor.
//!
//! A `transact` call moves through these states, never re-entering one:
//!
//! ```text
//! Validating -> CheckingIdempotency -> ReadingBalance -> Committing
//!     |                 |                    |               |
//!  InvalidAmount  AlreadyProcessed   InsufficientBalance  Committed
//!                                                         TransactionFailed
//! ```
//!
//! The commit is one atomic write of two parts: the history insert and the
//! balance update. The history insert is conditioned on the idempotency key
//! being absent, and the balance update on the record version read in
//! `ReadingBalance` (which also requires the user row to exist). The history
//! insert goes first so that losing a race on the same key reports the
//! history table. No operation retries internally.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use ledger_core::{
    Amount, BalanceItem, IdempotencyKey, TransactRequest, TransactionId, TransactionRecord,
    UserBalance, UserId,
};
use ledger_store::{BalanceUpdate, Condition, Store, StoreError, WriteOp};

use crate::config::LedgerConfig;
use crate::error::{Result, TransactionError};
use crate::ids::{IdGenerator, UlidGenerator};
use crate::policy::DegradedModePolicy;
use crate::reader::{BalanceReader, BalanceSnapshot};

/// Successful result of a `transact` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactOutcome {
    /// The idempotency key was already recorded; nothing changed.
    AlreadyProcessed,

    /// The transaction was committed.
    Committed {
        /// Balance after the transaction.
        new_balance: i64,
        /// ID of the history record.
        transaction_id: TransactionId,
    },
}

impl TransactOutcome {
    /// Whether this call changed the balance.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

impl fmt::Display for TransactOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyProcessed => f.write_str("Transaction already processed"),
            Self::Committed { new_balance, .. } => write!(
                f,
                "Transaction processed successfully. New balance: {new_balance}"
            ),
        }
    }
}

/// Applies idempotent credits and debits to user balances.
pub struct TransactionProcessor<S> {
    store: Arc<S>,
    reader: BalanceReader<S>,
    ids: Arc<dyn IdGenerator>,
    policy: DegradedModePolicy,
    default_balance: i64,
}

impl<S: Store> TransactionProcessor<S> {
    /// Create a processor over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            reader: BalanceReader::new(Arc::clone(&store), config),
            store,
            ids: Arc::new(UlidGenerator::new()),
            policy: config.degraded_mode,
            default_balance: config.default_balance,
        }
    }

    /// Replace the transaction ID generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The balance reader this processor uses.
    #[must_use]
    pub fn reader(&self) -> &BalanceReader<S> {
        &self.reader
    }

    /// Apply a credit or debit exactly once per idempotency key.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the amount is not finite, not positive or not whole.
    /// - `InsufficientBalance` if a debit exceeds the balance.
    /// - `BalanceOverflow` if a credit would overflow.
    /// - `TransactionFailed` if the commit is rejected or the store fails.
    /// - `StoreUnavailable` if a read fails under `FailClosed`.
    pub async fn transact(&self, request: &TransactRequest) -> Result<TransactOutcome> {
        let result = self.run(request).await;

        if let Err(e) = &result {
            tracing::error!(
                idempotency_key = %request.idempotency_key,
                user_id = %request.user_id,
                error = %e,
                "Transaction failed"
            );
        }

        result
    }

    async fn run(&self, request: &TransactRequest) -> Result<TransactOutcome> {
        let amount = Amount::from_f64(request.amount)?;

        if self.check_idempotency(&request.idempotency_key).await? {
            tracing::debug!(idempotency_key = %request.idempotency_key, "Transaction already processed");
            return Ok(TransactOutcome::AlreadyProcessed);
        }

        let snapshot = self.reader.read(&request.user_id).await?;
        tracing::debug!(
            user_id = %request.user_id,
            balance = snapshot.balance,
            origin = ?snapshot.origin,
            "Retrieved balance"
        );

        let new_balance = Self::compute_new_balance(request, amount, &snapshot)?;

        let transaction_id = self.ids.new_id();
        let record = TransactionRecord::new(
            request.idempotency_key.clone(),
            request.user_id.clone(),
            amount,
            request.transaction_type,
            transaction_id,
            Utc::now(),
        );

        let balance_update = match snapshot.version {
            Some(version) => BalanceUpdate::versioned(request.user_id.clone(), new_balance, version),
            None => BalanceUpdate::if_exists(request.user_id.clone(), new_balance),
        };

        self.store
            .transact_write(&[
                WriteOp::PutTransaction {
                    record,
                    condition: Condition::NotExists,
                },
                WriteOp::UpdateBalance(balance_update),
            ])
            .await
            .map_err(|source| TransactionError::TransactionFailed { source })?;

        tracing::info!(
            user_id = %request.user_id,
            idempotency_key = %request.idempotency_key,
            transaction_id = %transaction_id,
            transaction_type = %request.transaction_type,
            amount = amount.get(),
            new_balance,
            "Transaction processed"
        );

        Ok(TransactOutcome::Committed {
            new_balance,
            transaction_id,
        })
    }

    fn compute_new_balance(
        request: &TransactRequest,
        amount: Amount,
        snapshot: &BalanceSnapshot,
    ) -> Result<i64> {
        if request.transaction_type.is_debit() && snapshot.balance < amount.get() {
            return Err(TransactionError::InsufficientBalance {
                balance: snapshot.balance,
                required: amount.get(),
            });
        }

        request
            .transaction_type
            .apply(snapshot.balance, amount)
            .ok_or(TransactionError::BalanceOverflow {
                balance: snapshot.balance,
                amount: amount.get(),
            })
    }

    /// Check whether an idempotency key has already been recorded.
    ///
    /// Under `FailOpen` a store error reads as "not processed".
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the read fails under `FailClosed`.
    pub async fn check_idempotency(&self, key: &IdempotencyKey) -> Result<bool> {
        match self.store.get_transaction(key).await {
            Ok(record) => Ok(record.is_some()),
            Err(e) if self.policy.absorbs_read_errors() => {
                tracing::error!(idempotency_key = %key, error = %e, "Error checking idempotency");
                Ok(false)
            }
            Err(source) => Err(TransactionError::StoreUnavailable { source }),
        }
    }

    /// Set a balance directly, guarded by the record version.
    ///
    /// Succeeds only if the stored version still equals `expected_version`;
    /// the version is then incremented. Independent of `transact` and
    /// writes no history.
    ///
    /// # Errors
    ///
    /// - `NegativeBalance` if `new_balance` is below zero.
    /// - `TransactionFailed` if the version no longer matches (see
    ///   [`TransactionError::is_conflict`]) or the store fails.
    pub async fn update_balance_optimistic(
        &self,
        user_id: &UserId,
        new_balance: i64,
        expected_version: u64,
    ) -> Result<UserBalance> {
        if new_balance < 0 {
            return Err(TransactionError::NegativeBalance(new_balance));
        }

        let update = BalanceUpdate::versioned(user_id.clone(), new_balance, expected_version);
        self.store
            .update_balance(&update)
            .await
            .map_err(|source| TransactionError::TransactionFailed { source })?;

        let version = expected_version.saturating_add(1);
        tracing::info!(user_id = %user_id, new_balance, version, "Balance updated");

        Ok(UserBalance {
            user_id: user_id.clone(),
            balance: new_balance,
            version,
        })
    }

    /// Create a user's balance row with the default balance if it is absent.
    ///
    /// Commits require the row to exist, so hosts call this before the first
    /// transaction for a user. Returns the balance now in effect.
    ///
    /// # Errors
    ///
    /// Returns `TransactionFailed` if the write fails for a reason other than
    /// the row already existing.
    pub async fn open_account(&self, user_id: &UserId) -> Result<UserBalance> {
        let item = BalanceItem::new(user_id.clone(), self.default_balance);
        let created = self
            .store
            .transact_write(&[WriteOp::PutBalance {
                item,
                condition: Condition::NotExists,
            }])
            .await;

        match created {
            Ok(()) => {
                tracing::info!(user_id = %user_id, balance = self.default_balance, "Account opened");
                Ok(UserBalance {
                    user_id: user_id.clone(),
                    balance: self.default_balance,
                    version: 0,
                })
            }
            Err(StoreError::ConditionalCheckFailed { .. }) => {
                let snapshot = self.reader.read(user_id).await?;
                Ok(UserBalance {
                    user_id: user_id.clone(),
                    balance: snapshot.balance,
                    version: snapshot.version.unwrap_or(0),
                })
            }
            Err(source) => Err(TransactionError::TransactionFailed { source }),
        }
    }

    /// Look up the record for an idempotency key.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the read fails.
    pub async fn lookup(&self, key: &IdempotencyKey) -> Result<Option<TransactionRecord>> {
        self.store
            .get_transaction(key)
            .await
            .map_err(|source| TransactionError::StoreUnavailable { source })
    }

    /// List a user's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the read fails.
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        self.store
            .list_transactions_by_user(user_id, limit, offset)
            .await
            .map_err(|source| TransactionError::StoreUnavailable { source })
    }
}
