//! Error types for ledger transactions.

use ledger_core::AmountError;
use ledger_store::schema::table;
use ledger_store::StoreError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Errors returned by the balance reader and transaction processor.
///
/// Nothing has been written to the store when any of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The requested amount is not a positive whole number within range.
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),

    /// A debit exceeds the current balance.
    #[error("Insufficient balance.")]
    InsufficientBalance {
        /// Balance at the time of the check.
        balance: i64,
        /// Amount requested.
        required: i64,
    },

    /// The new balance does not fit in an `i64`.
    #[error("Balance overflow.")]
    BalanceOverflow {
        /// Balance before the transaction.
        balance: i64,
        /// Amount requested.
        amount: i64,
    },

    /// A direct balance write asked for a negative value.
    #[error("Balance must not be negative.")]
    NegativeBalance(i64),

    /// The store rejected or failed a write.
    #[error("Transaction failed: {source}")]
    TransactionFailed {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// A read failed and the degraded-mode policy does not absorb it.
    #[error("Store unavailable: {source}")]
    StoreUnavailable {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl TransactionError {
    /// Whether the store rejected a write because a precondition failed.
    ///
    /// Conflicts are transient; retrying with the same idempotency key is safe.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed { source } if source.is_conditional_check_failed()
        )
    }

    /// Whether a concurrent request already recorded the same idempotency key.
    ///
    /// Callers may treat this as "already processed".
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed {
                source: StoreError::ConditionalCheckFailed { table: failed, .. }
            } if *failed == table::TRANSACTION_HISTORY
        )
    }
}
