//! Transaction requests and history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, IdempotencyKey, TransactionId, UserId};

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Adds to the balance.
    Credit,

    /// Removes from the balance.
    Debit,
}

impl TransactionType {
    /// Apply this transaction to `balance`, returning `None` on overflow.
    #[must_use]
    pub const fn apply(self, balance: i64, amount: Amount) -> Option<i64> {
        match self {
            Self::Credit => balance.checked_add(amount.get()),
            Self::Debit => balance.checked_sub(amount.get()),
        }
    }

    /// Whether this transaction removes from the balance.
    #[must_use]
    pub const fn is_debit(self) -> bool {
        matches!(self, Self::Debit)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => f.write_str("credit"),
            Self::Debit => f.write_str("debit"),
        }
    }
}

/// Error returned when parsing an unknown transaction type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction type: {0}")]
pub struct UnknownTransactionType(pub String);

impl std::str::FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(UnknownTransactionType(other.to_string())),
        }
    }
}

/// A request to move a user's balance.
///
/// `amount` is unvalidated; the processor checks it before touching the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactRequest {
    /// Key deduplicating retries of this request.
    #[serde(rename = "idempotentKey")]
    pub idempotency_key: IdempotencyKey,

    /// The user whose balance changes.
    pub user_id: UserId,

    /// Requested amount.
    pub amount: f64,

    /// Credit or debit.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

impl TransactRequest {
    /// Build a credit request.
    #[must_use]
    pub fn credit(idempotency_key: IdempotencyKey, user_id: UserId, amount: f64) -> Self {
        Self {
            idempotency_key,
            user_id,
            amount,
            transaction_type: TransactionType::Credit,
        }
    }

    /// Build a debit request.
    #[must_use]
    pub fn debit(idempotency_key: IdempotencyKey, user_id: UserId, amount: f64) -> Self {
        Self {
            idempotency_key,
            user_id,
            amount,
            transaction_type: TransactionType::Debit,
        }
    }
}

/// An accepted transaction, keyed by its idempotency key.
///
/// Written once at commit and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Caller-supplied key (primary key of the history table).
    #[serde(rename = "idempotentKey")]
    pub idempotency_key: IdempotencyKey,

    /// The user whose balance changed.
    pub user_id: UserId,

    /// Amount moved, always positive.
    pub amount: Amount,

    /// Credit or debit.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// Ledger-generated transaction ID.
    pub transaction_id: TransactionId,

    /// When the transaction was created.
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Create a record for a validated request.
    #[must_use]
    pub fn new(
        idempotency_key: IdempotencyKey,
        user_id: UserId,
        amount: Amount,
        transaction_type: TransactionType,
        transaction_id: TransactionId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            idempotency_key,
            user_id,
            amount,
            transaction_type,
            transaction_id,
            timestamp,
        }
    }

    /// The signed balance change this record represents.
    #[must_use]
    pub const fn signed_amount(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Credit => self.amount.get(),
            TransactionType::Debit => -self.amount.get(),
        }
    }
}
