//! Conditional write requests.
//!
//! Both backends evaluate every condition of a request against the current
//! state before applying any part of it.

use std::collections::HashSet;

use ledger_core::{BalanceItem, TransactionRecord, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::table;

/// A predicate over the current item that must hold for a write to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// No precondition.
    Always,

    /// The item must exist.
    Exists,

    /// The item must not exist.
    NotExists,

    /// The item must exist and its version must equal the given value.
    VersionEquals(u64),
}

impl Condition {
    /// Evaluate against the current item, given as `Some(version)` if it
    /// exists and `None` otherwise.
    #[must_use]
    pub fn is_satisfied(self, current: Option<u64>) -> bool {
        match self {
            Self::Always => true,
            Self::Exists => current.is_some(),
            Self::NotExists => current.is_none(),
            Self::VersionEquals(expected) => current == Some(expected),
        }
    }
}

/// A single-item balance update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    /// Row to update.
    pub user_id: UserId,

    /// New balance.
    pub balance: i64,

    /// New version, if the update sets one.
    pub version: Option<u64>,

    /// Precondition on the current row.
    pub condition: Condition,
}

impl BalanceUpdate {
    /// Set the balance if the row exists, leaving its version alone.
    #[must_use]
    pub fn if_exists(user_id: UserId, balance: i64) -> Self {
        Self {
            user_id,
            balance,
            version: None,
            condition: Condition::Exists,
        }
    }

    /// Set the balance and bump the version, if the version still matches.
    #[must_use]
    pub fn versioned(user_id: UserId, balance: i64, expected_version: u64) -> Self {
        Self {
            user_id,
            balance,
            version: Some(expected_version.saturating_add(1)),
            condition: Condition::VersionEquals(expected_version),
        }
    }

    /// Apply this update to the current row, creating one if absent.
    #[must_use]
    pub fn apply_to(&self, current: Option<BalanceItem>) -> BalanceItem {
        let mut item = current.unwrap_or_else(|| BalanceItem {
            user_id: self.user_id.clone(),
            balance: None,
            version: None,
        });
        item.balance = Some(self.balance.to_string());
        if let Some(version) = self.version {
            item.version = Some(version);
        }
        item
    }
}

/// One part of an atomic multi-item write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Update fields of a balance row.
    UpdateBalance(BalanceUpdate),

    /// Replace a whole balance row.
    PutBalance {
        /// The row to write.
        item: BalanceItem,
        /// Precondition on the current row.
        condition: Condition,
    },

    /// Insert a history record.
    PutTransaction {
        /// The record to write.
        record: TransactionRecord,
        /// Precondition on the current record with the same key.
        condition: Condition,
    },
}

impl WriteOp {
    /// Table this op writes to.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::UpdateBalance(_) | Self::PutBalance { .. } => table::USER_BALANCES,
            Self::PutTransaction { .. } => table::TRANSACTION_HISTORY,
        }
    }

    /// Condition attached to this op.
    #[must_use]
    pub fn condition(&self) -> Condition {
        match self {
            Self::UpdateBalance(update) => update.condition,
            Self::PutBalance { condition, .. } | Self::PutTransaction { condition, .. } => {
                *condition
            }
        }
    }

    fn item_key(&self) -> Vec<u8> {
        match self {
            Self::UpdateBalance(update) => keys::balance_key(&update.user_id),
            Self::PutBalance { item, .. } => keys::balance_key(&item.user_id),
            Self::PutTransaction { record, .. } => keys::history_key(&record.idempotency_key),
        }
    }
}

/// Reject empty requests and requests touching the same item twice.
///
/// # Errors
///
/// Returns `StoreError::InvalidRequest` describing the problem.
pub fn validate(ops: &[WriteOp]) -> Result<()> {
    if ops.is_empty() {
        return Err(StoreError::InvalidRequest("no writes in request".into()));
    }

    let mut seen = HashSet::with_capacity(ops.len());
    for op in ops {
        if !seen.insert((op.table(), op.item_key())) {
            return Err(StoreError::InvalidRequest(format!(
                "multiple writes to the same item in {}",
                op.table()
            )));
        }
    }

    Ok(())
}

/// Check one op's condition, reporting its position on failure.
///
/// # Errors
///
/// Returns `StoreError::ConditionalCheckFailed` if the condition does not hold.
pub fn check(op: &WriteOp, index: usize, current: Option<u64>) -> Result<()> {
    if op.condition().is_satisfied(current) {
        Ok(())
    } else {
        Err(StoreError::ConditionalCheckFailed {
            table: op.table(),
            index,
        })
    }
}
