//! User balance records.
//!
//! One record exists per user. Numbers are kept in their decimal text form,
//! the way the backing key-value store holds them, so a corrupt value
//! survives a round trip and is only rejected when parsed.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Balance reported for users with no usable record.
pub const DEFAULT_BALANCE: i64 = 100;

/// The stored form of a user's balance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceItem {
    /// The user this row belongs to (primary key).
    pub user_id: UserId,

    /// Balance as decimal text; `None` if the attribute is missing.
    #[serde(default)]
    pub balance: Option<String>,

    /// Optimistic concurrency version. Absent rows read as version 0.
    #[serde(default)]
    pub version: Option<u64>,
}

impl BalanceItem {
    /// Create a row holding an integer balance at version 0.
    #[must_use]
    pub fn new(user_id: UserId, balance: i64) -> Self {
        Self {
            user_id,
            balance: Some(balance.to_string()),
            version: Some(0),
        }
    }

    /// Parse the stored balance, if present and well-formed.
    #[must_use]
    pub fn parsed_balance(&self) -> Option<i64> {
        self.balance.as_deref()?.trim().parse().ok()
    }

    /// The current version, treating a missing attribute as 0.
    #[must_use]
    pub fn current_version(&self) -> u64 {
        self.version.unwrap_or(0)
    }

    /// Convert into a typed balance, if the stored value parses.
    #[must_use]
    pub fn to_user_balance(&self) -> Option<UserBalance> {
        Some(UserBalance {
            user_id: self.user_id.clone(),
            balance: self.parsed_balance()?,
            version: self.current_version(),
        })
    }
}

/// A user's balance as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBalance {
    /// The user ID.
    pub user_id: UserId,

    /// Current balance.
    pub balance: i64,

    /// Version, incremented on every versioned update.
    pub version: u64,
}

impl UserBalance {
    /// Check if the balance covers a debit of `amount`.
    #[must_use]
    pub fn has_sufficient_balance(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}

impl From<&UserBalance> for BalanceItem {
    fn from(balance: &UserBalance) -> Self {
        Self {
            user_id: balance.user_id.clone(),
            balance: Some(balance.balance.to_string()),
            version: Some(balance.version),
        }
    }
}
