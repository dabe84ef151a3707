//! Balance reader.
//!
//! Users without a record, or whose stored balance does not parse, read as
//! the configured default balance. Store errors are handled according to the
//! [`DegradedModePolicy`].

use std::sync::Arc;

use ledger_core::UserId;
use ledger_store::Store;

use crate::config::LedgerConfig;
use crate::error::{Result, TransactionError};
use crate::policy::DegradedModePolicy;

/// Where a balance reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceOrigin {
    /// Parsed from the user's record.
    Stored,

    /// No record exists; the default applies.
    Missing,

    /// The record's balance is missing or malformed; the default applies.
    Unparseable,

    /// The store failed and the policy absorbed it; the default applies.
    Degraded,
}

/// A balance reading plus the record version it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// The balance to use.
    pub balance: i64,

    /// Version of the record, if one was read.
    pub version: Option<u64>,

    /// How the balance was obtained.
    pub origin: BalanceOrigin,
}

impl BalanceSnapshot {
    /// Whether the default balance was substituted.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.origin != BalanceOrigin::Stored
    }
}

/// Reads user balances from the store.
pub struct BalanceReader<S> {
    store: Arc<S>,
    default_balance: i64,
    policy: DegradedModePolicy,
}

impl<S: Store> BalanceReader<S> {
    /// Create a reader over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            store,
            default_balance: config.default_balance,
            policy: config.degraded_mode,
        }
    }

    /// Get a user's balance.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::StoreUnavailable` only under
    /// `DegradedModePolicy::FailClosed`.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<i64> {
        Ok(self.read(user_id).await?.balance)
    }

    /// Read a user's balance together with its record version.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::StoreUnavailable` only under
    /// `DegradedModePolicy::FailClosed`.
    pub async fn read(&self, user_id: &UserId) -> Result<BalanceSnapshot> {
        let item = match self.store.get_balance_item(user_id).await {
            Ok(item) => item,
            Err(e) if self.policy.absorbs_read_errors() => {
                tracing::error!(user_id = %user_id, error = %e, "Error getting balance, returning default balance");
                return Ok(self.default_snapshot(None, BalanceOrigin::Degraded));
            }
            Err(source) => return Err(TransactionError::StoreUnavailable { source }),
        };

        let Some(item) = item else {
            tracing::warn!(user_id = %user_id, "Balance not found, returning default balance");
            return Ok(self.default_snapshot(None, BalanceOrigin::Missing));
        };

        let version = Some(item.current_version());
        match item.parsed_balance() {
            Some(balance) => Ok(BalanceSnapshot {
                balance,
                version,
                origin: BalanceOrigin::Stored,
            }),
            None => {
                tracing::warn!(user_id = %user_id, raw = ?item.balance, "Invalid balance format, returning default balance");
                Ok(self.default_snapshot(version, BalanceOrigin::Unparseable))
            }
        }
    }

    fn default_snapshot(&self, version: Option<u64>, origin: BalanceOrigin) -> BalanceSnapshot {
        BalanceSnapshot {
            balance: self.default_balance,
            version,
            origin,
        }
    }
}
