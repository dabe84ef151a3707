//! Table definitions.
//!
//! Each table maps to one `RocksDB` column family.

/// Table names.
pub mod table {
    /// One balance row per user, keyed by `user_id`.
    pub const USER_BALANCES: &str = "UserBalances";

    /// Accepted transactions, keyed by idempotency key.
    pub const TRANSACTION_HISTORY: &str = "TransactionHistory";

    /// Index: history by user, keyed by `len(user_id) || user_id || transaction_id`.
    /// Value is the idempotency key of the history row.
    pub const TRANSACTIONS_BY_USER: &str = "TransactionsByUser";
}

/// Returns all table names for database initialization.
#[must_use]
pub fn all_tables() -> Vec<&'static str> {
    vec![
        table::USER_BALANCES,
        table::TRANSACTION_HISTORY,
        table::TRANSACTIONS_BY_USER,
    ]
}
