//! Key encoding utilities.

use ledger_core::{IdempotencyKey, TransactionId, UserId};

/// Create a balance key from a user ID.
#[must_use]
pub fn balance_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a history key from an idempotency key.
#[must_use]
pub fn history_key(key: &IdempotencyKey) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `len(user_id) (u64 BE) || user_id || transaction_id (16 bytes)`
///
/// The length prefix keeps one user's prefix from matching another user ID
/// that merely starts with it. Since ULIDs are time-ordered, a user's entries
/// sort by time.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = user_transactions_prefix(user_id);
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all transactions for a user.
#[must_use]
pub fn user_transactions_prefix(user_id: &UserId) -> Vec<u8> {
    let bytes = user_id.as_bytes();
    let mut prefix = Vec::with_capacity(8 + bytes.len() + 16);
    prefix.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    prefix.extend_from_slice(bytes);
    prefix
}
