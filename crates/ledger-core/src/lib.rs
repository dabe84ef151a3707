//! Core types for the balance ledger.
//!
//! This crate provides the foundational types shared by the store and engine:
//!
//! - **Identifiers**: `UserId`, `IdempotencyKey`, `TransactionId`
//! - **Amounts**: `Amount`, validated from raw request numbers
//! - **Balances**: `BalanceItem` (stored row), `UserBalance`
//! - **Transactions**: `TransactRequest`, `TransactionRecord`, `TransactionType`
//!
//! Balances and amounts are plain `i64` integers; there is no currency or
//! rounding model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod amount;
pub mod balance;
pub mod error;
pub mod ids;
pub mod transaction;

pub use amount::Amount;
pub use balance::{BalanceItem, UserBalance, DEFAULT_BALANCE};
pub use error::AmountError;
pub use ids::{IdError, IdempotencyKey, TransactionId, UserId};
pub use transaction::{
    TransactRequest, TransactionRecord, TransactionType, UnknownTransactionType,
};
