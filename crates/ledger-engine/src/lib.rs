//! Idempotent balance transactions.
//!
//! This crate applies credits and debits to per-user balances so that retries
//! of the same request never apply twice:
//!
//! - [`BalanceReader`] reads a user's balance, substituting a default for
//!   unknown users
//! - [`TransactionProcessor`] validates a request, checks its idempotency key
//!   and commits the balance update and history record atomically
//! - [`DegradedModePolicy`] decides whether read failures are absorbed
//!
//! The store is injected; any [`ledger_store::Store`] works.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ledger_core::{IdempotencyKey, TransactRequest, UserId};
//! use ledger_engine::{LedgerConfig, TransactionProcessor};
//! use ledger_store::MemoryStore;
//!
//! # async fn demo() -> ledger_engine::Result<()> {
//! let processor = TransactionProcessor::new(Arc::new(MemoryStore::new()), &LedgerConfig::default());
//! let user_id = UserId::new("1").unwrap();
//! processor.open_account(&user_id).await?;
//!
//! let request = TransactRequest::credit(IdempotencyKey::new("req-1").unwrap(), user_id, 10.0);
//! let outcome = processor.transact(&request).await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod ids;
pub mod policy;
pub mod processor;
pub mod reader;
pub mod telemetry;

pub use config::LedgerConfig;
pub use error::{Result, TransactionError};
pub use ids::{IdGenerator, UlidGenerator};
pub use policy::DegradedModePolicy;
pub use processor::{TransactOutcome, TransactionProcessor};
pub use reader::{BalanceOrigin, BalanceReader, BalanceSnapshot};
