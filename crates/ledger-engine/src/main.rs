//! `ledger-transact` - apply one transaction against a local ledger.
//!
//! Usage: `ledger-transact <idempotent-key> <user-id> <amount> <credit|debit>`

use std::sync::Arc;

use ledger_core::{Amount, IdempotencyKey, TransactRequest, UserId};
use ledger_engine::{telemetry, LedgerConfig, TransactOutcome, TransactionProcessor};
use ledger_store::{RocksStore, Store};

const USAGE: &str = "usage: ledger-transact <idempotent-key> <user-id> <amount> <credit|debit>";

fn parse_args(args: &[String]) -> Result<TransactRequest, Box<dyn std::error::Error>> {
    let [key, user_id, amount, transaction_type] = args else {
        return Err(USAGE.into());
    };

    Ok(TransactRequest {
        idempotency_key: IdempotencyKey::new(key.as_str())?,
        user_id: UserId::new(user_id.as_str())?,
        // Non-numeric input becomes NaN and is rejected by validation
        amount: amount.parse().unwrap_or(f64::NAN),
        transaction_type: transaction_type.parse()?,
    })
}

/// Validate the amount, provision the user's row, then apply the request.
///
/// An invalid amount is rejected before anything is written.
async fn apply<S: Store>(
    processor: &TransactionProcessor<S>,
    request: &TransactRequest,
) -> Result<TransactOutcome, Box<dyn std::error::Error>> {
    Amount::from_f64(request.amount)?;
    processor.open_account(&request.user_id).await?;
    Ok(processor.transact(request).await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = parse_args(&args)?;

    let config = LedgerConfig::from_env();
    tracing::info!(
        data_dir = %config.data_dir,
        default_balance = config.default_balance,
        degraded_mode = %config.degraded_mode,
        "Ledger configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);
    let processor = TransactionProcessor::new(store, &config);

    let outcome = apply(&processor, &request).await?;
    println!("{outcome}");

    Ok(())
}
