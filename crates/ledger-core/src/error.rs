//! Error types for ledger domain values.

/// Reasons a requested amount is rejected.
///
/// The messages are part of the caller-facing contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The amount is NaN or infinite.
    #[error("Amount must be a valid number.")]
    NotANumber,

    /// The amount is zero or negative.
    #[error("Amount must be greater than zero.")]
    NotPositive,

    /// The amount has a fractional part.
    #[error("Amount must be a whole number.")]
    NotWhole,

    /// The amount does not fit in an `i64`.
    #[error("Amount is too large.")]
    OutOfRange,
}
