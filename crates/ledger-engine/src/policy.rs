//! Degraded-mode policy.
//!
//! Decides what happens when the idempotency check or the balance read hits a
//! store error. `FailOpen` keeps the ledger available: a failed idempotency
//! check counts as "not processed" and a failed balance read yields the
//! default balance. This hides storage outages and can let a retry apply
//! twice if the history read fails while the original commit is visible.
//! `FailClosed` surfaces both as `TransactionError::StoreUnavailable`.

use std::fmt;
use std::str::FromStr;

/// How read failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradedModePolicy {
    /// Absorb read errors and continue.
    #[default]
    FailOpen,

    /// Propagate read errors.
    FailClosed,
}

impl DegradedModePolicy {
    /// Whether read errors are absorbed.
    #[must_use]
    pub const fn absorbs_read_errors(self) -> bool {
        matches!(self, Self::FailOpen)
    }
}

impl fmt::Display for DegradedModePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailOpen => f.write_str("fail-open"),
            Self::FailClosed => f.write_str("fail-closed"),
        }
    }
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown degraded mode policy: {0}")]
pub struct UnknownPolicy(pub String);

impl FromStr for DegradedModePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "fail_open" => Ok(Self::FailOpen),
            "fail-closed" | "fail_closed" => Ok(Self::FailClosed),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}
