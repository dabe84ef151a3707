//! Validated transaction amounts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AmountError;

/// A strictly positive, whole transaction amount.
///
/// Requests arrive as floating point numbers; this type is the only way into
/// the integer balance arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Validate a raw requested amount.
    ///
    /// Checks run in a fixed order: finiteness, sign, integrality, range.
    ///
    /// # Errors
    ///
    /// Returns the first rule the value breaks.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::float_cmp
    )]
    pub fn from_f64(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::NotANumber);
        }
        if value <= 0.0 {
            return Err(AmountError::NotPositive);
        }
        if value.fract() != 0.0 {
            return Err(AmountError::NotWhole);
        }
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        if value >= i64::MAX as f64 {
            return Err(AmountError::OutOfRange);
        }
        Ok(Self(value as i64))
    }

    /// Return the amount as an integer.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(AmountError::NotPositive);
        }
        Ok(Self(value))
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
