//! Ledger configuration.

use std::str::FromStr;

use ledger_core::DEFAULT_BALANCE;

use crate::policy::DegradedModePolicy;

/// Ledger configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Path to `RocksDB` data directory (default: "/data/ledger").
    pub data_dir: String,

    /// Balance reported for users without a usable record (default: 100).
    pub default_balance: i64,

    /// Handling of store errors during reads (default: fail-open).
    pub degraded_mode: DegradedModePolicy,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unparseable values are logged and replaced by their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            data_dir: lookup("LEDGER_DATA_DIR").unwrap_or(defaults.data_dir),
            default_balance: parse_or(
                "LEDGER_DEFAULT_BALANCE",
                lookup("LEDGER_DEFAULT_BALANCE"),
                defaults.default_balance,
            ),
            degraded_mode: parse_or(
                "LEDGER_DEGRADED_MODE",
                lookup("LEDGER_DEGRADED_MODE"),
                defaults.degraded_mode,
            ),
        }
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    let Some(raw) = value else {
        return default;
    };

    match raw.parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(variable = %name, value = %raw, error = %e, default = ?default, "Invalid configuration value, using default");
            default
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/ledger".into(),
            default_balance: DEFAULT_BALANCE,
            degraded_mode: DegradedModePolicy::FailOpen,
        }
    }
}
