//! Transaction ID generation.

use std::sync::Mutex;

use ledger_core::TransactionId;
use ulid::{Generator, Ulid};

/// Source of unique transaction IDs.
pub trait IdGenerator: Send + Sync {
    /// Produce a new, never-before-returned ID.
    fn new_id(&self) -> TransactionId;
}

/// Generates monotonic ULIDs.
///
/// IDs from one generator strictly increase even within a millisecond, so a
/// user's history index stays in commit order.
pub struct UlidGenerator {
    inner: Mutex<Generator>,
}

impl UlidGenerator {
    /// Create a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }
}

impl Default for UlidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for UlidGenerator {
    fn new_id(&self) -> TransactionId {
        let generated = self
            .inner
            .lock()
            .ok()
            .and_then(|mut generator| generator.generate().ok());

        // Random bits exhausted within one millisecond, or a poisoned lock
        TransactionId::from_ulid(generated.unwrap_or_else(Ulid::new))
    }
}
