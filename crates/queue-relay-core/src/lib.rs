//! # Queue-Relay Core
//!
//! Message processing logic for the Queue-Relay service.
//!
//! A message received from a queue is processed while its visibility timeout
//! is periodically extended, recorded in an idempotency ledger so that a
//! redelivered copy is not worked twice, and deleted once processing ends.
//!
//! ## Architecture
//!
//! The core depends only on trait abstractions:
//! - [`queue_relay_runtime::QueueClient`] for queue operations
//! - [`ledger::IdempotencyStore`] for duplicate detection
//! - [`work::Workload`] for the processing itself
//!
//! Infrastructure implementations are injected at runtime.
//!
//! ## Usage
//!
//! ```rust
//! use queue_relay_core::{ComplexityFactor, CorrelationId};
//!
//! let correlation_id = CorrelationId::generate();
//! let complexity = ComplexityFactor::from_body("cost:12").unwrap();
//! assert_eq!(complexity.value(), 12);
//! assert!(!correlation_id.as_str().is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod extension;
pub mod ledger;
pub mod processor;
pub mod work;

pub use extension::{
    ExtensionError, ExtensionHandle, ExtensionReport, ExtensionSchedule, ExtensionSupervisor,
};
pub use ledger::{ClaimOutcome, IdempotencyStore, InMemoryIdempotencyStore, LedgerError};
pub use processor::{
    BatchRequest, FailurePolicy, MessageResponse, ProcessingError, ProcessingOutcome,
    ProcessingStatus, ProcessorConfig, QueueTarget, VisibilityExtendingProcessor,
};
pub use work::{interrupt_channel, ComplexityFactor, SimulatedWorkload, WorkError, Workload};

// ============================================================================
// Correlation Identifier
// ============================================================================

/// Identifier of the request that processed a message.
///
/// Supplied by the caller through the `RequestCorrelationId` header, or
/// generated as a UUID v4 when absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a correlation id from a caller-supplied value
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidCorrelationId> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(InvalidCorrelationId);
        }
        Ok(Self(value))
    }

    /// Generate a fresh random correlation id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = InvalidCorrelationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = InvalidCorrelationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.0
    }
}

/// A correlation id was empty or whitespace
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("correlation id must not be empty")]
pub struct InvalidCorrelationId;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
