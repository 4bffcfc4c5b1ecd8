//! Idempotency ledger recording which messages have been processed.
//!
//! The ledger maps a message id to the correlation id of the request that
//! processed it. Claims are atomic so two concurrent deliveries of the same
//! message perform the work exactly once.

use crate::CorrelationId;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use queue_relay_runtime::MessageId;
use std::sync::Arc;
use thiserror::Error;

/// Result of attempting to claim a message id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The id was absent and is now recorded for the caller
    Claimed,
    /// The id was already recorded by an earlier request
    AlreadyProcessed { correlation_id: CorrelationId },
}

/// Errors raised by ledger backends
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Idempotency ledger unavailable: {message}")]
    Unavailable { message: String },
}

/// Store of processed message ids
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Record the message id for the correlation id unless it is already present
    async fn claim(
        &self,
        message_id: &MessageId,
        correlation_id: &CorrelationId,
    ) -> Result<ClaimOutcome, LedgerError>;

    /// Correlation id recorded for the message, if any
    async fn lookup(&self, message_id: &MessageId) -> Result<Option<CorrelationId>, LedgerError>;

    /// Remove a claim held by the correlation id.
    ///
    /// Returns false when the message is not recorded or is recorded for a
    /// different correlation id.
    async fn release(
        &self,
        message_id: &MessageId,
        correlation_id: &CorrelationId,
    ) -> Result<bool, LedgerError>;
}

/// Process-local ledger backed by a concurrent hash map.
///
/// Entries are kept for the lifetime of the process. Clones share the same
/// underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdempotencyStore {
    records: Arc<DashMap<MessageId, CorrelationId>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded message ids
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn claim(
        &self,
        message_id: &MessageId,
        correlation_id: &CorrelationId,
    ) -> Result<ClaimOutcome, LedgerError> {
        match self.records.entry(message_id.clone()) {
            Entry::Occupied(existing) => Ok(ClaimOutcome::AlreadyProcessed {
                correlation_id: existing.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(correlation_id.clone());
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn lookup(&self, message_id: &MessageId) -> Result<Option<CorrelationId>, LedgerError> {
        Ok(self
            .records
            .get(message_id)
            .map(|record| record.value().clone()))
    }

    async fn release(
        &self,
        message_id: &MessageId,
        correlation_id: &CorrelationId,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .records
            .remove_if(message_id, |_, holder| holder == correlation_id)
            .is_some())
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
