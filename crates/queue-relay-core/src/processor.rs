//! Visibility-extending message processor.
//!
//! For each received message the processor:
//!
//! 1. starts a visibility extension task when extension is allowed
//! 2. reads the complexity factor from the body
//! 3. claims the message id in the idempotency ledger, performing the work
//!    only when the claim is new
//! 4. stops the extension task and waits for it to end
//! 5. deletes the message
//!
//! Fatal work failures are not retried. Under [`FailurePolicy::DeleteOnFailure`]
//! the message is deleted before the failure is returned.

use crate::extension::{ExtensionError, ExtensionReport, ExtensionSchedule, ExtensionSupervisor};
use crate::ledger::{ClaimOutcome, IdempotencyStore, LedgerError};
use crate::work::{ComplexityFactor, WorkError, Workload};
use crate::CorrelationId;
use queue_relay_runtime::{
    QueueAttribute, QueueAttributes, QueueClient, QueueError, QueueName, QueueUrl,
    ReceiveOptions, ReceivedMessage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Default seconds between visibility extensions
pub const DEFAULT_EXTENSION_INCREMENT_SECONDS: u32 = 10;

/// What happens to a message whose processing failed fatally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Delete the message, then report the failure
    #[default]
    DeleteOnFailure,
    /// Leave the message to reappear after its visibility timeout, where the
    /// queue's redrive policy may move it to a dead letter queue
    LeaveForRedelivery,
}

/// Processor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub extension_increment_seconds: u32,
    pub failure_policy: FailurePolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            extension_increment_seconds: DEFAULT_EXTENSION_INCREMENT_SECONDS,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Queue a message was received from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTarget {
    pub name: QueueName,
    pub url: QueueUrl,
}

/// Parameters for receiving and processing one batch
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub queue_name: QueueName,
    pub max_messages: u32,
    /// `None` uses the queue's `ReceiveMessageWaitTimeSeconds`
    pub wait_time_seconds: Option<u32>,
    pub extension_allowed: bool,
    pub correlation_id: CorrelationId,
}

/// Record of a processed message returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message_id: String,
    pub message_body: String,
    pub queue_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Processed,
    AlreadyProcessed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Processed => "PROCESSED",
            ProcessingStatus::AlreadyProcessed => "ALREADY_PROCESSED",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one message that ended with a delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub response: MessageResponse,
    pub status: ProcessingStatus,
    /// Correlation id recorded by the request that did the work, for duplicates
    pub recorded_correlation_id: Option<CorrelationId>,
    /// Report of the extension task, when one ran
    pub extension: Option<ExtensionReport>,
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Message {message_id} has no complexity factor in its body")]
    InvalidComplexity { message_id: String },

    #[error("Processing of message {message_id} was interrupted")]
    Interrupted { message_id: String },

    #[error("Processing of message {message_id} failed: {message}")]
    WorkFailed { message_id: String, message: String },

    #[error("Queue {queue_name} has no usable VisibilityTimeout attribute: {value:?}")]
    VisibilityTimeoutUnavailable {
        queue_name: String,
        value: Option<String>,
    },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

impl ProcessingError {
    /// Failures of the message itself, which the failure policy applies to
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProcessingError::InvalidComplexity { .. }
                | ProcessingError::Interrupted { .. }
                | ProcessingError::WorkFailed { .. }
        )
    }

    fn from_work(message_id: &str, error: WorkError) -> Self {
        match error {
            WorkError::Interrupted => ProcessingError::Interrupted {
                message_id: message_id.to_string(),
            },
            WorkError::Failed { message } => ProcessingError::WorkFailed {
                message_id: message_id.to_string(),
                message,
            },
        }
    }
}

/// Processes received messages while keeping them invisible to other consumers
pub struct VisibilityExtendingProcessor {
    client: Arc<dyn QueueClient>,
    ledger: Arc<dyn IdempotencyStore>,
    workload: Arc<dyn Workload>,
    supervisor: ExtensionSupervisor,
    config: ProcessorConfig,
}

impl VisibilityExtendingProcessor {
    pub fn new(
        client: Arc<dyn QueueClient>,
        ledger: Arc<dyn IdempotencyStore>,
        workload: Arc<dyn Workload>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            client,
            ledger,
            workload,
            supervisor: ExtensionSupervisor::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &ExtensionSupervisor {
        &self.supervisor
    }

    /// Receive up to `max_messages` from the queue and process them in order.
    ///
    /// The first failure ends the batch; messages not yet processed stay in
    /// flight until their visibility timeout expires.
    #[instrument(
        skip(self, request),
        fields(
            queue = %request.queue_name,
            correlation_id = %request.correlation_id,
            extension_allowed = request.extension_allowed
        )
    )]
    pub async fn process_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<Vec<ProcessingOutcome>, ProcessingError> {
        let url = self
            .client
            .create_or_get_queue(&request.queue_name, &QueueAttributes::new())
            .await?;

        let mut options = ReceiveOptions::new().with_max_messages(request.max_messages);
        if let Some(wait) = request.wait_time_seconds {
            options = options.with_wait_time_seconds(wait);
        }
        let messages = self.client.receive_messages(&url, options).await?;
        info!(count = messages.len(), "Received messages");

        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let initial_timeout = if request.extension_allowed {
            self.visibility_timeout(&request.queue_name, &url).await?
        } else {
            0
        };

        let target = QueueTarget {
            name: request.queue_name.clone(),
            url,
        };
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            let outcome = self
                .process(
                    &target,
                    message,
                    initial_timeout,
                    request.extension_allowed,
                    &request.correlation_id,
                )
                .await?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Process a single received message and delete it
    #[instrument(
        skip(self, target, message, correlation_id),
        fields(
            message_id = %message.message_id,
            queue = %target.name,
            correlation_id = %correlation_id
        )
    )]
    pub async fn process(
        &self,
        target: &QueueTarget,
        message: ReceivedMessage,
        initial_visibility_timeout_seconds: u32,
        extension_allowed: bool,
        correlation_id: &CorrelationId,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        info!(status = "STARTED", "Processing message");

        let extension = if extension_allowed {
            Some(self.supervisor.start(
                self.client.clone(),
                target.url.clone(),
                message.message_id.clone(),
                message.receipt_handle.clone(),
                ExtensionSchedule::new(
                    initial_visibility_timeout_seconds,
                    self.config.extension_increment_seconds,
                ),
            )?)
        } else {
            None
        };

        let work = self.perform(&message, correlation_id).await;

        let extension = match extension {
            Some(handle) => match handle.stop().await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "Extension task did not end cleanly");
                    None
                }
            },
            None => None,
        };

        let claim = match work {
            Ok(claim) => claim,
            Err(error) => {
                self.apply_failure_policy(target, &message, &error).await;
                return Err(error);
            }
        };

        self.client
            .delete_message(&target.url, &message.receipt_handle)
            .await?;
        info!(status = "DELETED", "Message deleted");

        let (status, recorded_correlation_id) = match claim {
            ClaimOutcome::Claimed => (ProcessingStatus::Processed, None),
            ClaimOutcome::AlreadyProcessed { correlation_id } => {
                (ProcessingStatus::AlreadyProcessed, Some(correlation_id))
            }
        };

        Ok(ProcessingOutcome {
            response: MessageResponse {
                message_id: message.message_id.as_str().to_string(),
                message_body: message.body,
                queue_name: target.name.as_str().to_string(),
            },
            status,
            recorded_correlation_id,
            extension,
        })
    }

    /// Claim the message and run the workload when the claim is new
    async fn perform(
        &self,
        message: &ReceivedMessage,
        correlation_id: &CorrelationId,
    ) -> Result<ClaimOutcome, ProcessingError> {
        let message_id = message.message_id.as_str();
        let complexity = ComplexityFactor::from_body(&message.body).ok_or_else(|| {
            ProcessingError::InvalidComplexity {
                message_id: message_id.to_string(),
            }
        })?;

        let claim = self
            .ledger
            .claim(&message.message_id, correlation_id)
            .await?;

        match claim {
            ClaimOutcome::Claimed => {
                if let Err(e) = self.workload.run(message, complexity).await {
                    self.release_claim(message, correlation_id).await;
                    return Err(ProcessingError::from_work(message_id, e));
                }
                info!(
                    status = "COMPLETED",
                    complexity = complexity.value(),
                    "Message processed"
                );
            }
            ClaimOutcome::AlreadyProcessed {
                correlation_id: ref recorded,
            } => {
                info!(
                    status = "ALREADY_PROCESSED",
                    recorded_correlation_id = %recorded,
                    "Duplicate message skipped"
                );
            }
        }

        Ok(claim)
    }

    async fn release_claim(&self, message: &ReceivedMessage, correlation_id: &CorrelationId) {
        match self.ledger.release(&message.message_id, correlation_id).await {
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to release idempotency claim"),
        }
    }

    async fn apply_failure_policy(
        &self,
        target: &QueueTarget,
        message: &ReceivedMessage,
        error: &ProcessingError,
    ) {
        if !error.is_fatal() {
            warn!(error = %error, "Processing failed");
            return;
        }

        match self.config.failure_policy {
            FailurePolicy::DeleteOnFailure => {
                match self
                    .client
                    .delete_message(&target.url, &message.receipt_handle)
                    .await
                {
                    Ok(()) => warn!(
                        status = "DELETED",
                        error = %error,
                        "Processing failed; message deleted"
                    ),
                    Err(e) => warn!(
                        error = %error,
                        delete_error = %e,
                        "Processing failed and the message could not be deleted"
                    ),
                }
            }
            FailurePolicy::LeaveForRedelivery => {
                warn!(
                    error = %error,
                    receive_count = message.receive_count,
                    "Processing failed; message left for redelivery"
                );
            }
        }
    }

    /// Read the queue's visibility timeout for the first extension
    async fn visibility_timeout(
        &self,
        queue_name: &QueueName,
        url: &QueueUrl,
    ) -> Result<u32, ProcessingError> {
        let value = self
            .client
            .get_queue_attribute(url, QueueAttribute::VisibilityTimeout)
            .await?;

        let seconds = value.as_deref().and_then(|v| v.trim().parse::<u32>().ok());
        seconds.ok_or_else(|| ProcessingError::VisibilityTimeoutUnavailable {
            queue_name: queue_name.as_str().to_string(),
            value,
        })
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
