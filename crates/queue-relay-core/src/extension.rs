//! Visibility timeout extension for messages being processed.
//!
//! While a message is worked on, a background task keeps it hidden from other
//! consumers by calling `change_message_visibility` on a fixed schedule. The
//! first call happens once the initial visibility timeout has elapsed; later
//! calls follow every `increment` seconds, each asking for `increment` seconds
//! more than the previous one.
//!
//! [`ExtensionSupervisor`] allows at most one task per receipt handle. The
//! returned [`ExtensionHandle`] must be stopped before the message is deleted;
//! [`ExtensionHandle::stop`] waits for the task to end, so no extension call
//! can reach the queue after the delete.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use queue_relay_runtime::{
    MessageId, QueueClient, QueueUrl, ReceiptHandle, MAX_VISIBILITY_TIMEOUT_SECONDS,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument};

/// Errors from starting or stopping an extension task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    #[error("Extension already active for receipt handle: {receipt}")]
    AlreadyActive { receipt: String },

    #[error("Invalid extension schedule: {message}")]
    InvalidSchedule { message: String },

    #[error("Extension task ended abnormally: {message}")]
    TaskFailed { message: String },
}

/// Timing of visibility extensions for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionSchedule {
    /// Seconds before the first extension, normally the queue's visibility timeout
    pub initial_timeout_seconds: u32,
    /// Seconds between extensions, and the growth of each requested timeout
    pub increment_seconds: u32,
}

impl ExtensionSchedule {
    pub fn new(initial_timeout_seconds: u32, increment_seconds: u32) -> Self {
        Self {
            initial_timeout_seconds,
            increment_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), ExtensionError> {
        if self.increment_seconds == 0 {
            return Err(ExtensionError::InvalidSchedule {
                message: "increment must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Timeout requested by the n-th extension (zero based), capped at the
    /// queue service maximum
    pub fn requested_timeout(&self, extension: u32) -> u32 {
        extension
            .saturating_mul(self.increment_seconds)
            .saturating_add(self.initial_timeout_seconds)
            .min(MAX_VISIBILITY_TIMEOUT_SECONDS)
    }
}

/// Summary of an extension task, returned when it is stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionReport {
    /// Successful visibility changes
    pub extensions: u32,
    /// Visibility changes that failed and were logged
    pub failures: u32,
    /// Timeout requested by the most recent call, successful or not
    pub last_requested_timeout: Option<u32>,
}

/// Starts extension tasks and tracks which receipt handles have one
#[derive(Debug, Clone, Default)]
pub struct ExtensionSupervisor {
    active: Arc<DashMap<ReceiptHandle, MessageId>>,
}

impl ExtensionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of extension tasks currently running
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, receipt: &ReceiptHandle) -> bool {
        self.active.contains_key(receipt)
    }

    /// Spawn the extension task for a received message
    pub fn start(
        &self,
        client: Arc<dyn QueueClient>,
        queue: QueueUrl,
        message_id: MessageId,
        receipt: ReceiptHandle,
        schedule: ExtensionSchedule,
    ) -> Result<ExtensionHandle, ExtensionError> {
        schedule.validate()?;

        match self.active.entry(receipt.clone()) {
            Entry::Occupied(_) => {
                return Err(ExtensionError::AlreadyActive {
                    receipt: receipt.as_str().to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(message_id.clone());
            }
        }

        let registration = Registration {
            active: self.active.clone(),
            receipt: receipt.clone(),
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let span = tracing::info_span!("visibility_extension", message_id = %message_id);

        let task = tokio::spawn(
            async move {
                let report = extend_until_stopped(client, queue, receipt, schedule, stop_rx).await;
                drop(registration);
                report
            }
            .instrument(span),
        );

        Ok(ExtensionHandle {
            message_id,
            stop: Some(stop_tx),
            task: Some(task),
        })
    }
}

/// Removes the receipt from the active set when the task ends or is aborted
struct Registration {
    active: Arc<DashMap<ReceiptHandle, MessageId>>,
    receipt: ReceiptHandle,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.active.remove(&self.receipt);
    }
}

/// Handle to one running extension task.
///
/// Dropping the handle without calling [`stop`](Self::stop) aborts the task.
#[derive(Debug)]
pub struct ExtensionHandle {
    message_id: MessageId,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<ExtensionReport>>,
}

impl ExtensionHandle {
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Signal the task to stop and wait until it has ended.
    ///
    /// A visibility change already in progress completes before the task ends.
    pub async fn stop(mut self) -> Result<ExtensionReport, ExtensionError> {
        if let Some(stop) = self.stop.take() {
            // The task may already be gone after an abort
            let _ = stop.send(());
        }

        let Some(task) = self.task.take() else {
            return Ok(ExtensionReport::default());
        };

        task.await.map_err(|e| ExtensionError::TaskFailed {
            message: e.to_string(),
        })
    }
}

impl Drop for ExtensionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(message_id = %self.message_id, "Aborting extension task");
            task.abort();
        }
    }
}

async fn extend_until_stopped(
    client: Arc<dyn QueueClient>,
    queue: QueueUrl,
    receipt: ReceiptHandle,
    schedule: ExtensionSchedule,
    mut stop: oneshot::Receiver<()>,
) -> ExtensionReport {
    let increment = Duration::from_secs(u64::from(schedule.increment_seconds));
    let first = Instant::now() + Duration::from_secs(u64::from(schedule.initial_timeout_seconds));
    let mut ticker = interval_at(first, increment);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut report = ExtensionReport::default();
    let mut current_timeout = schedule.requested_timeout(0);

    loop {
        tokio::select! {
            biased;

            // A dropped sender also ends the task
            _ = &mut stop => break,

            _ = ticker.tick() => {
                match client
                    .change_message_visibility(&queue, &receipt, current_timeout)
                    .await
                {
                    Ok(()) => {
                        report.extensions += 1;
                        info!(
                            visibility_timeout_seconds = current_timeout,
                            extensions = report.extensions,
                            "Visibility timeout extended"
                        );
                    }
                    Err(e) => {
                        report.failures += 1;
                        warn!(
                            visibility_timeout_seconds = current_timeout,
                            error = %e,
                            "Visibility timeout extension failed"
                        );
                    }
                }
                report.last_requested_timeout = Some(current_timeout);
                current_timeout = current_timeout
                    .saturating_add(schedule.increment_seconds)
                    .min(MAX_VISIBILITY_TIMEOUT_SECONDS);
            }
        }
    }

    report
}

#[cfg(test)]
#[path = "extension_tests.rs"]
mod tests;
