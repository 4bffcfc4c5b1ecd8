//! In-memory queue provider implementation for testing and development.
//!
//! This module provides a fully functional in-memory queue implementation that:
//! - Implements visibility timeouts, delays and long polling
//! - Supports FIFO message groups with duplicate detection
//! - Moves messages to a dead letter queue after too many receives
//! - Provides thread-safe concurrent access
//!
//! All timing uses the tokio clock so tests can pause and advance time.

use crate::attributes::{QueueAttribute, QueueAttributes, RedrivePolicy};
use crate::client::QueueProvider;
use crate::error::{QueueError, ValidationError};
use crate::message::{
    body_md5, Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions,
    ReceivedMessage, SendOptions, SendReceipt, Timestamp, MAX_MESSAGE_SIZE,
    MAX_VISIBILITY_TIMEOUT_SECONDS,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const URL_PREFIX: &str = "inmemory://queues/";
const ARN_PREFIX: &str = "arn:aws:sqs:local:000000000000:";

/// How often a long-polling receive rechecks for delayed or reappearing messages
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a receipt of a deleted message is still accepted by delete.
/// No delivery outlives its longest possible visibility timeout.
const RETIRED_RECEIPT_RETENTION: Duration =
    Duration::from_secs(MAX_VISIBILITY_TIMEOUT_SECONDS as u64);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues
struct QueueStorage {
    queues: HashMap<String, InMemoryQueue>,
    config: InMemoryConfig,
}

impl QueueStorage {
    fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: HashMap::new(),
            config,
        }
    }

    fn queue(&self, url: &QueueUrl) -> Result<&InMemoryQueue, QueueError> {
        let name = queue_name_from_url(url)?;
        self.queues
            .get(name)
            .ok_or_else(|| QueueError::QueueNotFound {
                queue_name: name.to_string(),
            })
    }

    fn queue_mut(&mut self, url: &QueueUrl) -> Result<&mut InMemoryQueue, QueueError> {
        let name = queue_name_from_url(url)?;
        self.queues
            .get_mut(name)
            .ok_or_else(|| QueueError::QueueNotFound {
                queue_name: name.to_string(),
            })
    }

    fn queue_name_for_arn(&self, arn: &str) -> Option<String> {
        self.queues
            .values()
            .find(|queue| queue.arn == arn)
            .map(|queue| queue.name.as_str().to_string())
    }
}

fn queue_name_from_url(url: &QueueUrl) -> Result<&str, QueueError> {
    url.as_str()
        .strip_prefix(URL_PREFIX)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| QueueError::QueueNotFound {
            queue_name: url.as_str().to_string(),
        })
}

/// Internal queue state for a single queue
struct InMemoryQueue {
    name: QueueName,
    url: QueueUrl,
    arn: String,
    /// Settable attributes with their effective values
    attributes: QueueAttributes,
    /// Stored messages in send order
    messages: Vec<StoredMessage>,
    /// Every receipt issued for a stored message, mapped to its message id
    receipts: HashMap<String, MessageId>,
    /// Receipts whose message has already been deleted, with the deletion time
    retired_receipts: HashMap<String, Instant>,
    /// FIFO duplicate detection: deduplication id to original send
    deduplication: HashMap<String, (SendReceipt, Instant)>,
    next_sequence: u64,
}

impl InMemoryQueue {
    fn new(name: QueueName, attributes: QueueAttributes) -> Self {
        Self {
            url: QueueUrl::new(format!("{}{}", URL_PREFIX, name)),
            arn: format!("{}{}", ARN_PREFIX, name),
            name,
            attributes,
            messages: Vec::new(),
            receipts: HashMap::new(),
            retired_receipts: HashMap::new(),
            deduplication: HashMap::new(),
            next_sequence: 1,
        }
    }

    fn numeric_attribute(&self, attribute: QueueAttribute) -> u64 {
        self.attributes
            .get(&attribute)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    fn flag(&self, attribute: QueueAttribute) -> bool {
        self.attributes
            .get(&attribute)
            .is_some_and(|value| value == "true")
    }

    fn redrive_policy(&self) -> Option<RedrivePolicy> {
        self.attributes
            .get(&QueueAttribute::RedrivePolicy)
            .and_then(|value| RedrivePolicy::from_json(value).ok())
    }

    /// Attribute snapshot including computed values
    fn snapshot(&self, now: Instant) -> QueueAttributes {
        let mut all = self.attributes.clone();
        all.insert(QueueAttribute::QueueArn, self.arn.clone());
        let visible = self.messages.iter().filter(|m| m.is_visible(now)).count();
        let in_flight = self.messages.iter().filter(|m| m.is_in_flight(now)).count();
        all.insert(
            QueueAttribute::ApproximateNumberOfMessages,
            visible.to_string(),
        );
        all.insert(
            QueueAttribute::ApproximateNumberOfMessagesNotVisible,
            in_flight.to_string(),
        );
        all
    }

    fn retire(&mut self, message_id: &MessageId, now: Instant) {
        self.retired_receipts
            .retain(|_, retired_at| now.duration_since(*retired_at) < RETIRED_RECEIPT_RETENTION);

        let retired: Vec<String> = self
            .receipts
            .iter()
            .filter(|(_, id)| *id == message_id)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in retired {
            self.receipts.remove(&receipt);
            self.retired_receipts.insert(receipt, now);
        }
    }

    fn remove_message(&mut self, message_id: &MessageId, now: Instant) -> Option<StoredMessage> {
        let index = self
            .messages
            .iter()
            .position(|m| &m.message_id == message_id)?;
        let message = self.messages.remove(index);
        self.retire(message_id, now);
        Some(message)
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    attributes: HashMap<String, String>,
    message_group_id: Option<String>,
    sent_at: Timestamp,
    delayed_until: Instant,
    /// Set while a delivery holds the message invisible
    invisible_until: Option<Instant>,
    current_receipt: Option<String>,
    receive_count: u32,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        now >= self.delayed_until && self.invisible_until.map_or(true, |until| now >= until)
    }

    fn is_in_flight(&self, now: Instant) -> bool {
        self.invisible_until.is_some_and(|until| now < until)
    }

    /// The current delivery may still be extended, up to and including the
    /// instant its timeout expires
    fn holds_delivery(&self, now: Instant) -> bool {
        self.invisible_until.is_some_and(|until| now <= until)
    }
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider implementation
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
    arrivals: Arc<Notify>,
}

fn poisoned() -> QueueError {
    QueueError::ProviderError {
        provider: "InMemory".to_string(),
        code: "StoragePoisoned".to_string(),
        message: "queue storage lock poisoned by a panicked writer".to_string(),
    }
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new(config))),
            arrivals: Arc::new(Notify::new()),
        }
    }

    fn storage(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, QueueError> {
        self.storage.write().map_err(|_| poisoned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, QueueStorage>, QueueError> {
        self.storage.read().map_err(|_| poisoned())
    }

    fn effective_attributes(
        config: &InMemoryConfig,
        queue: &QueueName,
        supplied: &QueueAttributes,
    ) -> Result<QueueAttributes, QueueError> {
        for (attribute, value) in supplied {
            attribute.validate_value(value)?;
        }

        let fifo_requested = supplied
            .get(&QueueAttribute::FifoQueue)
            .is_some_and(|value| value == "true");
        if fifo_requested != queue.is_fifo()
            && (fifo_requested || supplied.contains_key(&QueueAttribute::FifoQueue))
        {
            return Err(ValidationError::InvalidFormat {
                field: QueueAttribute::FifoQueue.to_string(),
                message: "FIFO queues must have a name ending in .fifo".to_string(),
            }
            .into());
        }

        if !queue.is_fifo() && supplied.contains_key(&QueueAttribute::ContentBasedDeduplication) {
            return Err(ValidationError::InvalidFormat {
                field: QueueAttribute::ContentBasedDeduplication.to_string(),
                message: "only FIFO queues support content-based deduplication".to_string(),
            }
            .into());
        }

        let mut attributes = QueueAttributes::from([
            (
                QueueAttribute::VisibilityTimeout,
                config.default_visibility_timeout_seconds.to_string(),
            ),
            (
                QueueAttribute::ReceiveMessageWaitTimeSeconds,
                "0".to_string(),
            ),
            (QueueAttribute::DelaySeconds, "0".to_string()),
            (
                QueueAttribute::MaximumMessageSize,
                MAX_MESSAGE_SIZE.to_string(),
            ),
        ]);
        if queue.is_fifo() {
            attributes.insert(QueueAttribute::FifoQueue, "true".to_string());
            attributes.insert(
                QueueAttribute::ContentBasedDeduplication,
                "false".to_string(),
            );
        }
        attributes.extend(supplied.iter().map(|(k, v)| (*k, v.clone())));

        Ok(attributes)
    }

    fn deduplication_id(
        queue: &InMemoryQueue,
        message: &Message,
        options: &SendOptions,
    ) -> Result<String, QueueError> {
        if let Some(id) = options.deduplication_id.as_ref().filter(|id| !id.is_empty()) {
            return Ok(id.clone());
        }

        if queue.flag(QueueAttribute::ContentBasedDeduplication) {
            return Ok(hex::encode(Sha256::digest(message.body.as_bytes())));
        }

        Err(ValidationError::Required {
            field: "message_deduplication_id".to_string(),
        }
        .into())
    }

    /// Select and deliver visible messages without waiting
    fn try_receive(
        &self,
        url: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<(Vec<ReceivedMessage>, Duration), QueueError> {
        let mut storage = self.storage()?;
        let now = Instant::now();

        let (wait, redrive_target) = {
            let queue = storage.queue_mut(url)?;
            let wait = options.wait_time_seconds.map_or_else(
                || queue.numeric_attribute(QueueAttribute::ReceiveMessageWaitTimeSeconds),
                u64::from,
            );
            (Duration::from_secs(wait), queue.redrive_policy())
        };
        let dead_letter_queue = redrive_target
            .as_ref()
            .and_then(|policy| storage.queue_name_for_arn(&policy.dead_letter_target_arn));

        let queue = storage.queue_mut(url)?;
        let is_fifo = queue.name.is_fifo();
        let visibility = Duration::from_secs(options.visibility_timeout_seconds.map_or_else(
            || queue.numeric_attribute(QueueAttribute::VisibilityTimeout),
            u64::from,
        ));

        // Groups with an in-flight message deliver nothing until it resolves
        let mut blocked_groups: HashSet<String> = queue
            .messages
            .iter()
            .filter(|m| is_fifo && m.is_in_flight(now))
            .filter_map(|m| m.message_group_id.clone())
            .collect();

        let mut delivered = Vec::new();
        let mut exhausted = Vec::new();

        for message in queue.messages.iter_mut() {
            if delivered.len() >= options.max_messages as usize {
                break;
            }

            let group = message.message_group_id.clone();
            if let Some(group) = group.as_ref().filter(|_| is_fifo) {
                if blocked_groups.contains(group) {
                    continue;
                }
                if !message.is_visible(now) {
                    blocked_groups.insert(group.clone());
                    continue;
                }
            } else if !message.is_visible(now) {
                continue;
            }

            if let (Some(policy), Some(_)) = (&redrive_target, &dead_letter_queue) {
                if message.receive_count >= policy.max_receive_count {
                    exhausted.push(message.message_id.clone());
                    continue;
                }
            }

            let receipt = ReceiptHandle::generate();
            message.receive_count += 1;
            message.invisible_until = Some(now + visibility);
            message.current_receipt = Some(receipt.as_str().to_string());

            delivered.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                attributes: message.attributes.clone(),
                receipt_handle: receipt,
                message_group_id: message.message_group_id.clone(),
                receive_count: message.receive_count,
                sent_at: message.sent_at.clone(),
                delivered_at: Timestamp::now(),
            });
        }

        for received in &delivered {
            queue.receipts.insert(
                received.receipt_handle.as_str().to_string(),
                received.message_id.clone(),
            );
        }

        let moved: Vec<StoredMessage> = exhausted
            .iter()
            .filter_map(|id| queue.remove_message(id, now))
            .collect();
        let source = queue.name.clone();

        if let Some(target) = dead_letter_queue {
            if let Some(dead_letter) = storage.queues.get_mut(&target) {
                for mut message in moved {
                    info!(
                        message_id = %message.message_id,
                        source = %source,
                        dead_letter = %target,
                        receive_count = message.receive_count,
                        "Message moved to dead letter queue"
                    );
                    message.receive_count = 0;
                    message.invisible_until = None;
                    message.current_receipt = None;
                    message.delayed_until = now;
                    dead_letter.messages.push(message);
                }
            }
        }

        Ok((delivered, wait))
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn create_queue(
        &self,
        queue: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueUrl, QueueError> {
        let mut storage = self.storage()?;
        let effective = Self::effective_attributes(&storage.config, queue, attributes)?;

        if let Some(existing) = storage.queues.get(queue.as_str()) {
            let matches = attributes
                .iter()
                .all(|(attribute, value)| existing.attributes.get(attribute) == Some(value));
            if matches {
                return Ok(existing.url.clone());
            }

            return Err(QueueError::QueueAlreadyExists {
                queue_name: queue.as_str().to_string(),
            });
        }

        let created = InMemoryQueue::new(queue.clone(), effective);
        let url = created.url.clone();
        storage.queues.insert(queue.as_str().to_string(), created);

        debug!(queue = %queue, "In-memory queue created");
        Ok(url)
    }

    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        let storage = self.read()?;
        storage
            .queues
            .get(queue.as_str())
            .map(|q| q.url.clone())
            .ok_or_else(|| QueueError::QueueNotFound {
                queue_name: queue.as_str().to_string(),
            })
    }

    async fn send_message(
        &self,
        url: &QueueUrl,
        message: &Message,
        options: &SendOptions,
    ) -> Result<SendReceipt, QueueError> {
        let mut storage = self.storage()?;
        let max_queue_size = storage.config.max_queue_size;
        let window = Duration::from_secs(storage.config.deduplication_window_seconds);
        let queue = storage.queue_mut(url)?;
        let now = Instant::now();

        let max_size = queue.numeric_attribute(QueueAttribute::MaximumMessageSize) as usize;
        let size = message.encoded_size();
        if size > max_size {
            return Err(QueueError::MessageTooLarge { size, max_size });
        }
        if message.body.is_empty() {
            return Err(ValidationError::Required {
                field: "message_body".to_string(),
            }
            .into());
        }
        options.validate_for(&queue.name)?;
        if queue.messages.len() >= max_queue_size {
            return Err(QueueError::InvalidRequest {
                provider: "InMemory".to_string(),
                code: "OverLimit".to_string(),
                message: format!("queue {} holds {} messages", queue.name, max_queue_size),
            });
        }

        let mut sequence_number = None;
        let mut deduplication_key = None;
        if queue.name.is_fifo() {
            queue
                .deduplication
                .retain(|_, (_, sent)| now.duration_since(*sent) < window);

            let key = Self::deduplication_id(queue, message, options)?;
            if let Some((original, _)) = queue.deduplication.get(&key) {
                debug!(
                    queue = %queue.name,
                    message_id = %original.message_id,
                    "Duplicate send suppressed"
                );
                return Ok(original.clone());
            }

            sequence_number = Some(format!("{:020}", queue.next_sequence));
            queue.next_sequence += 1;
            deduplication_key = Some(key);
        }

        let delay = queue
            .numeric_attribute(QueueAttribute::DelaySeconds)
            .max(u64::from(options.delay_seconds));
        let message_id = MessageId::new();

        queue.messages.push(StoredMessage {
            message_id: message_id.clone(),
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            message_group_id: options.message_group_id.clone(),
            sent_at: Timestamp::now(),
            delayed_until: now + Duration::from_secs(delay),
            invisible_until: None,
            current_receipt: None,
            receive_count: 0,
        });

        let receipt = SendReceipt {
            message_id,
            body_md5: body_md5(&message.body),
            sequence_number,
        };
        if let Some(key) = deduplication_key {
            queue.deduplication.insert(key, (receipt.clone(), now));
        }

        drop(storage);
        self.arrivals.notify_waiters();
        Ok(receipt)
    }

    async fn receive_messages(
        &self,
        url: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let started = Instant::now();

        loop {
            let arrival = self.arrivals.notified();
            let (messages, wait) = self.try_receive(url, options)?;
            let deadline = started + wait;
            let now = Instant::now();
            if !messages.is_empty() || now >= deadline {
                return Ok(messages);
            }

            let next_check = deadline.min(now + POLL_INTERVAL);
            tokio::select! {
                _ = arrival => {}
                _ = tokio::time::sleep_until(next_check) => {}
            }
        }
    }

    async fn delete_message(
        &self,
        url: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut storage = self.storage()?;
        let queue = storage.queue_mut(url)?;

        if queue.retired_receipts.contains_key(receipt.as_str()) {
            debug!(queue = %queue.name, "Delete for already deleted message ignored");
            return Ok(());
        }

        let message_id = queue
            .receipts
            .get(receipt.as_str())
            .cloned()
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.as_str().to_string(),
            })?;

        queue.remove_message(&message_id, Instant::now());
        Ok(())
    }

    async fn change_message_visibility(
        &self,
        url: &QueueUrl,
        receipt: &ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), QueueError> {
        let mut storage = self.storage()?;
        let queue = storage.queue_mut(url)?;
        let now = Instant::now();

        let message = queue
            .messages
            .iter_mut()
            .find(|m| m.current_receipt.as_deref() == Some(receipt.as_str()))
            .filter(|m| m.holds_delivery(now))
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.as_str().to_string(),
            })?;

        message.invisible_until =
            Some(now + Duration::from_secs(u64::from(visibility_timeout_seconds)));
        let became_visible = visibility_timeout_seconds == 0;

        drop(storage);
        if became_visible {
            self.arrivals.notify_waiters();
        }
        Ok(())
    }

    async fn get_queue_attributes(
        &self,
        url: &QueueUrl,
        attributes: &[QueueAttribute],
    ) -> Result<QueueAttributes, QueueError> {
        let storage = self.read()?;
        let queue = storage.queue(url)?;
        let snapshot = queue.snapshot(Instant::now());

        if attributes.is_empty() {
            return Ok(snapshot);
        }

        Ok(snapshot
            .into_iter()
            .filter(|(attribute, _)| attributes.contains(attribute))
            .collect())
    }

    async fn set_queue_attributes(
        &self,
        url: &QueueUrl,
        attributes: &QueueAttributes,
    ) -> Result<(), QueueError> {
        let mut storage = self.storage()?;

        for (attribute, value) in attributes {
            attribute.validate_value(value)?;
            if *attribute == QueueAttribute::FifoQueue {
                return Err(ValidationError::InvalidFormat {
                    field: attribute.to_string(),
                    message: "can only be set when the queue is created".to_string(),
                }
                .into());
            }
            if *attribute == QueueAttribute::RedrivePolicy {
                let policy = RedrivePolicy::from_json(value)?;
                if storage
                    .queue_name_for_arn(&policy.dead_letter_target_arn)
                    .is_none()
                {
                    return Err(QueueError::QueueNotFound {
                        queue_name: policy.dead_letter_target_arn,
                    });
                }
            }
        }

        let queue = storage.queue_mut(url)?;
        if !queue.name.is_fifo()
            && attributes.contains_key(&QueueAttribute::ContentBasedDeduplication)
        {
            return Err(ValidationError::InvalidFormat {
                field: QueueAttribute::ContentBasedDeduplication.to_string(),
                message: "only FIFO queues support content-based deduplication".to_string(),
            }
            .into());
        }

        for (attribute, value) in attributes {
            queue.attributes.insert(*attribute, value.clone());
        }
        debug!(queue = %queue.name, count = attributes.len(), "Queue attributes updated");

        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
