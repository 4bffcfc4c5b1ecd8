//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Longest visibility timeout a queue service accepts (12 hours)
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: u32 = 43_200;

/// Longest long-polling wait a single receive may request
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Longest delivery delay for a single message
pub const MAX_DELAY_SECONDS: u32 = 900;

/// Largest number of messages returned by one receive
pub const MAX_RECEIVE_BATCH: u32 = 10;

/// Largest number of message attributes on one message
pub const MAX_MESSAGE_ATTRIBUTES: usize = 10;

/// Default and largest message size in bytes (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// Suffix that marks a queue as FIFO
pub const FIFO_SUFFIX: &str = ".fifo";

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name with length and character restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        // Validate length (the FIFO suffix counts towards the limit)
        if name.is_empty() || name.len() > 80 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-80 characters".to_string(),
            });
        }

        let base = name.strip_suffix(FIFO_SUFFIX).unwrap_or(&name);
        if base.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "name must not consist of the .fifo suffix alone".to_string(),
            });
        }

        // Validate characters (ASCII alphanumeric, hyphens, underscores)
        if !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, and underscores allowed".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Check whether this names a FIFO queue
    pub fn is_fifo(&self) -> bool {
        self.0.ends_with(FIFO_SUFFIX)
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(value: QueueName) -> Self {
        value.0
    }
}

/// URL identifying a queue at its provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueUrl(String);

impl QueueUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the URL, which both providers use as the queue name
    pub fn queue_name(&self) -> Option<&str> {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
    }
}

impl std::fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for messages within the queue system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque single-delivery token for deleting a message or changing its visibility
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Create new receipt handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Generate a fresh random handle
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create timestamp from milliseconds since the Unix epoch
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = s.parse::<DateTime<Utc>>()?;
        Ok(Self::from_datetime(dt))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to be sent through the queue system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub body: String,
    pub attributes: HashMap<String, String>,
}

impl Message {
    /// Create new message with body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add a string message attribute
    pub fn with_attribute(mut self, key: String, value: String) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Check body and attributes against the limits shared by all providers
    pub fn validate(&self, max_size: usize) -> Result<(), ValidationError> {
        if self.body.is_empty() {
            return Err(ValidationError::Required {
                field: "message_body".to_string(),
            });
        }

        if self.attributes.len() > MAX_MESSAGE_ATTRIBUTES {
            return Err(ValidationError::OutOfRange {
                field: "message_attributes".to_string(),
                message: format!("at most {} attributes allowed", MAX_MESSAGE_ATTRIBUTES),
            });
        }

        if let Some(key) = self.attributes.keys().find(|k| k.trim().is_empty()) {
            return Err(ValidationError::InvalidFormat {
                field: "message_attributes".to_string(),
                message: format!("attribute name '{}' is blank", key),
            });
        }

        let size = self.encoded_size();
        if size > max_size {
            return Err(ValidationError::OutOfRange {
                field: "message_body".to_string(),
                message: format!("{} bytes exceeds maximum of {}", size, max_size),
            });
        }

        Ok(())
    }

    /// Size counted against the message size limit (body plus attribute names and values)
    pub fn encoded_size(&self) -> usize {
        self.body.len()
            + self
                .attributes
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// A message received from the queue with processing metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: String,
    pub attributes: HashMap<String, String>,
    pub receipt_handle: ReceiptHandle,
    pub message_group_id: Option<String>,
    pub receive_count: u32,
    pub sent_at: Timestamp,
    pub delivered_at: Timestamp,
}

impl ReceivedMessage {
    /// Convert back to Message (for forwarding/replaying)
    pub fn message(&self) -> Message {
        Message {
            body: self.body.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Check if message has exceeded maximum receive count
    pub fn has_exceeded_max_receive_count(&self, max_count: u32) -> bool {
        self.receive_count > max_count
    }
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: MessageId,
    /// Hex-encoded MD5 digest of the message body
    pub body_md5: String,
    /// Ordering sequence number assigned by FIFO queues
    pub sequence_number: Option<String>,
}

/// Compute the hex MD5 checksum queue services report for a message body
pub fn body_md5(body: &str) -> String {
    use md5::{Digest, Md5};
    hex::encode(Md5::digest(body.as_bytes()))
}

// ============================================================================
// Send and Receive Options
// ============================================================================

/// Configuration options for sending messages to queues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Seconds before the message becomes visible to receivers
    pub delay_seconds: u32,
    /// Ordering group for FIFO queues
    pub message_group_id: Option<String>,
    /// Duplicate detection ID for FIFO queues
    pub deduplication_id: Option<String>,
}

impl SendOptions {
    /// Create new send options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set delivery delay in seconds
    pub fn with_delay_seconds(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }

    /// Set message group ID for FIFO ordering
    pub fn with_message_group_id(mut self, group_id: String) -> Self {
        self.message_group_id = Some(group_id);
        self
    }

    /// Set duplicate detection ID
    pub fn with_deduplication_id(mut self, id: String) -> Self {
        self.deduplication_id = Some(id);
        self
    }

    /// Validate options against the target queue
    pub fn validate_for(&self, queue: &QueueName) -> Result<(), ValidationError> {
        if self.delay_seconds > MAX_DELAY_SECONDS {
            return Err(ValidationError::out_of_range(
                "delay_seconds",
                0,
                MAX_DELAY_SECONDS as u64,
            ));
        }

        if queue.is_fifo() {
            match self.message_group_id.as_deref() {
                Some(group) if !group.trim().is_empty() => {}
                _ => {
                    return Err(ValidationError::Required {
                        field: "message_group_id".to_string(),
                    })
                }
            }
        }

        Ok(())
    }
}

/// Configuration options for receiving messages from queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Maximum number of messages to receive in a batch
    pub max_messages: u32,
    /// Long-polling wait; `None` uses the queue's configured wait time
    pub wait_time_seconds: Option<u32>,
    /// Visibility timeout for the received messages; `None` uses the queue's
    pub visibility_timeout_seconds: Option<u32>,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time_seconds: None,
            visibility_timeout_seconds: None,
        }
    }
}

impl ReceiveOptions {
    /// Create new receive options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of messages to receive
    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = max;
        self
    }

    /// Set long-polling wait time
    pub fn with_wait_time_seconds(mut self, seconds: u32) -> Self {
        self.wait_time_seconds = Some(seconds);
        self
    }

    /// Override the visibility timeout of received messages
    pub fn with_visibility_timeout_seconds(mut self, seconds: u32) -> Self {
        self.visibility_timeout_seconds = Some(seconds);
        self
    }

    /// Validate against provider-independent receive limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_messages == 0 || self.max_messages > MAX_RECEIVE_BATCH {
            return Err(ValidationError::out_of_range(
                "max_number_of_messages",
                1,
                MAX_RECEIVE_BATCH as u64,
            ));
        }

        if let Some(wait) = self.wait_time_seconds {
            if wait > MAX_WAIT_TIME_SECONDS {
                return Err(ValidationError::out_of_range(
                    "wait_time_seconds",
                    0,
                    MAX_WAIT_TIME_SECONDS as u64,
                ));
            }
        }

        if let Some(visibility) = self.visibility_timeout_seconds {
            if visibility > MAX_VISIBILITY_TIMEOUT_SECONDS {
                return Err(ValidationError::out_of_range(
                    "visibility_timeout",
                    0,
                    MAX_VISIBILITY_TIMEOUT_SECONDS as u64,
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
