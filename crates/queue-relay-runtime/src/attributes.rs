//! Queue attributes and redrive policy.

use crate::error::{SerializationError, ValidationError};
use crate::message::{
    MAX_DELAY_SECONDS, MAX_MESSAGE_SIZE, MAX_VISIBILITY_TIMEOUT_SECONDS, MAX_WAIT_TIME_SECONDS,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Smallest accepted `MaximumMessageSize`
pub const MIN_MESSAGE_SIZE: u64 = 1024;

/// Attribute map exchanged with providers
pub type QueueAttributes = BTreeMap<QueueAttribute, String>;

/// Queue attributes understood by the runtime, named as the queue service names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueueAttribute {
    VisibilityTimeout,
    ReceiveMessageWaitTimeSeconds,
    DelaySeconds,
    MaximumMessageSize,
    QueueArn,
    RedrivePolicy,
    FifoQueue,
    ContentBasedDeduplication,
    ApproximateNumberOfMessages,
    ApproximateNumberOfMessagesNotVisible,
}

impl QueueAttribute {
    pub const ALL: [QueueAttribute; 10] = [
        Self::VisibilityTimeout,
        Self::ReceiveMessageWaitTimeSeconds,
        Self::DelaySeconds,
        Self::MaximumMessageSize,
        Self::QueueArn,
        Self::RedrivePolicy,
        Self::FifoQueue,
        Self::ContentBasedDeduplication,
        Self::ApproximateNumberOfMessages,
        Self::ApproximateNumberOfMessagesNotVisible,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VisibilityTimeout => "VisibilityTimeout",
            Self::ReceiveMessageWaitTimeSeconds => "ReceiveMessageWaitTimeSeconds",
            Self::DelaySeconds => "DelaySeconds",
            Self::MaximumMessageSize => "MaximumMessageSize",
            Self::QueueArn => "QueueArn",
            Self::RedrivePolicy => "RedrivePolicy",
            Self::FifoQueue => "FifoQueue",
            Self::ContentBasedDeduplication => "ContentBasedDeduplication",
            Self::ApproximateNumberOfMessages => "ApproximateNumberOfMessages",
            Self::ApproximateNumberOfMessagesNotVisible => "ApproximateNumberOfMessagesNotVisible",
        }
    }

    /// Attributes computed by the queue service that callers cannot set
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::QueueArn
                | Self::ApproximateNumberOfMessages
                | Self::ApproximateNumberOfMessagesNotVisible
        )
    }

    /// Validate a value supplied for this attribute on create or set
    pub fn validate_value(&self, value: &str) -> Result<(), ValidationError> {
        match self {
            Self::VisibilityTimeout => {
                parse_in_range(self, value, 0, MAX_VISIBILITY_TIMEOUT_SECONDS as u64)
            }
            Self::ReceiveMessageWaitTimeSeconds => {
                parse_in_range(self, value, 0, MAX_WAIT_TIME_SECONDS as u64)
            }
            Self::DelaySeconds => parse_in_range(self, value, 0, MAX_DELAY_SECONDS as u64),
            Self::MaximumMessageSize => {
                parse_in_range(self, value, MIN_MESSAGE_SIZE, MAX_MESSAGE_SIZE as u64)
            }
            Self::FifoQueue | Self::ContentBasedDeduplication => match value {
                "true" | "false" => Ok(()),
                _ => Err(ValidationError::InvalidFormat {
                    field: self.as_str().to_string(),
                    message: "must be 'true' or 'false'".to_string(),
                }),
            },
            Self::RedrivePolicy => RedrivePolicy::from_json(value).map(|_| ()).map_err(|e| {
                ValidationError::InvalidFormat {
                    field: self.as_str().to_string(),
                    message: e.to_string(),
                }
            }),
            Self::QueueArn
            | Self::ApproximateNumberOfMessages
            | Self::ApproximateNumberOfMessagesNotVisible => {
                Err(ValidationError::InvalidFormat {
                    field: self.as_str().to_string(),
                    message: "attribute is read-only".to_string(),
                })
            }
        }
    }
}

fn parse_in_range(
    attribute: &QueueAttribute,
    value: &str,
    min: u64,
    max: u64,
) -> Result<(), ValidationError> {
    match value.parse::<u64>() {
        Ok(v) if (min..=max).contains(&v) => Ok(()),
        _ => Err(ValidationError::out_of_range(attribute.as_str(), min, max)),
    }
}

impl std::fmt::Display for QueueAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueAttribute {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|attribute| attribute.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "attribute_name".to_string(),
                message: format!("unknown queue attribute '{}'", s),
            })
    }
}

/// Rule that moves a message to a dead-letter queue after repeated receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    #[serde(
        serialize_with = "count_as_string",
        deserialize_with = "count_from_string_or_number"
    )]
    pub max_receive_count: u32,
    pub dead_letter_target_arn: String,
}

impl RedrivePolicy {
    pub fn new(dead_letter_target_arn: impl Into<String>, max_receive_count: u32) -> Self {
        Self {
            max_receive_count,
            dead_letter_target_arn: dead_letter_target_arn.into(),
        }
    }

    /// Render as the JSON document stored in the `RedrivePolicy` attribute
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON stored in the `RedrivePolicy` attribute
    pub fn from_json(value: &str) -> Result<Self, SerializationError> {
        let policy: Self = serde_json::from_str(value)?;
        if policy.max_receive_count == 0 {
            return Err(SerializationError::InvalidAttribute {
                key: "maxReceiveCount".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(policy)
    }
}

fn count_as_string<S: Serializer>(count: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&count.to_string())
}

fn count_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[path = "attributes_tests.rs"]
mod tests;
