//! Request bodies, query parameters and response types for the API.
//!
//! Numeric request fields accept either a JSON number or a string holding
//! one, since existing clients send `"30"` as often as `30`.

use queue_relay_core::{MessageResponse, ProcessingOutcome, ProcessingStatus};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Request Types
// ============================================================================

/// Body of `POST /queues`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueueRequest {
    pub queue_name: String,

    #[serde(default, rename = "visibilityTimeOut", deserialize_with = "optional_u32")]
    pub visibility_timeout: Option<u32>,

    #[serde(default, deserialize_with = "flexible_bool")]
    pub long_polling: bool,

    #[serde(default, deserialize_with = "optional_u32")]
    pub wait_time_seconds: Option<u32>,
}

/// Body of `PUT /queues/{queueName}/long-polling`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongPollingRequest {
    #[serde(deserialize_with = "required_u32")]
    pub wait_time_seconds: u32,
}

/// Body of `POST /deadletter`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRequest {
    pub queue_name: String,

    #[serde(default, deserialize_with = "optional_u32")]
    pub queue_visibility_timeout: Option<u32>,

    pub dl_queue_name: String,

    #[serde(default, deserialize_with = "optional_u32")]
    pub dl_queue_visibility_timeout: Option<u32>,
}

/// Body of `POST /messages`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub queue_name: String,
    pub message_body: String,

    #[serde(default)]
    pub message_attribute_key: Option<String>,

    #[serde(default)]
    pub message_attribute_value: Option<String>,

    #[serde(default, deserialize_with = "optional_u32")]
    pub delay: Option<u32>,

    #[serde(default)]
    pub message_group_id: Option<String>,

    #[serde(default)]
    pub message_deduplication_id: Option<String>,
}

impl SendMessageRequest {
    /// The message attribute, present only when both key and value are non-blank
    pub fn attribute(&self) -> Option<(String, String)> {
        let key = non_blank(self.message_attribute_key.as_deref())?;
        let value = non_blank(self.message_attribute_value.as_deref())?;
        Some((key.to_string(), value.to_string()))
    }

    pub fn group_id(&self) -> Option<&str> {
        non_blank(self.message_group_id.as_deref())
    }

    pub fn deduplication_id(&self) -> Option<&str> {
        non_blank(self.message_deduplication_id.as_deref())
    }
}

/// Query parameters of `GET /messages`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessagesQuery {
    pub queue_name: String,

    #[serde(default, deserialize_with = "optional_u32")]
    pub max_number_of_messages: Option<u32>,

    #[serde(default, deserialize_with = "optional_u32")]
    pub wait_time_seconds: Option<u32>,

    #[serde(default, deserialize_with = "flexible_bool")]
    pub visibility_timeout_extension_allowed: bool,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Response Types
// ============================================================================

/// Entry in the `GET /messages` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMessageResponse {
    #[serde(flatten)]
    pub message: MessageResponse,
    pub status: ProcessingStatus,
}

impl From<ProcessingOutcome> for ProcessedMessageResponse {
    fn from(outcome: ProcessingOutcome) -> Self {
        Self {
            message: outcome.response,
            status: outcome.status,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub timestamp: String,
}

// ============================================================================
// Lenient Field Parsing
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    /// `Ok(None)` for a blank string
    fn into_u32<E: serde::de::Error>(self) -> Result<Option<u32>, E> {
        let value = match self {
            NumberOrString::Number(n) => n,
            NumberOrString::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                text.parse::<u64>()
                    .map_err(|_| E::custom(format!("expected a number, found \"{text}\"")))?
            }
        };

        u32::try_from(value)
            .map(Some)
            .map_err(|_| E::custom(format!("number {value} is out of range")))
    }
}

fn optional_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(value) => value.into_u32(),
        None => Ok(None),
    }
}

fn required_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?
        .into_u32()?
        .ok_or_else(|| serde::de::Error::custom("expected a number, found an empty string"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Text(String),
}

/// Accepts `true`/`false` or a string; only a case-insensitive `"true"` is true
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<BoolOrString>::deserialize(deserializer)? {
        Some(BoolOrString::Bool(value)) => value,
        Some(BoolOrString::Text(text)) => text.trim().eq_ignore_ascii_case("true"),
        None => false,
    })
}

#[cfg(test)]
#[path = "responses_tests.rs"]
mod tests;
