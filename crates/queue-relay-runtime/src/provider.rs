//! Provider types and configuration.

use crate::error::ConfigurationError;
use crate::message::MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    AwsSqs,
    InMemory,
}

impl ProviderType {
    /// Get maximum message size for provider
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::AwsSqs => MAX_MESSAGE_SIZE,
            Self::InMemory => MAX_MESSAGE_SIZE,
        }
    }

    /// Name used in logs and health responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsSqs => "aws_sqs",
            Self::InMemory => "in_memory",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for queue client initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub provider: ProviderConfig,
    /// Upper bound for a single provider request, excluding long-poll wait
    pub request_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::InMemory(InMemoryConfig::default()),
            request_timeout_seconds: 30,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "queue.request_timeout_seconds must be greater than zero".to_string(),
            });
        }

        match &self.provider {
            ProviderConfig::AwsSqs(aws) => aws.validate(),
            ProviderConfig::InMemory(memory) => memory.validate(),
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    AwsSqs(AwsSqsConfig),
    InMemory(InMemoryConfig),
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::AwsSqs(_) => ProviderType::AwsSqs,
            Self::InMemory(_) => ProviderType::InMemory,
        }
    }
}

/// AWS SQS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSqsConfig {
    pub region: String,
    /// Falls back to `AWS_ACCESS_KEY_ID` when absent
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Falls back to `AWS_SECRET_ACCESS_KEY` when absent
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Falls back to `AWS_SESSION_TOKEN` when absent
    #[serde(default)]
    pub session_token: Option<String>,
    /// Override for the service endpoint, e.g. `http://localhost:4566`
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl AwsSqsConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.region.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "queue.provider.region".to_string(),
            });
        }

        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint).map_err(|e| ConfigurationError::Invalid {
                message: format!("queue.provider.endpoint '{}' is not a URL: {}", endpoint, e),
            })?;
        }

        Ok(())
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// Messages stored per queue before sends are rejected
    pub max_queue_size: usize,
    /// Visibility timeout for queues created without one
    pub default_visibility_timeout_seconds: u32,
    /// FIFO duplicate detection window
    pub deduplication_window_seconds: u64,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
            default_visibility_timeout_seconds: 30,
            deduplication_window_seconds: 300,
        }
    }
}

impl InMemoryConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_queue_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "queue.provider.max_queue_size must be greater than zero".to_string(),
            });
        }

        if self.default_visibility_timeout_seconds > crate::message::MAX_VISIBILITY_TIMEOUT_SECONDS
        {
            return Err(ConfigurationError::Invalid {
                message: "queue.provider.default_visibility_timeout_seconds exceeds 43200"
                    .to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
