//! Client traits and implementations for queue operations.

use crate::attributes::{QueueAttribute, QueueAttributes, RedrivePolicy};
use crate::error::{QueueError, SerializationError, ValidationError};
use crate::message::{
    Message, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage, SendOptions,
    SendReceipt, MAX_VISIBILITY_TIMEOUT_SECONDS, MAX_WAIT_TIME_SECONDS,
};
use crate::provider::{InMemoryConfig, ProviderConfig, ProviderType, QueueConfig};
use crate::providers::{AwsSqsProvider, InMemoryProvider};
use async_trait::async_trait;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Main interface for queue operations across all providers
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Create a queue, or resolve it by name if creation fails
    async fn create_or_get_queue(
        &self,
        queue: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueUrl, QueueError>;

    /// Look up the URL of an existing queue
    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError>;

    /// Send single message to queue
    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: Message,
        options: SendOptions,
    ) -> Result<SendReceipt, QueueError>;

    /// Receive up to `options.max_messages` messages
    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        options: ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Remove a received message from the queue
    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    /// Reset the visibility timeout of an in-flight message
    async fn change_message_visibility(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), QueueError>;

    /// Get a single queue attribute, `None` when the queue does not report it
    async fn get_queue_attribute(
        &self,
        queue: &QueueUrl,
        attribute: QueueAttribute,
    ) -> Result<Option<String>, QueueError>;

    async fn get_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &[QueueAttribute],
    ) -> Result<QueueAttributes, QueueError>;

    async fn set_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &QueueAttributes,
    ) -> Result<(), QueueError>;

    /// Attach `dead_letter` as the redrive target of `source`
    async fn link_dead_letter_queue(
        &self,
        source: &QueueUrl,
        dead_letter: &QueueUrl,
        max_receive_count: u32,
    ) -> Result<(), QueueError>;

    /// Turn on long polling for an existing queue
    async fn enable_long_polling(
        &self,
        queue: &QueueName,
        wait_time_seconds: u32,
    ) -> Result<QueueUrl, QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Interface implemented by specific queue providers (AWS, in-memory)
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Create a queue; succeeds with the existing URL when attributes match
    async fn create_queue(
        &self,
        queue: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueUrl, QueueError>;

    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError>;

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
        options: &SendOptions,
    ) -> Result<SendReceipt, QueueError>;

    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    async fn change_message_visibility(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), QueueError>;

    /// Read attributes; an empty slice requests all of them
    async fn get_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &[QueueAttribute],
    ) -> Result<QueueAttributes, QueueError>;

    async fn set_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &QueueAttributes,
    ) -> Result<(), QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Factory for creating queue clients with appropriate providers
pub struct QueueClientFactory;

impl QueueClientFactory {
    /// Create queue client from configuration
    pub async fn create_client(config: QueueConfig) -> Result<Box<dyn QueueClient>, QueueError> {
        config.validate()?;

        let provider: Box<dyn QueueProvider> = match &config.provider {
            ProviderConfig::InMemory(in_memory_config) => {
                Box::new(InMemoryProvider::new(in_memory_config.clone()))
            }
            ProviderConfig::AwsSqs(aws_config) => Box::new(AwsSqsProvider::new(
                aws_config.clone(),
                config.request_timeout_seconds,
            )?),
        };

        info!(
            provider = %provider.provider_type(),
            "Queue client created"
        );

        Ok(Box::new(StandardQueueClient::new(provider, config)))
    }

    /// Create test client with in-memory provider
    pub fn create_test_client() -> Box<dyn QueueClient> {
        let provider = InMemoryProvider::new(InMemoryConfig::default());
        let config = QueueConfig::default();
        Box::new(StandardQueueClient::new(Box::new(provider), config))
    }
}

/// Standard queue client implementation
pub struct StandardQueueClient {
    provider: Box<dyn QueueProvider>,
    config: QueueConfig,
}

impl StandardQueueClient {
    /// Create new standard queue client with provider
    pub fn new(provider: Box<dyn QueueProvider>, config: QueueConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn provider_name(&self) -> &'static str {
        self.provider.provider_type().as_str()
    }
}

#[async_trait]
impl QueueClient for StandardQueueClient {
    async fn create_or_get_queue(
        &self,
        queue: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueUrl, QueueError> {
        match self.provider.create_queue(queue, attributes).await {
            Ok(url) => {
                info!(queue = %queue, url = %url, "Queue created");
                Ok(url)
            }
            // Bad input never reaches the service, so a lookup cannot help
            Err(e @ QueueError::ValidationError(_)) => Err(e),
            Err(create_error) => {
                warn!(
                    queue = %queue,
                    provider = self.provider_name(),
                    error = %create_error,
                    "Queue creation failed, looking up existing queue"
                );

                self.provider.get_queue_url(queue).await.inspect_err(|e| {
                    warn!(
                        queue = %queue,
                        provider = self.provider_name(),
                        error = %e,
                        "Queue lookup after failed creation also failed"
                    );
                })
            }
        }
    }

    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        self.provider.get_queue_url(queue).await.inspect_err(|e| {
            warn!(queue = %queue, provider = self.provider_name(), error = %e, "Queue lookup failed");
        })
    }

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: Message,
        options: SendOptions,
    ) -> Result<SendReceipt, QueueError> {
        message.validate(self.provider.provider_type().max_message_size())?;
        if let Some(name) = queue.queue_name().and_then(|n| n.parse::<QueueName>().ok()) {
            options.validate_for(&name)?;
        }

        let receipt = self
            .provider
            .send_message(queue, &message, &options)
            .await
            .inspect_err(|e| {
                warn!(queue = %queue, provider = self.provider_name(), error = %e, "Send failed");
            })?;

        debug!(
            queue = %queue,
            message_id = %receipt.message_id,
            body_md5 = %receipt.body_md5,
            "Message sent"
        );

        Ok(receipt)
    }

    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        options: ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        options.validate()?;

        let messages = self
            .provider
            .receive_messages(queue, &options)
            .await
            .inspect_err(|e| {
                warn!(queue = %queue, provider = self.provider_name(), error = %e, "Receive failed");
            })?;

        debug!(queue = %queue, count = messages.len(), "Messages received");
        Ok(messages)
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        self.provider
            .delete_message(queue, receipt)
            .await
            .inspect_err(|e| {
                warn!(queue = %queue, provider = self.provider_name(), error = %e, "Delete failed");
            })
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), QueueError> {
        if visibility_timeout_seconds > MAX_VISIBILITY_TIMEOUT_SECONDS {
            return Err(ValidationError::out_of_range(
                "visibility_timeout",
                0,
                MAX_VISIBILITY_TIMEOUT_SECONDS as u64,
            )
            .into());
        }

        self.provider
            .change_message_visibility(queue, receipt, visibility_timeout_seconds)
            .await
            .inspect_err(|e| {
                warn!(
                    queue = %queue,
                    provider = self.provider_name(),
                    visibility_timeout_seconds,
                    error = %e,
                    "Visibility change failed"
                );
            })
    }

    async fn get_queue_attribute(
        &self,
        queue: &QueueUrl,
        attribute: QueueAttribute,
    ) -> Result<Option<String>, QueueError> {
        let mut attributes = self.get_queue_attributes(queue, &[attribute]).await?;
        Ok(attributes.remove(&attribute))
    }

    async fn get_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &[QueueAttribute],
    ) -> Result<QueueAttributes, QueueError> {
        self.provider
            .get_queue_attributes(queue, attributes)
            .await
            .inspect_err(|e| {
                warn!(queue = %queue, provider = self.provider_name(), error = %e, "Attribute read failed");
            })
    }

    async fn set_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &QueueAttributes,
    ) -> Result<(), QueueError> {
        for (attribute, value) in attributes {
            attribute.validate_value(value)?;
        }

        self.provider
            .set_queue_attributes(queue, attributes)
            .await
            .inspect_err(|e| {
                warn!(queue = %queue, provider = self.provider_name(), error = %e, "Attribute update failed");
            })
    }

    async fn link_dead_letter_queue(
        &self,
        source: &QueueUrl,
        dead_letter: &QueueUrl,
        max_receive_count: u32,
    ) -> Result<(), QueueError> {
        let arn = self
            .get_queue_attribute(dead_letter, QueueAttribute::QueueArn)
            .await?
            .ok_or_else(|| {
                QueueError::SerializationError(SerializationError::MissingElement {
                    element: QueueAttribute::QueueArn.to_string(),
                })
            })?;

        let policy = RedrivePolicy::new(arn, max_receive_count);
        let attributes =
            QueueAttributes::from([(QueueAttribute::RedrivePolicy, policy.to_json()?)]);
        self.set_queue_attributes(source, &attributes).await?;

        info!(
            source = %source,
            dead_letter = %dead_letter,
            max_receive_count,
            "Dead letter queue linked"
        );

        Ok(())
    }

    async fn enable_long_polling(
        &self,
        queue: &QueueName,
        wait_time_seconds: u32,
    ) -> Result<QueueUrl, QueueError> {
        if wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(ValidationError::out_of_range(
                "wait_time_seconds",
                0,
                MAX_WAIT_TIME_SECONDS as u64,
            )
            .into());
        }

        let url = self.get_queue_url(queue).await?;
        let attributes = QueueAttributes::from([(
            QueueAttribute::ReceiveMessageWaitTimeSeconds,
            wait_time_seconds.to_string(),
        )]);
        self.set_queue_attributes(&url, &attributes).await?;

        info!(queue = %queue, wait_time_seconds, "Long polling enabled");
        Ok(url)
    }

    fn provider_type(&self) -> ProviderType {
        self.provider.provider_type()
    }
}
