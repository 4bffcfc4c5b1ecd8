//! Shared fixtures for core tests.

use async_trait::async_trait;
use queue_relay_runtime::{
    InMemoryProvider, Message, ProviderType, QueueAttribute, QueueAttributes, QueueClient,
    QueueConfig, QueueError, QueueName, QueueProvider, QueueUrl, ReceiptHandle, ReceiveOptions,
    ReceivedMessage, SendOptions, SendReceipt, StandardQueueClient,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Queue call observed by [`RecordingProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ChangeVisibility {
        receipt: String,
        timeout_seconds: u32,
    },
    Delete {
        receipt: String,
    },
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub call: Call,
}

/// Switches for provoking failures
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_visibility: AtomicBool,
    pub hide_visibility_timeout: AtomicBool,
}

/// In-memory provider that records visibility changes and deletes
pub struct RecordingProvider {
    inner: InMemoryProvider,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    faults: Arc<Faults>,
}

#[async_trait]
impl QueueProvider for RecordingProvider {
    async fn create_queue(
        &self,
        queue: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueUrl, QueueError> {
        self.inner.create_queue(queue, attributes).await
    }

    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        self.inner.get_queue_url(queue).await
    }

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
        options: &SendOptions,
    ) -> Result<SendReceipt, QueueError> {
        self.inner.send_message(queue, message, options).await
    }

    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.inner.receive_messages(queue, options).await
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        self.record(Call::Delete {
            receipt: receipt.as_str().to_string(),
        });
        self.inner.delete_message(queue, receipt).await
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), QueueError> {
        self.record(Call::ChangeVisibility {
            receipt: receipt.as_str().to_string(),
            timeout_seconds: visibility_timeout_seconds,
        });
        if self.faults.fail_visibility.load(Ordering::SeqCst) {
            return Err(QueueError::ConnectionFailed {
                message: "injected failure".to_string(),
            });
        }
        self.inner
            .change_message_visibility(queue, receipt, visibility_timeout_seconds)
            .await
    }

    async fn get_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &[QueueAttribute],
    ) -> Result<QueueAttributes, QueueError> {
        let mut values = self.inner.get_queue_attributes(queue, attributes).await?;
        if self.faults.hide_visibility_timeout.load(Ordering::SeqCst) {
            values.remove(&QueueAttribute::VisibilityTimeout);
        }
        Ok(values)
    }

    async fn set_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &QueueAttributes,
    ) -> Result<(), QueueError> {
        self.inner.set_queue_attributes(queue, attributes).await
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

impl RecordingProvider {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(RecordedCall {
            at: Instant::now(),
            call,
        });
    }
}

/// Client over a [`RecordingProvider`] plus access to what it recorded
pub struct Harness {
    pub client: Arc<dyn QueueClient>,
    pub faults: Arc<Faults>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Harness {
    pub fn new() -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let faults = Arc::new(Faults::default());
        let provider = RecordingProvider {
            inner: InMemoryProvider::default(),
            calls: calls.clone(),
            faults: faults.clone(),
        };
        let client = StandardQueueClient::new(Box::new(provider), QueueConfig::default());

        Self {
            client: Arc::new(client),
            faults,
            calls,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Visibility changes in order, as `(instant, requested timeout)`
    pub fn visibility_changes(&self) -> Vec<(Instant, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|recorded| match recorded.call {
                Call::ChangeVisibility {
                    timeout_seconds, ..
                } => Some((recorded.at, timeout_seconds)),
                Call::Delete { .. } => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|recorded| matches!(recorded.call, Call::Delete { .. }))
            .collect()
    }

    /// Create a queue with the given visibility timeout
    pub async fn queue(&self, name: &str, visibility_timeout: u32) -> QueueUrl {
        let name = QueueName::new(name.to_string()).unwrap();
        let attributes = QueueAttributes::from([(
            QueueAttribute::VisibilityTimeout,
            visibility_timeout.to_string(),
        )]);
        self.client
            .create_or_get_queue(&name, &attributes)
            .await
            .unwrap()
    }

    pub async fn send(&self, queue: &QueueUrl, body: &str) {
        self.client
            .send_message(queue, Message::new(body), SendOptions::new())
            .await
            .unwrap();
    }

    /// Receive a single message without waiting
    pub async fn receive_one(&self, queue: &QueueUrl) -> ReceivedMessage {
        let mut messages = self
            .client
            .receive_messages(queue, ReceiveOptions::new().with_wait_time_seconds(0))
            .await
            .unwrap();
        assert_eq!(messages.len(), 1, "expected exactly one message");
        messages.remove(0)
    }

    pub async fn attribute(&self, queue: &QueueUrl, attribute: QueueAttribute) -> Option<String> {
        self.client
            .get_queue_attribute(queue, attribute)
            .await
            .unwrap()
    }
}
