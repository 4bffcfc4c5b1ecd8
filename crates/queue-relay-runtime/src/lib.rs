//! # Queue Relay Runtime
//!
//! Queue service collaborator for Queue-Relay, with AWS SQS and in-memory
//! implementations behind one provider-agnostic client.
//!
//! This library provides:
//! - Queue creation with create-or-lookup fallback
//! - Send, receive, delete and visibility-timeout changes
//! - Queue attributes, long polling and dead letter queue linkage
//! - FIFO message groups and duplicate detection
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Identifiers, messages and send/receive options
//! - [`attributes`] - Queue attributes and redrive policy
//! - [`provider`] - Provider types and configuration
//! - [`client`] - Client traits, factory and standard client
//! - [`providers`] - Concrete provider implementations

// Module declarations
pub mod attributes;
pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use attributes::{QueueAttribute, QueueAttributes, RedrivePolicy};
pub use client::{QueueClient, QueueClientFactory, QueueProvider, StandardQueueClient};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage,
    SendOptions, SendReceipt, Timestamp, MAX_VISIBILITY_TIMEOUT_SECONDS,
};
pub use provider::{AwsSqsConfig, InMemoryConfig, ProviderConfig, ProviderType, QueueConfig};
pub use providers::{AwsSqsProvider, InMemoryProvider};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
