//! Common test utilities for queue-relay-api integration tests
//!
//! This module provides:
//! - A test application wrapping the router over an in-memory queue provider
//! - Request builders and response readers

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use queue_relay_api::{create_router, AppState, ServiceConfig, CORRELATION_ID_HEADER};
use queue_relay_core::interrupt_channel;
use queue_relay_runtime::{QueueAttribute, QueueClient, QueueClientFactory, QueueName};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

/// Response status and body text
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TestResponse {
    #[allow(dead_code)]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Router over an in-memory provider with direct access to the queue client
pub struct TestApp {
    pub state: AppState,
    interrupt: watch::Sender<bool>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    #[allow(dead_code)]
    pub fn with_config(config: ServiceConfig) -> Self {
        let client: Arc<dyn QueueClient> = Arc::from(QueueClientFactory::create_test_client());
        let (interrupt, interrupt_rx) = interrupt_channel();
        Self {
            state: AppState::with_simulated_work(config, client, interrupt_rx),
            interrupt,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Raise the shutdown signal for running work
    #[allow(dead_code)]
    pub fn interrupt(&self) {
        self.interrupt.send_replace(true);
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(json_request("POST", uri, body)).await
    }

    #[allow(dead_code)]
    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.send(json_request("PUT", uri, body)).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    #[allow(dead_code)]
    pub async fn receive(&self, uri: &str, correlation_id: &str) -> TestResponse {
        let request = Request::get(uri)
            .header(CORRELATION_ID_HEADER, correlation_id)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    /// Current value of a queue attribute, read through the queue client
    #[allow(dead_code)]
    pub async fn attribute(&self, queue: &str, attribute: QueueAttribute) -> Option<String> {
        let client = &self.state.queue_client;
        let url = client
            .get_queue_url(&QueueName::new(queue.to_string()).unwrap())
            .await
            .unwrap();
        client.get_queue_attribute(&url, attribute).await.unwrap()
    }

    #[allow(dead_code)]
    pub async fn visible_messages(&self, queue: &str) -> String {
        self.attribute(queue, QueueAttribute::ApproximateNumberOfMessages)
            .await
            .unwrap_or_default()
    }

    #[allow(dead_code)]
    pub async fn in_flight_messages(&self, queue: &str) -> String {
        self.attribute(queue, QueueAttribute::ApproximateNumberOfMessagesNotVisible)
            .await
            .unwrap_or_default()
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
