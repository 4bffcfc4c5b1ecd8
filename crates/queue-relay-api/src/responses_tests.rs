//! Tests for request parsing and response shapes.

use super::*;
use serde_json::json;

#[test]
fn test_create_queue_accepts_numbers_and_strings() {
    let from_strings: CreateQueueRequest = serde_json::from_value(json!({
        "queueName": "orders",
        "visibilityTimeOut": "30",
        "longPolling": "true",
        "waitTimeSeconds": "20"
    }))
    .unwrap();
    let from_numbers: CreateQueueRequest = serde_json::from_value(json!({
        "queueName": "orders",
        "visibilityTimeOut": 30,
        "longPolling": true,
        "waitTimeSeconds": 20
    }))
    .unwrap();

    for request in [from_strings, from_numbers] {
        assert_eq!(request.queue_name, "orders");
        assert_eq!(request.visibility_timeout, Some(30));
        assert!(request.long_polling);
        assert_eq!(request.wait_time_seconds, Some(20));
    }
}

#[test]
fn test_create_queue_optional_fields_default() {
    let request: CreateQueueRequest =
        serde_json::from_value(json!({ "queueName": "orders" })).unwrap();

    assert_eq!(request.visibility_timeout, None);
    assert!(!request.long_polling);
    assert_eq!(request.wait_time_seconds, None);
}

#[test]
fn test_blank_numeric_string_is_absent() {
    let request: CreateQueueRequest = serde_json::from_value(json!({
        "queueName": "orders",
        "visibilityTimeOut": "  "
    }))
    .unwrap();

    assert_eq!(request.visibility_timeout, None);
}

#[test]
fn test_non_numeric_values_are_rejected() {
    let result: Result<CreateQueueRequest, _> = serde_json::from_value(json!({
        "queueName": "orders",
        "visibilityTimeOut": "thirty"
    }));
    assert!(result.is_err());

    let negative: Result<LongPollingRequest, _> =
        serde_json::from_value(json!({ "waitTimeSeconds": -1 }));
    assert!(negative.is_err());

    let missing: Result<LongPollingRequest, _> = serde_json::from_value(json!({}));
    assert!(missing.is_err());
}

#[test]
fn test_send_message_attribute_requires_key_and_value() {
    let request: SendMessageRequest = serde_json::from_value(json!({
        "queueName": "orders",
        "messageBody": "cost:3",
        "messageAttributeKey": "origin",
        "messageAttributeValue": "web"
    }))
    .unwrap();
    assert_eq!(
        request.attribute(),
        Some(("origin".to_string(), "web".to_string()))
    );

    let blank_value: SendMessageRequest = serde_json::from_value(json!({
        "queueName": "orders",
        "messageBody": "cost:3",
        "messageAttributeKey": "origin",
        "messageAttributeValue": " "
    }))
    .unwrap();
    assert_eq!(blank_value.attribute(), None);
}

#[test]
fn test_send_message_optional_identifiers() {
    let request: SendMessageRequest = serde_json::from_value(json!({
        "queueName": "orders.fifo",
        "messageBody": "cost:3",
        "delay": "5",
        "messageGroupId": "group-1",
        "messageDeduplicationId": ""
    }))
    .unwrap();

    assert_eq!(request.delay, Some(5));
    assert_eq!(request.group_id(), Some("group-1"));
    assert_eq!(request.deduplication_id(), None);
}

#[test]
fn test_processed_message_response_shape() {
    let response = ProcessedMessageResponse {
        message: MessageResponse {
            message_id: "m-1".to_string(),
            message_body: "cost:3".to_string(),
            queue_name: "orders".to_string(),
        },
        status: ProcessingStatus::AlreadyProcessed,
    };

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "messageId": "m-1",
            "messageBody": "cost:3",
            "queueName": "orders",
            "status": "ALREADY_PROCESSED"
        })
    );
}
