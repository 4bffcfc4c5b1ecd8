//! Tests for core identifier types.

use super::*;

#[test]
fn test_correlation_id_rejects_blank_values() {
    assert_eq!(CorrelationId::new(""), Err(InvalidCorrelationId));
    assert_eq!(CorrelationId::new("   "), Err(InvalidCorrelationId));
}

#[test]
fn test_correlation_id_keeps_caller_value() {
    let id: CorrelationId = "req-42".parse().unwrap();
    assert_eq!(id.as_str(), "req-42");
    assert_eq!(id.to_string(), "req-42");
}

#[test]
fn test_generated_correlation_ids_are_uuids() {
    let first = CorrelationId::generate();
    let second = CorrelationId::generate();

    assert_ne!(first, second);
    let parsed = uuid::Uuid::parse_str(first.as_str()).unwrap();
    assert_eq!(parsed.get_version_num(), 4);
}

#[test]
fn test_correlation_id_serializes_as_plain_string() {
    let id = CorrelationId::new("abc").unwrap();
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");

    let blank: Result<CorrelationId, _> = serde_json::from_str("\"\"");
    assert!(blank.is_err());
}
