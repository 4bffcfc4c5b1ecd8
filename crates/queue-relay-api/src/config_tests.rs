//! Tests for service configuration.

use super::*;
use queue_relay_runtime::{ProviderConfig, ProviderType};

#[test]
fn test_defaults_are_valid() {
    let config = ServiceConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.shutdown_timeout_seconds, 30);
    assert!(config.server.enable_cors);
    assert_eq!(config.processing.extension_increment_seconds, 10);
    assert_eq!(config.processing.work_unit(), Duration::from_millis(100));
    assert_eq!(config.processing.dead_letter_max_receive_count, 5);
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json_format);
    assert_eq!(config.queue.provider.provider_type(), ProviderType::InMemory);
}

#[test]
fn test_zero_port_is_rejected() {
    let config = ServiceConfig {
        server: ServerConfig {
            port: 0,
            ..Default::default()
        },
        ..Default::default()
    };

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_processing_limits_are_enforced() {
    let zero_increment = ProcessingConfig {
        extension_increment_seconds: 0,
        ..Default::default()
    };
    let zero_work_unit = ProcessingConfig {
        work_unit_millis: 0,
        ..Default::default()
    };
    let no_receives = ProcessingConfig {
        dead_letter_max_receive_count: 0,
        ..Default::default()
    };
    let too_many_receives = ProcessingConfig {
        dead_letter_max_receive_count: 1001,
        ..Default::default()
    };

    for processing in [zero_increment, zero_work_unit, no_receives, too_many_receives] {
        let config = ServiceConfig {
            processing,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

#[test]
fn test_partial_yaml_style_json_uses_defaults() {
    let json = serde_json::json!({
        "server": { "port": 9090 },
        "processing": { "failure_policy": "leave_for_redelivery" },
        "queue": {
            "provider": { "type": "aws_sqs", "region": "us-west-2" }
        }
    });

    let config: ServiceConfig = serde_json::from_value(json).unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(
        config.processing.failure_policy,
        FailurePolicy::LeaveForRedelivery
    );
    assert_eq!(config.processing.extension_increment_seconds, 10);
    match config.queue.provider {
        ProviderConfig::AwsSqs(aws) => assert_eq!(aws.region, "us-west-2"),
        other => panic!("Expected AWS provider, got: {:?}", other),
    }
}

#[test]
fn test_processor_config_mirrors_processing_section() {
    let processing = ProcessingConfig {
        extension_increment_seconds: 15,
        failure_policy: FailurePolicy::LeaveForRedelivery,
        ..Default::default()
    };

    let processor = processing.processor_config();
    assert_eq!(processor.extension_increment_seconds, 15);
    assert_eq!(processor.failure_policy, FailurePolicy::LeaveForRedelivery);
}
