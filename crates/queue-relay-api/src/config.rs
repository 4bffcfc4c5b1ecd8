//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use queue_relay_core::{FailurePolicy, ProcessorConfig};
use queue_relay_runtime::QueueConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Queue provider settings
    pub queue: QueueConfig,

    /// Message processing settings
    pub processing: ProcessingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check every section for values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.processing.validate()?;
        self.queue
            .validate()
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must not be 0".to_string(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Message processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Seconds between visibility extensions, also added to each requested timeout
    pub extension_increment_seconds: u32,

    /// Duration of one unit of simulated work
    pub work_unit_millis: u64,

    /// Handling of messages whose processing failed
    pub failure_policy: FailurePolicy,

    /// Receives before a message moves to a linked dead letter queue
    pub dead_letter_max_receive_count: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            extension_increment_seconds: 10,
            work_unit_millis: 100,
            failure_policy: FailurePolicy::DeleteOnFailure,
            dead_letter_max_receive_count: 5,
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.extension_increment_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "processing.extension_increment_seconds must be at least 1".to_string(),
            });
        }
        if self.work_unit_millis == 0 {
            return Err(ConfigError::Invalid {
                message: "processing.work_unit_millis must be at least 1".to_string(),
            });
        }
        if !(1..=1000).contains(&self.dead_letter_max_receive_count) {
            return Err(ConfigError::Invalid {
                message: "processing.dead_letter_max_receive_count must be between 1 and 1000"
                    .to_string(),
            });
        }
        Ok(())
    }

    pub fn work_unit(&self) -> Duration {
        Duration::from_millis(self.work_unit_millis)
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            extension_increment_seconds: self.extension_increment_seconds,
            failure_policy: self.failure_policy,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
