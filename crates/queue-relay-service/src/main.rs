//! # Queue-Relay Service
//!
//! Binary entry point for the Queue-Relay HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Starts the HTTP server from queue-relay-api

use queue_relay_api::{start_server, LoggingConfig, ServiceConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable naming an additional configuration file
const CONFIG_FILE_ENV: &str = "QR_CONFIG_FILE";

/// Prefix for configuration overrides, e.g. `QR__SERVER__PORT=9090`
const ENV_PREFIX: &str = "QR";

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources, later ones override earlier ones:
    //  1. /etc/queue-relay/service.yaml
    //  2. ./config/service.yaml
    //  3. The file named by QR_CONFIG_FILE
    //  4. Environment variables prefixed QR__ with `__` as the separator
    //
    // Every field has a default, so missing files are fine. A file that does
    // not parse, or a value of the wrong type, stops the service.
    // -------------------------------------------------------------------------
    let explicit_path = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty());

    let service_config = match load_config(explicit_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            error!(error = %e, "Failed to load service configuration; aborting");
            std::process::exit(3);
        }
    };

    init_logging(&service_config.logging);
    info!("Starting Queue-Relay Service");
    if let Some(path) = &explicit_path {
        info!(path = %path, "Loaded configuration from explicit path");
    }

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        provider = %service_config.queue.provider.provider_type(),
        "Configuration loaded"
    );

    if let Err(e) = start_server(service_config).await {
        error!(error = %e, "Server stopped with an error");
        std::process::exit(e.exit_code());
    }
}

/// Build the service configuration from every configured source
fn load_config(explicit_path: Option<&str>) -> Result<ServiceConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/queue-relay/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path {
        builder = builder.add_source(config::File::with_name(path).required(true));
    }

    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

/// `RUST_LOG` wins over the configured level
fn log_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        EnvFilter::new(format!(
            "queue_relay_service={level},queue_relay_api={level},queue_relay_core={level},\
             queue_relay_runtime={level},tower_http=debug"
        ))
    })
}

fn init_logging(logging: &LoggingConfig) {
    let json = logging.json_format;
    tracing_subscriber::registry()
        .with(log_filter(logging))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
