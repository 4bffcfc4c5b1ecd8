//! # Queue-Relay HTTP Service
//!
//! HTTP server for managing queues and processing their messages.
//!
//! This service provides:
//! - Queue creation, long polling and dead letter queue linkage
//! - Message sending
//! - Receiving and processing a batch of messages with visibility extension
//! - Health check endpoint

pub mod config;
pub mod errors;
pub mod responses;

pub use config::{LoggingConfig, ProcessingConfig, ServerConfig, ServiceConfig};
pub use errors::{ApiError, ConfigError, ServiceError};
pub use queue_relay_core::FailurePolicy;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use queue_relay_core::{
    interrupt_channel, BatchRequest, CorrelationId, InMemoryIdempotencyStore, MessageResponse,
    SimulatedWorkload, VisibilityExtendingProcessor,
};
use queue_relay_runtime::{
    Message, QueueAttribute, QueueAttributes, QueueClient, QueueClientFactory, QueueName,
    SendOptions,
};
use responses::{
    CreateQueueRequest, DeadLetterRequest, HealthResponse, LongPollingRequest,
    ProcessedMessageResponse, ReceiveMessagesQuery, SendMessageRequest,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

/// Header carrying the caller's correlation id for message processing
pub const CORRELATION_ID_HEADER: &str = "RequestCorrelationId";

/// Default number of messages received per `GET /messages`
pub const DEFAULT_MAX_MESSAGES: u32 = 1;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Queue service client shared by all handlers
    pub queue_client: Arc<dyn QueueClient>,

    /// Processor for received messages
    pub processor: Arc<VisibilityExtendingProcessor>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        queue_client: Arc<dyn QueueClient>,
        processor: Arc<VisibilityExtendingProcessor>,
    ) -> Self {
        Self {
            config,
            queue_client,
            processor,
        }
    }

    /// Build the processor from configuration with simulated work and an
    /// in-memory idempotency ledger.
    ///
    /// Raising `interrupt` stops all running work.
    pub fn with_simulated_work(
        config: ServiceConfig,
        queue_client: Arc<dyn QueueClient>,
        interrupt: watch::Receiver<bool>,
    ) -> Self {
        let workload = Arc::new(SimulatedWorkload::new(
            config.processing.work_unit(),
            interrupt,
        ));
        let processor = Arc::new(VisibilityExtendingProcessor::new(
            queue_client.clone(),
            Arc::new(InMemoryIdempotencyStore::new()),
            workload,
            config.processing.processor_config(),
        ));

        Self::new(config, queue_client, processor)
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// JSON body whose rejection is reported as an [`ApiError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is reported as an [`ApiError`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ============================================================================
// Router and Server
// ============================================================================

/// Create the HTTP router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let queue_routes = Router::new()
        .route("/queues", post(create_queue))
        .route("/queues/{queue_name}/long-polling", put(enable_long_polling))
        .route("/deadletter", post(create_dead_letter_queue));

    let message_routes = Router::new().route("/messages", post(send_message).get(receive_messages));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let mut router = Router::new()
        .merge(queue_routes)
        .merge(message_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        );

    if state.config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Start HTTP server
///
/// Runs until SIGINT or SIGTERM. On shutdown running work is interrupted and
/// in-flight requests get `server.shutdown_timeout_seconds` to complete.
pub async fn start_server(config: ServiceConfig) -> Result<(), ServiceError> {
    let queue_client = QueueClientFactory::create_client(config.queue.clone())
        .await
        .map_err(ConfigError::from)?;
    let queue_client: Arc<dyn QueueClient> = Arc::from(queue_client);

    let (interrupt, interrupt_rx) = interrupt_channel();
    let state = AppState::with_simulated_work(config.clone(), queue_client, interrupt_rx);
    let app = create_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(
        address = %address,
        provider = %config.queue.provider.provider_type(),
        "Starting HTTP server"
    );

    let shutdown_timeout = config.server.shutdown_timeout();
    let stop_accepting = Arc::new(Notify::new());
    let graceful = {
        let stop_accepting = stop_accepting.clone();
        async move { stop_accepting.notified().await }
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        _ = shutdown_signal() => {
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Initiating graceful shutdown"
            );
            if interrupt.send(true).is_err() {
                warn!("No running work to interrupt");
            }
            stop_accepting.notify_one();

            match tokio::time::timeout(shutdown_timeout, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("In-flight requests did not finish before the shutdown timeout");
                    Ok(())
                }
            }
        }
    };

    result.map_err(|e| ServiceError::ServerFailed {
        message: e.to_string(),
    })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Queue Handlers
// ============================================================================

/// Create a queue, or resolve it when it already exists
#[instrument(skip(state, request), fields(queue = %request.queue_name))]
async fn create_queue(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateQueueRequest>,
) -> Result<(StatusCode, String), ApiError> {
    let name = QueueName::new(request.queue_name)?;

    let mut attributes = QueueAttributes::new();
    if let Some(timeout) = request.visibility_timeout {
        attributes.insert(QueueAttribute::VisibilityTimeout, timeout.to_string());
    }
    if request.long_polling {
        if let Some(wait) = request.wait_time_seconds {
            attributes.insert(QueueAttribute::ReceiveMessageWaitTimeSeconds, wait.to_string());
        }
    }

    let url = state
        .queue_client
        .create_or_get_queue(&name, &attributes)
        .await?;

    let visibility_timeout = match request.visibility_timeout {
        Some(timeout) => timeout.to_string(),
        None => state
            .queue_client
            .get_queue_attribute(&url, QueueAttribute::VisibilityTimeout)
            .await?
            .unwrap_or_default(),
    };

    info!(url = %url, visibility_timeout = %visibility_timeout, "Queue ready");

    Ok((
        StatusCode::CREATED,
        format!(
            "Queue name {} created with visibilityTimeout {} with url {}",
            name, visibility_timeout, url
        ),
    ))
}

/// Turn on long polling for an existing queue
#[instrument(skip(state, request))]
async fn enable_long_polling(
    State(state): State<AppState>,
    Path(queue_name): Path<String>,
    ApiJson(request): ApiJson<LongPollingRequest>,
) -> Result<(StatusCode, String), ApiError> {
    let name = QueueName::new(queue_name)?;

    let url = state
        .queue_client
        .enable_long_polling(&name, request.wait_time_seconds)
        .await?;

    info!(url = %url, wait_time_seconds = request.wait_time_seconds, "Long polling enabled");

    Ok((
        StatusCode::OK,
        format!(
            "Long polling enabled on queue {} with waitTimeSeconds {} with url {}",
            name, request.wait_time_seconds, url
        ),
    ))
}

/// Create a source queue and a dead letter queue, and link them
#[instrument(
    skip(state, request),
    fields(queue = %request.queue_name, dead_letter_queue = %request.dl_queue_name)
)]
async fn create_dead_letter_queue(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeadLetterRequest>,
) -> Result<(StatusCode, String), ApiError> {
    let source = QueueName::new(request.queue_name)?;
    let dead_letter = QueueName::new(request.dl_queue_name)?;

    let source_url = state
        .queue_client
        .create_or_get_queue(&source, &visibility_attributes(request.queue_visibility_timeout))
        .await?;
    let dead_letter_url = state
        .queue_client
        .create_or_get_queue(
            &dead_letter,
            &visibility_attributes(request.dl_queue_visibility_timeout),
        )
        .await?;

    let max_receive_count = state.config.processing.dead_letter_max_receive_count;
    state
        .queue_client
        .link_dead_letter_queue(&source_url, &dead_letter_url, max_receive_count)
        .await?;

    info!(max_receive_count, "Dead letter queue linked");

    Ok((
        StatusCode::CREATED,
        "Dead Letter Queue created and added to source queue".to_string(),
    ))
}

fn visibility_attributes(visibility_timeout: Option<u32>) -> QueueAttributes {
    visibility_timeout
        .map(|timeout| (QueueAttribute::VisibilityTimeout, timeout.to_string()))
        .into_iter()
        .collect()
}

// ============================================================================
// Message Handlers
// ============================================================================

/// Send a message, creating the queue when needed
#[instrument(skip(state, request), fields(queue = %request.queue_name))]
async fn send_message(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let name = QueueName::new(request.queue_name.clone())?;
    let url = state
        .queue_client
        .create_or_get_queue(&name, &QueueAttributes::new())
        .await?;

    let mut message = Message::new(request.message_body.clone());
    if let Some((key, value)) = request.attribute() {
        message = message.with_attribute(key, value);
    }

    let mut options = SendOptions::new();
    if let Some(delay) = request.delay {
        options = options.with_delay_seconds(delay);
    }
    if name.is_fifo() {
        if let Some(group_id) = request.group_id() {
            options = options.with_message_group_id(group_id.to_string());
        }
        if let Some(deduplication_id) = request.deduplication_id() {
            options = options.with_deduplication_id(deduplication_id.to_string());
        }
    }

    let receipt = state
        .queue_client
        .send_message(&url, message, options)
        .await?;

    info!(message_id = %receipt.message_id, "Message sent");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message_id: receipt.message_id.as_str().to_string(),
            message_body: receipt.body_md5,
            queue_name: name.as_str().to_string(),
        }),
    ))
}

/// Receive and process a batch of messages
#[instrument(skip(state, headers, query), fields(queue = %query.queue_name))]
async fn receive_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<ReceiveMessagesQuery>,
) -> Result<(StatusCode, Json<Vec<ProcessedMessageResponse>>), ApiError> {
    let correlation_id = correlation_id_from(&headers)?;

    let request = BatchRequest {
        queue_name: QueueName::new(query.queue_name)?,
        max_messages: query.max_number_of_messages.unwrap_or(DEFAULT_MAX_MESSAGES),
        wait_time_seconds: query.wait_time_seconds,
        extension_allowed: query.visibility_timeout_extension_allowed,
        correlation_id,
    };

    let outcomes = state.processor.process_batch(&request).await?;
    info!(
        correlation_id = %request.correlation_id,
        processed = outcomes.len(),
        "Batch processed"
    );

    Ok((
        StatusCode::CREATED,
        Json(outcomes.into_iter().map(ProcessedMessageResponse::from).collect()),
    ))
}

/// Correlation id from the request header, or a fresh one when absent
fn correlation_id_from(headers: &HeaderMap) -> Result<CorrelationId, ApiError> {
    match headers.get(CORRELATION_ID_HEADER) {
        Some(value) => {
            let value = value.to_str().map_err(|_| ApiError::InvalidBody {
                message: format!("{CORRELATION_ID_HEADER} header is not valid text"),
            })?;
            if value.trim().is_empty() {
                return Ok(CorrelationId::generate());
            }
            Ok(CorrelationId::new(value)?)
        }
        None => Ok(CorrelationId::generate()),
    }
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        provider: state.queue_client.provider_type().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
))]
async fn request_logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms,
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms,
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms,
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
