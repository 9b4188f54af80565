//! # AgentFix HTTP Service
//!
//! HTTP server that receives GitHub webhooks and turns pull request reviews
//! that request changes into remediation dispatches.
//!
//! Surface:
//! - `GET /health` liveness probe
//! - `POST /webhooks/github` with signature verification over the raw body
//! - Request logging with correlation ids
//! - Graceful shutdown on SIGINT and SIGTERM

pub mod errors;
pub mod responses;

use agentfix_core::dispatch::ReviewDispatcher;
use agentfix_core::{AgentFixConfig, AgentFixResult, DispatchOutcome, Requirement};
use agentfix_github::webhook::{
    ChangesRequestedReview, SignatureValidator, WebhookEvent, DELIVERY_HEADER, EVENT_HEADER,
    SIGNATURE_HEADER,
};
use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::future::IntoFuture;
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn, Instrument};

pub use errors::{ServiceError, WebhookHandlerError};
pub use responses::{AckResponse, HealthResponse};

/// Path of the GitHub webhook endpoint.
pub const WEBHOOK_PATH: &str = "/webhooks/github";

/// Correlation id header read from requests and echoed on responses.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

// ============================================================================
// Review Handling Seam
// ============================================================================

/// Handles an actionable review delivery.
#[async_trait]
pub trait ReviewEventHandler: Send + Sync {
    async fn handle_review(&self, review: &ChangesRequestedReview)
        -> AgentFixResult<DispatchOutcome>;
}

#[async_trait]
impl ReviewEventHandler for ReviewDispatcher {
    async fn handle_review(
        &self,
        review: &ChangesRequestedReview,
    ) -> AgentFixResult<DispatchOutcome> {
        self.handle(review).await
    }
}

// ============================================================================
// Application State
// ============================================================================

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Verifies `X-Hub-Signature-256` against the raw body
    pub validator: SignatureValidator,

    /// Actionable reviews are acknowledged without dispatch when false
    pub auto_fix_enabled: bool,

    /// Dispatches actionable reviews
    pub reviews: Arc<dyn ReviewEventHandler>,

    /// Largest accepted request body in bytes
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(
        validator: SignatureValidator,
        auto_fix_enabled: bool,
        reviews: Arc<dyn ReviewEventHandler>,
        max_body_size: usize,
    ) -> Self {
        Self {
            validator,
            auto_fix_enabled,
            reviews,
            max_body_size,
        }
    }

    /// Build state for the configured GitHub App.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Configuration` when the webhook secret or app
    ///   credentials are missing
    /// - `ServiceError::Startup` when the private key cannot be used
    pub fn from_config(config: &AgentFixConfig) -> Result<Self, ServiceError> {
        config.validate(&[Requirement::Webhook, Requirement::AppAuth])?;

        let secret = config
            .github_app
            .webhook_secret
            .as_ref()
            .map(|s| s.expose().to_string())
            .unwrap_or_default();
        let reviews = ReviewDispatcher::from_config(config)?;

        Ok(Self::new(
            SignatureValidator::new(secret),
            config.auto_fix.enabled,
            Arc::new(reviews),
            config.server.max_body_size,
        ))
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Routes plus the tracing, correlation and body-limit layers.
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.max_body_size;

    Router::new()
        .route("/health", get(handle_health_check))
        .route(WEBHOOK_PATH, post(handle_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

/// Serve `state` on the configured address.
///
/// Runs until SIGINT or SIGTERM. In-flight requests get
/// `shutdown_timeout_seconds` to finish before the server stops.
pub async fn start_server(config: &AgentFixConfig, state: AppState) -> Result<(), ServiceError> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
        ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        }
    })?;

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!(address = %addr, auto_fix = state.auto_fix_enabled, "Starting HTTP server");

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let signalled = Arc::new(tokio::sync::Notify::new());
    let trigger = signalled.clone();

    let server = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let signal = termination_signal().await;
            info!(
                signal,
                timeout_seconds = shutdown_timeout.as_secs(),
                "Draining in-flight requests"
            );
            trigger.notify_one();
        })
        .into_future();
    let drain_deadline = async move {
        signalled.notified().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?,
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping in-flight requests"
            );
        }
    }

    info!("HTTP server stopped");
    Ok(())
}

/// Resolves with the name of the first termination signal delivered.
async fn termination_signal() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGINT");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness probe
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// `POST /webhooks/github`.
///
/// 1. Verify the signature over the raw body
/// 2. Parse and classify the delivery
/// 3. Reply to pings, acknowledge ignored events with 202
/// 4. Dispatch actionable reviews and reply 200 or 502 with the outcome
#[instrument(skip(state, headers, body), fields(event_type, delivery_id))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookHandlerError> {
    let event_type = header_str(&headers, EVENT_HEADER);
    let span = tracing::Span::current();
    span.record("event_type", event_type.unwrap_or("none"));
    span.record("delivery_id", header_str(&headers, DELIVERY_HEADER).unwrap_or("none"));

    if !state
        .validator
        .validate(&body, header_str(&headers, SIGNATURE_HEADER))
    {
        return Err(WebhookHandlerError::InvalidSignature);
    }

    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| WebhookHandlerError::InvalidPayload {
            message: e.to_string(),
        })?;
    let event = WebhookEvent::classify(event_type, &payload).map_err(|e| {
        WebhookHandlerError::InvalidPayload {
            message: e.to_string(),
        }
    })?;

    match event {
        WebhookEvent::Ping => Ok(ack(StatusCode::OK, responses::PONG)),
        WebhookEvent::Ignored { reason } => {
            debug!(reason = %reason, "Ignoring webhook delivery");
            Ok(ack(StatusCode::ACCEPTED, responses::EVENT_IGNORED))
        }
        WebhookEvent::ChangesRequested(review) => {
            if !state.auto_fix_enabled {
                info!(repository = %review.repository, "Auto-fix disabled, acknowledging review");
                return Ok(ack(StatusCode::ACCEPTED, responses::AUTO_FIX_DISABLED));
            }

            info!(
                repository = %review.repository,
                pull_request = review.pull_request_number,
                "Dispatching remediation for review"
            );
            let outcome = state.reviews.handle_review(&review).await?;
            let status = if outcome.is_ok() {
                StatusCode::OK
            } else {
                StatusCode::BAD_GATEWAY
            };
            Ok((status, Json(outcome)).into_response())
        }
    }
}

fn ack(status: StatusCode, message: &str) -> Response {
    (status, Json(AckResponse::new(message))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Middleware
// ============================================================================

/// Tags each request with a correlation id and logs its completion.
///
/// An inbound `x-correlation-id` is reused, otherwise a v4 uuid is minted.
/// The id is stored in request extensions and echoed on the response.
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let correlation_id = header_str(request.headers(), CORRELATION_HEADER)
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let span = tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        correlation_id = %correlation_id,
    );
    request.extensions_mut().insert(correlation_id.clone());

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let _entered = span.enter();
    log_completion(response.status(), started.elapsed());
    response
}

fn log_completion(status: StatusCode, elapsed: Duration) {
    let code = status.as_u16();
    let elapsed_ms = elapsed.as_millis() as u64;
    match status {
        s if s.is_server_error() => error!(status = code, elapsed_ms, "Request failed"),
        s if s.is_client_error() => warn!(status = code, elapsed_ms, "Request rejected"),
        _ => info!(status = code, elapsed_ms, "Request completed"),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
