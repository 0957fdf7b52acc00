//! Transaction service - HTTP entry point and background task wiring.

use crate::domain::config::TransactionsConfig;
use crate::domain::error::{AuthorizationError, GatewayError};
use crate::domain::pending::{cleanup_task, CorrelationTable, StatsSnapshot, TableLimits};
use crate::domain::types::{AuthorizationRequest, AuthorizationResponse};
use crate::ipc::{BusRequestSender, RequestDispatcher, ResponseHandler, ResponseListener};
use crate::middleware::{create_cors_layer, TracingLayer};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use shared_bus::{ChannelFilter, MessagePublisher, MessageSubscriber};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

/// Path of the authorize endpoint
pub const AUTHORIZE_PATH: &str = "/api/v1/transaction/authorize";

/// Transaction service state
pub struct TransactionService {
    config: TransactionsConfig,
    table: Arc<CorrelationTable>,
    dispatcher: Arc<RequestDispatcher>,
    subscriber: Arc<dyn MessageSubscriber>,
}

impl TransactionService {
    /// Create a new transaction service
    pub fn new(
        config: TransactionsConfig,
        publisher: Arc<dyn MessagePublisher>,
        subscriber: Arc<dyn MessageSubscriber>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let table = Arc::new(CorrelationTable::new(TableLimits {
            max_entries: config.correlation.max_entries,
            ttl: config.correlation.ttl,
        }));

        let sender = Arc::new(BusRequestSender::new(
            publisher,
            config.channels.request_channel.clone(),
        ));

        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&table),
            sender,
            config.authorization.timeout,
        ));

        Ok(Self {
            config,
            table,
            dispatcher,
            subscriber,
        })
    }

    /// Bind the configured address and serve until shutdown
    pub async fn start(self, shutdown: watch::Receiver<bool>) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until shutdown.
    ///
    /// Joins the response channel before accepting requests, so no verdict
    /// for an accepted call can be missed.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), GatewayError> {
        let background = self.spawn_background_tasks().await?;
        let router = self.router();

        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        info!(
            addr = %local_addr,
            timeout_ms = self.config.authorization.timeout.as_millis() as u64,
            "Transaction service listening"
        );

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // A dropped sender also means shutdown
                let _ = shutdown.wait_for(|stop| *stop).await;
                info!("Received shutdown signal");
            })
            .await
            .map_err(|e| GatewayError::Server(e.to_string()));

        for handle in background {
            handle.abort();
        }

        if let Err(e) = &result {
            error!(error = %e, "HTTP server error");
        }
        info!(pending = self.table.len(), "Transaction service stopped");
        result
    }

    /// Subscribe to the response channel and start the listener and the sweep.
    pub async fn spawn_background_tasks(&self) -> Result<Vec<JoinHandle<()>>, GatewayError> {
        let subscription = self
            .subscriber
            .subscribe(
                ChannelFilter::channel(self.config.channels.response_channel.clone()),
                &self.config.channels.group_id,
            )
            .await
            .map_err(|e| GatewayError::Subscription(e.to_string()))?;

        let listener = ResponseListener::new(
            ResponseHandler::new(Arc::clone(&self.table)),
            subscription,
        );

        Ok(vec![
            tokio::spawn(listener.run()),
            tokio::spawn(cleanup_task(
                Arc::clone(&self.table),
                self.config.correlation.sweep_interval,
            )),
        ])
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            table: Arc::clone(&self.table),
        };

        // CORS needs a `Default` response body, so it sits directly on the routes
        let middleware = ServiceBuilder::new()
            .layer(TracingLayer::new())
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_request_size))
            .layer(create_cors_layer(&self.config.cors));

        Router::new()
            .route(AUTHORIZE_PATH, post(authorize_transaction))
            .route("/health", get(health_check))
            .layer(middleware)
            .with_state(state)
    }

    /// Get the correlation table
    pub fn correlation_table(&self) -> Arc<CorrelationTable> {
        Arc::clone(&self.table)
    }

    pub fn config(&self) -> &TransactionsConfig {
        &self.config
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<RequestDispatcher>,
    table: Arc<CorrelationTable>,
}

/// Authorize a driver token for a charging transaction
async fn authorize_transaction(
    State(state): State<AppState>,
    Json(request): Json<AuthorizationRequest>,
) -> Result<Json<AuthorizationResponse>, AuthorizationError> {
    let status = state.dispatcher.authorize(&request).await?;
    info!(
        station_uuid = ?request.station_uuid,
        status = %status,
        "Authorization resolved"
    );
    Ok(Json(AuthorizationResponse::new(status)))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    pending: usize,
    stats: StatsSnapshot,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pending: state.table.len(),
        stats: state.table.stats().snapshot(),
    })
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        match self {
            AuthorizationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT.into_response(),
            AuthorizationError::Dispatch(_) | AuthorizationError::Internal(_) => {
                error!(error = %self, "Authorization failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
