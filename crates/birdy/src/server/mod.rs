//! HTTP API for the viewer.
//!
//! The registry and history routes read the local store; `/api/aircraft/live`
//! goes through the [`LiveOrchestrator`].

mod routes;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{Config, Credentials};
use crate::error::{Error, Result};
use crate::live::LiveOrchestrator;
use crate::storage::StoreHandle;

pub use routes::{AircraftListResponse, HistoryResponse, Pagination};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read-only access to the local database.
    pub store: StoreHandle,
    /// Live snapshot pipeline.
    pub live: Arc<LiveOrchestrator>,
}

impl AppState {
    /// Create state from its parts.
    #[must_use]
    pub fn new(store: StoreHandle, live: LiveOrchestrator) -> Self {
        Self {
            store,
            live: Arc::new(live),
        }
    }
}

/// Error returned by handlers; renders as `{"error": "..."}`.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] Error);

impl ApiError {
    /// HTTP status for the wrapped error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/aircraft", get(routes::list_aircraft))
        .route("/api/aircraft/stats", get(routes::aircraft_stats))
        .route("/api/aircraft/history", get(routes::flight_history))
        .route("/api/aircraft/live", get(routes::live))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the API server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if credentials cannot be read, the provider clients
/// cannot be built, or the address cannot be bound.
pub async fn serve(config: &Config) -> Result<()> {
    let credentials = Credentials::load(&config.credentials_path())?;
    let live = LiveOrchestrator::from_config(config, &credentials)?;
    if !live.authenticated() {
        warn!("No provider credentials configured; /api/aircraft/live will serve mock data");
    }

    let db_path = config.database_path();
    if !db_path.exists() {
        warn!(
            "Database {} does not exist yet; run `birdy collect` to create it",
            db_path.display()
        );
    }

    let app = build_router(AppState::new(StoreHandle::new(db_path), live));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveSettings;

    #[test]
    fn test_api_error_status() {
        let bad = ApiError::from(Error::invalid_parameter("icao24", "missing"));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let internal = ApiError::from(Error::internal("boom"));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_display_is_transparent() {
        let err = ApiError::from(Error::internal("boom"));
        assert_eq!(err.to_string(), "internal error: boom");
    }

    #[test]
    fn test_app_state_is_cloneable() {
        let state = AppState::new(
            StoreHandle::new("/nonexistent/birdy.db"),
            LiveOrchestrator::new(LiveSettings::default(), Vec::new()),
        );
        let clone = state.clone();
        assert!(Arc::ptr_eq(&state.live, &clone.live));
    }
}
