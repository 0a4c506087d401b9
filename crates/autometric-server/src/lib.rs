//! AutoMetric Web Server
//!
//! Axum-based HTTP API serving used-car price predictions.
//!
//! - `GET /` welcome message
//! - `GET /health` status and model info
//! - `GET /price?brand=..&model=..` price with explanation
//!
//! The price model is loaded once before the router is built and shared
//! read-only across requests. Client input errors map to 400; internal
//! failures are logged and returned as a generic 500.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use autometric_core::PricePredictor;

mod handlers;

/// Version reported by /health
pub const API_VERSION: &str = "1.0.0";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Listing date for requests without `date` (defaults to today)
    pub reference_date: Option<NaiveDate>,
}

/// Shared application state
pub struct AppState {
    /// None when the model failed to load at startup
    pub predictor: Option<PricePredictor>,
    pub config: ServerConfig,
}

impl AppState {
    fn today(&self) -> NaiveDate {
        self.config
            .reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

/// Create the application router
pub fn create_router(predictor: Option<PricePredictor>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        predictor,
        config: config.clone(),
    });

    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health_check))
        .route("/price", get(handlers::get_price))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}

/// Start the server
pub async fn serve(
    predictor: Option<PricePredictor>,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    match &predictor {
        Some(p) => info!(
            "✅ Price model ready: {} ({} features, x{})",
            p.schema().model_version(),
            p.schema().len(),
            p.schema().price_multiplier()
        ),
        None => warn!("⚠️  No price model loaded - /price will return 503"),
    }

    let app = create_router(predictor, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<autometric_core::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<autometric_core::Error> for AppError {
    fn from(err: autometric_core::Error) -> Self {
        if err.is_client_error() {
            return Self::bad_request(&err.to_string());
        }
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
