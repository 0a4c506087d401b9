//! Welcome, health and fallback handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppError, AppState, API_VERSION};

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub message: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub api_version: &'static str,
    pub model_loaded: bool,
    /// Number of model input features (0 when no model is loaded)
    pub features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// GET / - Welcome message
pub async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: "Welcome to AutoMetric API",
        status: "success",
    })
}

/// GET /health - API status and model info
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let predictor = state.predictor.as_ref();
    Json(HealthResponse {
        status: "healthy",
        api_version: API_VERSION,
        model_loaded: predictor.is_some(),
        features: predictor.map(|p| p.schema().len()).unwrap_or(0),
        model_version: predictor.map(|p| p.schema().model_version().to_string()),
    })
}

/// Unknown routes
pub async fn not_found() -> AppError {
    AppError::not_found("Not found")
}
