//! Price prediction handler

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::{debug, warn};

use autometric_core::{PriceQuote, RawParams};

use crate::{AppError, AppState};

/// GET /price - Predict a used-car price from query parameters
///
/// Required: brand, model, yom, engineCC, gear, fuelType, mileage (per schema).
/// Optional: town, date (YYYY-MM-DD), condition, leasing, airCondition,
/// powerSteering, powerMirror, powerWindow.
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RawParams>,
) -> Result<Json<PriceQuote>, AppError> {
    let predictor = state
        .predictor
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Model not loaded"))?;

    let quote = predictor.quote(&params, state.today()).map_err(|e| {
        if e.is_client_error() {
            warn!(error = %e, "Rejected price request");
        }
        AppError::from(e)
    })?;

    debug!(
        brand = params.get("brand").map(String::as_str).unwrap_or(""),
        model = params.get("model").map(String::as_str).unwrap_or(""),
        price = quote.price,
        "Price request served"
    );

    Ok(Json(quote))
}
