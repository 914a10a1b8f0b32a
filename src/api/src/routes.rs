//! API route handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::{Arc, Mutex};

use crate::config::{AppConfig, NUM_FEATURES};
use crate::error::ScrapeError;
use crate::model::{score_table, SharedModel};
use crate::scraper::{fetch_race_card, DocumentSource, FeatureBuilder, FeatureTable};
use crate::storage::RaceRepository;
use crate::types::{
    ErrorResponse, HealthResponse, ModelInfoResponse, PredictRequest, PredictResponse, RaceSummary,
};

/// Application state shared across handlers.
pub struct AppState {
    pub model: SharedModel,
    pub repo: Mutex<RaceRepository>,
    pub source: Arc<dyn DocumentSource>,
    pub config: AppConfig,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        let status = if err.is_skippable() {
            StatusCode::NOT_FOUND
        } else if err.is_transient() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Model info endpoint.
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfoResponse> {
    Json(ModelInfoResponse {
        model_path: state.config.model.path.clone(),
        num_features: NUM_FEATURES,
        feature_names: state
            .model
            .feature_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    })
}

/// Stored races ordered by date, then id.
pub async fn list_races(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RaceSummary>>, ApiError> {
    let repo = state
        .repo
        .lock()
        .map_err(|e| ApiError::internal(format!("Store unavailable: {}", e)))?;
    let races = repo
        .list_races()
        .map_err(|e| ApiError::internal(format!("Failed to list races: {}", e)))?;

    Ok(Json(races.iter().map(RaceSummary::from).collect()))
}

/// Prediction endpoint.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let table = if !req.entrants.is_empty() {
        FeatureBuilder::from_features(&req.entrants)
    } else if let Some(race_id) = req.race_id.as_deref() {
        race_card_features(&state, race_id).await?
    } else {
        return Err(ApiError::bad_request("Provide entrants or race_id"));
    };

    if table.is_empty() {
        return Err(ApiError::bad_request("No entrant has a complete feature row"));
    }

    let predictions = score_table(state.model.as_ref(), &table)
        .map_err(|e| ApiError::internal(format!("Model inference failed: {}", e)))?;

    Ok(Json(PredictResponse {
        race_id: req.race_id,
        predictions,
    }))
}

/// Fetch a race card and join it with stored jockey stats.
async fn race_card_features(state: &AppState, race_id: &str) -> Result<FeatureTable, ApiError> {
    let entrants = fetch_race_card(&*state.source, race_id).await?;

    let stats = {
        let repo = state
            .repo
            .lock()
            .map_err(|e| ApiError::internal(format!("Store unavailable: {}", e)))?;
        repo.jockey_stats_for(&FeatureBuilder::jockey_ids(&entrants))
            .map_err(|e| ApiError::internal(format!("Failed to read jockey stats: {}", e)))?
    };

    Ok(FeatureBuilder::assemble(&entrants, &stats))
}
