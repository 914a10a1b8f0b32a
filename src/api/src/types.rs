//! Request and response types for the keiba-ingest API.

use serde::{Deserialize, Serialize};

use crate::scraper::EntrantFeatures;
use crate::storage::Race;

/// Stored race as listed by `GET /races`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaceSummary {
    pub id: String,
    pub name: String,
    pub venue: String,
    /// ISO date, `YYYY-MM-DD`
    pub date: String,
}

impl From<&Race> for RaceSummary {
    fn from(race: &Race) -> Self {
        Self {
            id: race.id.clone(),
            name: race.name.clone(),
            venue: race.venue.as_str().to_string(),
            date: race.date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Prediction request: explicit feature rows, or a race id whose card is
/// fetched and assembled server-side
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub race_id: Option<String>,
    #[serde(default)]
    pub entrants: Vec<EntrantFeatures>,
}

/// Top-3 probability of one entrant, in percent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntrantPrediction {
    pub umaban: u32,
    pub probability: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub race_id: Option<String>,
    pub predictions: Vec<EntrantPrediction>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Model info response
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_path: String,
    pub num_features: usize,
    pub feature_names: Vec<String>,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
