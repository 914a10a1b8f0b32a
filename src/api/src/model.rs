//! ONNX model loading and inference.
//!
//! The model is a binary classifier: "does this entrant finish in the top
//! three". Only the positive-class probability is used.

use anyhow::{Context, Result};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{FEATURE_NAMES, NUM_FEATURES};
use crate::scraper::FeatureTable;
use crate::types::EntrantPrediction;

/// Anything that maps an `[n, NUM_FEATURES]` matrix to `n` probabilities
pub trait Predictor: Send + Sync {
    fn predict(&self, features: Array2<f32>) -> Result<Vec<f64>>;

    fn feature_names(&self) -> &[&str] {
        &FEATURE_NAMES
    }
}

/// ONNX model wrapper for top-3 probability prediction.
pub struct OnnxModel {
    session: Mutex<Session>,
}

impl OnnxModel {
    /// Load ONNX model from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl Predictor for OnnxModel {
    fn predict(&self, features: Array2<f32>) -> Result<Vec<f64>> {
        let n_entrants = features.nrows();
        if features.ncols() != NUM_FEATURES {
            anyhow::bail!(
                "Expected {} features per entrant, got {}",
                NUM_FEATURES,
                features.ncols()
            );
        }
        if n_entrants == 0 {
            return Ok(Vec::new());
        }

        let input_tensor = Tensor::from_array(features)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock session: {}", e))?;

        let outputs = session.run(ort::inputs![input_tensor])?;

        // Output 0 is the predicted labels, output 1 is probabilities
        if outputs.len() < 2 {
            anyhow::bail!("Expected at least 2 outputs from model");
        }

        // Shape [n_entrants, n_classes], positive class last
        let (shape, probs_data) = outputs[1]
            .try_extract_tensor::<f32>()
            .context("Failed to extract probability tensor")?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        if shape_dims.len() != 2 || shape_dims[0] as usize != n_entrants || shape_dims[1] < 1 {
            anyhow::bail!(
                "Unexpected output shape: {:?}, expected [{}, 2]",
                shape_dims,
                n_entrants
            );
        }

        let n_cols = shape_dims[1] as usize;
        Ok((0..n_entrants)
            .map(|i| probs_data[i * n_cols + n_cols - 1] as f64)
            .collect())
    }
}

/// Thread-safe model wrapper for use in web handlers.
pub type SharedModel = Arc<dyn Predictor>;

/// Create a shared model instance.
pub fn create_shared_model<P: AsRef<Path>>(path: P) -> Result<SharedModel> {
    let model = OnnxModel::load(path)?;
    Ok(Arc::new(model))
}

/// Probability as a percentage rounded to two decimals
pub fn to_percent(probability: f64) -> f64 {
    (probability * 10000.0).round() / 100.0
}

/// Score every row of a table, pairing probabilities with horse numbers.
pub fn score_table(model: &dyn Predictor, table: &FeatureTable) -> Result<Vec<EntrantPrediction>> {
    let probabilities = model.predict(table.to_array())?;
    if probabilities.len() != table.len() {
        anyhow::bail!(
            "Model returned {} probabilities for {} entrants",
            probabilities.len(),
            table.len()
        );
    }

    Ok(table
        .umabans
        .iter()
        .zip(probabilities)
        .map(|(&umaban, p)| EntrantPrediction {
            umaban,
            probability: to_percent(p),
        })
        .collect())
}


#[cfg(test)]
mod tests {
    use super::testing::StubModel;
    use super::*;
    use crate::scraper::{EntrantFeatures, FeatureBuilder};

    #[test]
    fn test_to_percent() {
        assert_eq!(to_percent(0.123456), 12.35);
        assert_eq!(to_percent(1.0), 100.0);
        assert_eq!(to_percent(0.0), 0.0);
    }

    #[test]
    fn test_score_table() {
        let features = [
            EntrantFeatures {
                umaban: 2.0,
                ..Default::default()
            },
            EntrantFeatures {
                umaban: 7.0,
                ..Default::default()
            },
        ];
        let table = FeatureBuilder::from_features(&features);
        let model = StubModel { base: 0.1 };

        let predictions = score_table(&model, &table).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].umaban, 2);
        assert_eq!(predictions[0].probability, 12.0);
        assert_eq!(predictions[1].umaban, 7);
        assert_eq!(predictions[1].probability, 17.0);
    }

    #[test]
    fn test_default_feature_names() {
        let model = StubModel { base: 0.0 };
        assert_eq!(model.feature_names().len(), NUM_FEATURES);
        assert_eq!(model.feature_names()[0], "waku");
    }
}
