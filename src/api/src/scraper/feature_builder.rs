//! Feature builder for ML model input.
//!
//! Generates the 9 features of one entrant from its race card row and the
//! stored career stats of its jockey. Order matches `config::FEATURE_NAMES`.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::NUM_FEATURES;
use crate::scraper::normalize::EntrantRow;
use crate::storage::JockeyStats;

/// 9 features for the ML model
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EntrantFeatures {
    // Slot (2)
    pub waku: f32,
    pub umaban: f32,
    // Weights (2)
    pub jockey_weight: f32,
    pub horse_weight: f32,
    // Horse (2)
    pub sex: f32, // 牡:0, 牝:1, セ:2
    pub age: f32,
    // Jockey career, percent (3)
    #[serde(default)]
    pub win_rate: f32,
    #[serde(default)]
    pub place_rate: f32,
    #[serde(default)]
    pub show_rate: f32,
}

impl EntrantFeatures {
    /// Convert to array for model input
    pub fn to_array(&self) -> [f32; NUM_FEATURES] {
        [
            self.waku,
            self.umaban,
            self.jockey_weight,
            self.horse_weight,
            self.sex,
            self.age,
            self.win_rate,
            self.place_rate,
            self.show_rate,
        ]
    }
}

/// Feature rows of one race, each paired with its horse number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub rows: Vec<[f32; NUM_FEATURES]>,
    pub umabans: Vec<u32>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn push(&mut self, umaban: u32, features: &EntrantFeatures) {
        self.rows.push(features.to_array());
        self.umabans.push(umaban);
    }

    /// Row-major `[n, 9]` matrix for the model
    pub fn to_array(&self) -> Array2<f32> {
        let mut array = Array2::zeros((self.rows.len(), NUM_FEATURES));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                array[[i, j]] = *value;
            }
        }
        array
    }
}

/// Builds features from normalized race card rows
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Features of one entrant; `None` when a required field is missing.
    /// Missing jockey stats count as zero.
    pub fn build(entrant: &EntrantRow, stats: Option<&JockeyStats>) -> Option<EntrantFeatures> {
        let stats = stats.copied().unwrap_or_default();
        let rate = |r: Option<f64>| r.unwrap_or(0.0) as f32;

        Some(EntrantFeatures {
            waku: entrant.waku? as f32,
            umaban: entrant.umaban? as f32,
            jockey_weight: entrant.jockey_weight? as f32,
            horse_weight: entrant.horse_weight as f32,
            sex: f32::from(entrant.sex?.code()),
            age: entrant.age? as f32,
            win_rate: rate(stats.win_rate),
            place_rate: rate(stats.place_rate),
            show_rate: rate(stats.show_rate),
        })
    }

    /// Assemble the table for a race, dropping incomplete entrants.
    pub fn assemble(entrants: &[EntrantRow], stats: &HashMap<i64, JockeyStats>) -> FeatureTable {
        let mut table = FeatureTable::default();
        for entrant in entrants {
            let jockey_stats = entrant.jockey_id.and_then(|id| stats.get(&id));
            if let (Some(umaban), Some(features)) =
                (entrant.umaban, Self::build(entrant, jockey_stats))
            {
                table.push(umaban, &features);
            }
        }
        table
    }

    /// Table from features supplied directly by a caller
    pub fn from_features(features: &[EntrantFeatures]) -> FeatureTable {
        let mut table = FeatureTable::default();
        for f in features {
            table.push(f.umaban.max(0.0).round() as u32, f);
        }
        table
    }

    /// Jockey ids referenced by the entrants, deduplicated
    pub fn jockey_ids(entrants: &[EntrantRow]) -> Vec<i64> {
        let mut ids: Vec<i64> = entrants.iter().filter_map(|e| e.jockey_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
