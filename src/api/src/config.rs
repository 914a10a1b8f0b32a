//! Configuration for keiba-ingest.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::scraper::{IdBounds, RaceIdSpace};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
}

fn default_model_path() -> String {
    "data/models/show_model.onnx".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "data/keiba.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Inclusive bounds of one race id field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub first: u8,
    pub last: u8,
}

impl Span {
    const fn new(first: u8, last: u8) -> Self {
        Self { first, last }
    }
}

/// Crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_year")]
    pub year: u16,
    #[serde(default = "default_venues")]
    pub venues: Span,
    #[serde(default = "default_meetings")]
    pub meetings: Span,
    #[serde(default = "default_days")]
    pub days: Span,
    #[serde(default = "default_races")]
    pub races: Span,
    /// Pause after every request
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Extra attempts for transient fetch failures
    #[serde(default)]
    pub max_retries: u32,
}

fn default_year() -> u16 {
    u16::try_from(chrono::Local::now().year()).unwrap_or(2024)
}

fn default_venues() -> Span {
    Span::new(1, 10)
}

fn default_meetings() -> Span {
    Span::new(1, 6)
}

fn default_days() -> Span {
    Span::new(1, 12)
}

fn default_races() -> Span {
    Span::new(1, 12)
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            year: default_year(),
            venues: default_venues(),
            meetings: default_meetings(),
            days: default_days(),
            races: default_races(),
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_retries: 0,
        }
    }
}

impl ScraperConfig {
    pub fn id_bounds(&self) -> IdBounds {
        IdBounds {
            venues: self.venues.first..=self.venues.last,
            meetings: self.meetings.first..=self.meetings.last,
            days: self.days.first..=self.days.last,
            races: self.races.first..=self.races.last,
        }
    }

    /// Id space of the configured year, or of `year` when given
    pub fn id_space(&self, year: Option<u16>) -> RaceIdSpace {
        RaceIdSpace::with_bounds(year.unwrap_or(self.year), self.id_bounds())
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (KEIBA_SCRAPER__DELAY_MS, etc.)
            .add_source(
                config::Environment::with_prefix("KEIBA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Number of model input features
pub const NUM_FEATURES: usize = 9;

/// Feature names in model input order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "waku",
    "umaban",
    "jockey_weight",
    "horse_weight",
    "sex",
    "age",
    "win_rate",
    "place_rate",
    "show_rate",
];
