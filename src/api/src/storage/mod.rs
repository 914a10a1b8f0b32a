//! SQLite storage module for the normalized race dataset
//!
//! Four linked relations: races, horses, jockeys and results. Results
//! reference the other three by id and are unique per (race_id, umaban).

pub mod models;
pub mod repository;
pub mod schema;

pub use models::{Horse, Jockey, JockeyStats, Race, ResultRecord, Sex, Venue};
pub use repository::RaceRepository;
