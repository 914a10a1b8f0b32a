//! Race ingestion: resolve parsed rows against the store and persist them.

pub mod persist;
pub mod pipeline;
pub mod resolver;

pub use pipeline::{CrawlOptions, Crawler, RaceOutcome};
