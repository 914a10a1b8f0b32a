//! Web scraper module for netkeiba.com
//!
//! Provides id enumeration, rate-limited fetching, HTML parsing,
//! field normalization and feature assembly.

pub mod feature_builder;
pub mod fetcher;
pub mod normalize;
pub mod parsers;
pub mod race_ids;
pub mod rate_limiter;

pub use feature_builder::{EntrantFeatures, FeatureBuilder, FeatureTable};
pub use fetcher::{DocumentSource, HttpFetcher};
pub use race_ids::{IdBounds, RaceIdSpace};

use crate::error::ScrapeError;
use normalize::{normalize_entrant, EntrantRow};
use parsers::RaceCardParser;

/// Base URLs for netkeiba.com
pub const BASE_URL: &str = "https://race.netkeiba.com";
pub const DB_URL: &str = "https://db.netkeiba.com";

/// Build race result URL
/// URL: https://db.netkeiba.com/race/RACEID/
pub fn race_result_url(race_id: &str) -> String {
    format!("{}/race/{}/", DB_URL, race_id)
}

/// Build race card URL (entries of a race not yet run)
pub fn race_card_url(race_id: &str) -> String {
    format!("{}/race/shutuba.html?race_id={}", BASE_URL, race_id)
}

/// Build jockey profile URL; ids are zero-padded to five digits on the site
pub fn jockey_url(jockey_id: i64) -> String {
    format!("{}/jockey/{:05}/", DB_URL, jockey_id)
}

/// Fetch and normalize the entrants of an upcoming race.
pub async fn fetch_race_card<S>(source: &S, race_id: &str) -> Result<Vec<EntrantRow>, ScrapeError>
where
    S: DocumentSource + ?Sized,
{
    let html = source.fetch(&race_card_url(race_id)).await?;
    let rows = RaceCardParser::parse(&html, race_id)?;
    Ok(rows.iter().map(normalize_entrant).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_result_url() {
        assert_eq!(
            race_result_url("202305050812"),
            "https://db.netkeiba.com/race/202305050812/"
        );
    }

    #[test]
    fn test_race_card_url() {
        assert_eq!(
            race_card_url("202405020811"),
            "https://race.netkeiba.com/race/shutuba.html?race_id=202405020811"
        );
    }

    #[test]
    fn test_jockey_url_pads_id() {
        assert_eq!(jockey_url(5339), "https://db.netkeiba.com/jockey/05339/");
        assert_eq!(jockey_url(1234), "https://db.netkeiba.com/jockey/01234/");
    }
}
