//! Crawl driver: fetch, parse, normalize, resolve and persist one race at a
//! time, strictly in sequence.

use tracing::{debug, error, info, warn};

use super::persist::{PersistReport, PersistenceCoordinator};
use super::resolver::EntityResolver;
use crate::error::ScrapeError;
use crate::retry::{retry_transient, RetryConfig};
use crate::scraper::normalize::{normalize_results, partition_rows};
use crate::scraper::parsers::{JockeyStatsParser, RaceResultParser};
use crate::scraper::{jockey_url, race_result_url, DocumentSource};
use crate::storage::{JockeyStats, RaceRepository};

/// What happened to one race
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome {
    Ingested(IngestReport),
    /// Present in the store and not forced; nothing was fetched
    AlreadyStored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub race_id: String,
    pub persisted: PersistReport,
    pub rejected: usize,
    pub conflicts: usize,
}

/// Tallies of a crawl run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub attempted: usize,
    pub ingested: usize,
    pub already_stored: usize,
    pub not_found: usize,
    pub transient_failures: usize,
    pub failed: usize,
    pub results: usize,
    pub skipped_results: usize,
    pub rejected_rows: usize,
    pub conflicts: usize,
}

impl CrawlSummary {
    fn record(&mut self, report: &IngestReport) {
        self.ingested += 1;
        self.results += report.persisted.results;
        self.skipped_results += report.persisted.skipped;
        self.rejected_rows += report.rejected;
        self.conflicts += report.conflicts;
    }
}

/// Knobs for a crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Re-process races that are already stored
    pub force: bool,
    /// Stop after this many ids
    pub limit: Option<usize>,
    pub retry: RetryConfig,
}

pub struct Crawler<'a, S: ?Sized> {
    source: &'a S,
    repo: &'a mut RaceRepository,
    options: CrawlOptions,
}

impl<'a, S> Crawler<'a, S>
where
    S: DocumentSource + ?Sized,
{
    pub fn new(source: &'a S, repo: &'a mut RaceRepository, options: CrawlOptions) -> Self {
        Self {
            source,
            repo,
            options,
        }
    }

    /// Run the full pipeline for one race id.
    pub async fn ingest_race(&mut self, race_id: &str) -> Result<RaceOutcome, ScrapeError> {
        if !self.options.force
            && self
                .repo
                .race_complete(race_id)
                .map_err(|e| ScrapeError::constraint(race_id, e))?
        {
            debug!("Race {} already stored, skipping", race_id);
            return Ok(RaceOutcome::AlreadyStored);
        }

        let url = race_result_url(race_id);
        let html = self.fetch(&url).await?;

        let parsed = RaceResultParser::parse(&html, race_id)?;
        let batch = partition_rows(normalize_results(&parsed.rows));

        let mut resolved = EntityResolver::new(self.repo.connection())
            .resolve(parsed.race, batch.accepted, batch.rejected)
            .map_err(|e| ScrapeError::constraint(race_id, e))?;

        for row in &resolved.rejected {
            debug!("Race {}: {}", race_id, ScrapeError::from(row.clone()));
        }

        for jockey in &mut resolved.new_jockeys {
            jockey.stats = self.fetch_jockey_stats(jockey.id).await;
        }

        let persisted = PersistenceCoordinator::new(&mut *self.repo).persist(&resolved)?;

        info!(
            "Race {} ({}) ingested: {} results, {} skipped, {} rejected",
            race_id,
            resolved.race.name,
            persisted.results,
            persisted.skipped,
            resolved.rejected.len()
        );

        Ok(RaceOutcome::Ingested(IngestReport {
            race_id: race_id.to_string(),
            persisted,
            rejected: resolved.rejected.len(),
            conflicts: resolved.conflicts.len(),
        }))
    }

    /// Ingest each id in turn. Failures are logged and counted, never fatal.
    pub async fn crawl<I>(&mut self, ids: I) -> CrawlSummary
    where
        I: IntoIterator<Item = String>,
    {
        let mut summary = CrawlSummary::default();
        let limit = self.options.limit.unwrap_or(usize::MAX);

        for race_id in ids.into_iter().take(limit) {
            summary.attempted += 1;
            match self.ingest_race(&race_id).await {
                Ok(RaceOutcome::Ingested(report)) => summary.record(&report),
                Ok(RaceOutcome::AlreadyStored) => summary.already_stored += 1,
                Err(e) if e.is_skippable() => {
                    debug!("Race {} skipped: {}", race_id, e);
                    summary.not_found += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!("Race {} not fetched: {}", race_id, e);
                    summary.transient_failures += 1;
                }
                Err(e) => {
                    error!("Race {} failed: {}", race_id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Crawl finished: {} ids, {} ingested, {} already stored, {} not found, {} transient, {} failed",
            summary.attempted,
            summary.ingested,
            summary.already_stored,
            summary.not_found,
            summary.transient_failures,
            summary.failed
        );
        summary
    }

    /// Career stats from a jockey's profile; empty if the page is unavailable.
    pub async fn fetch_jockey_stats(&self, jockey_id: i64) -> JockeyStats {
        match self.fetch(&jockey_url(jockey_id)).await {
            Ok(html) => JockeyStatsParser::parse(&html),
            Err(e) => {
                warn!("Stats for jockey {} unavailable: {}", jockey_id, e);
                JockeyStats::default()
            }
        }
    }

    /// Re-fetch stats for every stored jockey. Returns the number updated.
    pub async fn refresh_jockeys(&mut self) -> anyhow::Result<usize> {
        let ids = self.repo.jockey_ids()?;
        info!("Refreshing stats for {} jockeys", ids.len());

        let mut updated = 0;
        for id in ids {
            let stats = self.fetch_jockey_stats(id).await;
            if stats.is_empty() {
                debug!("No career stats for jockey {}", id);
                continue;
            }
            if self.repo.update_jockey_stats(id, &stats)? {
                updated += 1;
            }
        }

        info!("Updated stats for {} jockeys", updated);
        Ok(updated)
    }

    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let source = self.source;
        retry_transient(&self.options.retry, url, move || source.fetch(url)).await
    }
}
