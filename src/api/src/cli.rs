//! CLI commands for keiba-ingest.
//!
//! Crawling and ingestion, store inspection, prediction and the API server.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::ingest::{CrawlOptions, Crawler, RaceOutcome};
use crate::model::{create_shared_model, score_table};
use crate::retry::RetryConfig;
use crate::scraper::{fetch_race_card, FeatureBuilder, HttpFetcher};
use crate::storage::RaceRepository;
use crate::types::{PredictRequest, PredictResponse, RaceSummary};

#[derive(Parser)]
#[command(name = "keiba-ingest")]
#[command(version, about = "Race result ingestion and top-3 prediction for netkeiba.com", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Crawl every candidate race id of a year into the store
    Crawl {
        /// Target year (defaults to scraper.year)
        #[arg(short, long)]
        year: Option<u16>,

        /// Stop after this many ids
        #[arg(short, long)]
        limit: Option<usize>,

        /// Continue after the highest race id already stored
        #[arg(long)]
        resume: bool,

        /// Re-process races that are already stored
        #[arg(long)]
        force: bool,
    },

    /// Ingest a single race
    Ingest {
        /// 12-digit race id, e.g. 202305050812
        #[arg(value_name = "RACE_ID")]
        race_id: String,
    },

    /// Re-fetch career stats for every stored jockey
    RefreshJockeys,

    /// List stored races
    Races {
        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Predict top-3 probabilities for a race card or a JSON file
    Predict {
        /// Race id of an upcoming race
        #[arg(value_name = "RACE_ID", conflicts_with = "input")]
        race_id: Option<String>,

        /// Path to a JSON prediction request
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Model path override
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn open_repository(config: &AppConfig) -> anyhow::Result<RaceRepository> {
    let path = Path::new(&config.database.path);
    RaceRepository::new(path).with_context(|| format!("Failed to open store at {}", path.display()))
}

fn crawl_options(config: &AppConfig, force: bool, limit: Option<usize>) -> CrawlOptions {
    CrawlOptions {
        force,
        limit,
        retry: RetryConfig::with_retries(config.scraper.max_retries),
    }
}

/// Crawl a year's id space.
pub async fn run_crawl(
    year: Option<u16>,
    limit: Option<usize>,
    resume: bool,
    force: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let mut repo = open_repository(&config)?;
    let fetcher = HttpFetcher::new(&config.scraper)?;

    let space = config.scraper.id_space(year);
    if space.is_empty() {
        bail!("Id bounds for {} leave nothing to crawl", space.year());
    }
    tracing::info!("Crawling {} candidate ids for {}", space.len(), space.year());

    let last_id = if resume {
        repo.last_race_id(space.year())?
    } else {
        None
    };
    let ids: Box<dyn Iterator<Item = String>> = match last_id {
        Some(last) => {
            tracing::info!("Resuming after {}", last);
            Box::new(space.resume_after(&last))
        }
        None => Box::new(space.iter()),
    };

    let summary = Crawler::new(&fetcher, &mut repo, crawl_options(&config, force, limit))
        .crawl(ids)
        .await;

    println!(
        "ids={} ingested={} already_stored={} not_found={} transient={} failed={} results={} rejected_rows={} conflicts={}",
        summary.attempted,
        summary.ingested,
        summary.already_stored,
        summary.not_found,
        summary.transient_failures,
        summary.failed,
        summary.results,
        summary.rejected_rows,
        summary.conflicts
    );
    Ok(())
}

/// Ingest one race by id.
pub async fn run_ingest(race_id: String) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let mut repo = open_repository(&config)?;
    let fetcher = HttpFetcher::new(&config.scraper)?;

    let outcome = Crawler::new(&fetcher, &mut repo, crawl_options(&config, true, None))
        .ingest_race(&race_id)
        .await?;

    match outcome {
        RaceOutcome::Ingested(report) => println!(
            "race={} races={} horses={} jockeys={} results={} skipped={} rejected={} conflicts={}",
            report.race_id,
            report.persisted.races,
            report.persisted.horses,
            report.persisted.jockeys,
            report.persisted.results,
            report.persisted.skipped,
            report.rejected,
            report.conflicts
        ),
        RaceOutcome::AlreadyStored => println!("race={} already stored", race_id),
    }
    Ok(())
}

/// Refresh the career stats of every stored jockey.
pub async fn run_refresh_jockeys() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let mut repo = open_repository(&config)?;
    let fetcher = HttpFetcher::new(&config.scraper)?;

    let updated = Crawler::new(&fetcher, &mut repo, crawl_options(&config, false, None))
        .refresh_jockeys()
        .await?;

    println!("updated={}", updated);
    Ok(())
}

/// Print the stored races.
pub fn run_races(format: String) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repository(&config)?;
    let races: Vec<RaceSummary> = repo.list_races()?.iter().map(RaceSummary::from).collect();

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&races)?),
        "table" => {
            for race in &races {
                println!("{}  {}  {:<4}  {}", race.id, race.date, race.venue, race.name);
            }
            eprintln!("{} races", races.len());
        }
        _ => bail!("Unknown format: {}", format),
    }
    Ok(())
}

/// Run prediction for a race card or a request file.
pub async fn run_predict(
    race_id: Option<String>,
    input: Option<PathBuf>,
    format: String,
    model_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    if let Some(path) = model_path {
        config.model.path = path.to_string_lossy().to_string();
    }

    let req = match (race_id, input) {
        (Some(race_id), _) => PredictRequest {
            race_id: Some(race_id),
            entrants: Vec::new(),
        },
        (None, Some(path)) => {
            let input_json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&input_json)?
        }
        (None, None) => bail!("Provide a RACE_ID or --input FILE"),
    };

    eprintln!("Loading model from: {}", config.model.path);
    let model = create_shared_model(&config.model.path)?;
    eprintln!("Model loaded successfully");

    let table = if !req.entrants.is_empty() {
        FeatureBuilder::from_features(&req.entrants)
    } else if let Some(race_id) = req.race_id.as_deref() {
        let fetcher = HttpFetcher::new(&config.scraper)?;
        let entrants = fetch_race_card(&fetcher, race_id).await?;
        let repo = open_repository(&config)?;
        let stats = repo.jockey_stats_for(&FeatureBuilder::jockey_ids(&entrants))?;
        FeatureBuilder::assemble(&entrants, &stats)
    } else {
        bail!("Request has neither entrants nor race_id");
    };

    if table.is_empty() {
        bail!("No entrant has a complete feature row");
    }
    eprintln!("Entrants: {}", table.len());

    let response = PredictResponse {
        race_id: req.race_id,
        predictions: score_table(model.as_ref(), &table)?,
    };

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "table" => {
            print_table(&response);
        }
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Print predictions sorted by probability.
fn print_table(response: &PredictResponse) {
    if let Some(race_id) = &response.race_id {
        println!("Race: {}", race_id);
        println!();
    }

    println!("=== Top-3 Probabilities ===");
    let mut sorted: Vec<_> = response.predictions.iter().collect();
    sorted.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    for p in sorted {
        println!("  {:>3}: {:>6.2}%", p.umaban, p.probability);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_crawl() {
        let cli = Cli::parse_from(["keiba-ingest", "crawl", "--year", "2023", "--limit", "5", "--resume"]);
        match cli.command {
            Commands::Crawl {
                year,
                limit,
                resume,
                force,
            } => {
                assert_eq!(year, Some(2023));
                assert_eq!(limit, Some(5));
                assert!(resume);
                assert!(!force);
            }
            _ => panic!("expected crawl"),
        }
    }

    #[test]
    fn test_parse_predict() {
        let cli = Cli::parse_from(["keiba-ingest", "predict", "202405021011", "--format", "table"]);
        match cli.command {
            Commands::Predict {
                race_id, format, ..
            } => {
                assert_eq!(race_id.as_deref(), Some("202405021011"));
                assert_eq!(format, "table");
            }
            _ => panic!("expected predict"),
        }

        assert!(Cli::try_parse_from([
            "keiba-ingest",
            "predict",
            "202405021011",
            "--input",
            "race.json"
        ])
        .is_err());
    }

    #[test]
    fn test_resume_ignores_later_years() {
        use crate::storage::repository::insert_race;
        use crate::storage::{Race, Venue};
        use chrono::NaiveDate;

        let repo = RaceRepository::in_memory().unwrap();
        for (id, year) in [("202305050812", 2023), ("202405050812", 2024)] {
            insert_race(
                repo.connection(),
                &Race {
                    id: id.to_string(),
                    name: "ジャパンカップ(G1)".to_string(),
                    venue: Venue::Tokyo,
                    date: NaiveDate::from_ymd_opt(year, 11, 26).unwrap(),
                },
            )
            .unwrap();
        }

        let space = AppConfig::default().scraper.id_space(Some(2023));
        let last = repo.last_race_id(space.year()).unwrap().unwrap();
        let mut remaining = space.resume_after(&last);
        assert_eq!(remaining.next().as_deref(), Some("202305050901"));
    }

    #[test]
    fn test_parse_refresh_jockeys() {
        let cli = Cli::parse_from(["keiba-ingest", "refresh-jockeys"]);
        assert!(matches!(cli.command, Commands::RefreshJockeys));
    }
}
