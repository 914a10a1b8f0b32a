//! keiba-ingest
//!
//! Crawls netkeiba.com race results into SQLite, assembles per-entrant
//! feature vectors and serves top-3 predictions over HTTP.

mod cli;
mod config;
mod error;
mod ingest;
mod model;
mod retry;
mod routes;
mod scraper;
mod storage;
mod types;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::model::create_shared_model;
use crate::routes::AppState;
use crate::scraper::HttpFetcher;
use crate::storage::RaceRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Crawl {
            year,
            limit,
            resume,
            force,
        } => cli::run_crawl(year, limit, resume, force).await,
        Commands::Ingest { race_id } => cli::run_ingest(race_id).await,
        Commands::RefreshJockeys => cli::run_refresh_jockeys().await,
        Commands::Races { format } => cli::run_races(format),
        Commands::Predict {
            race_id,
            input,
            format,
            model,
        } => cli::run_predict(race_id, input, format, model).await,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Model path: {}", config.model.path);
    tracing::info!("Store path: {}", config.database.path);

    // Load model
    tracing::info!("Loading ONNX model...");
    let model = create_shared_model(&config.model.path)?;
    tracing::info!("Model loaded successfully");

    let repo = RaceRepository::new(Path::new(&config.database.path))?;
    let source = Arc::new(HttpFetcher::new(&config.scraper)?);

    // Create application state
    let state = Arc::new(AppState {
        model,
        repo: Mutex::new(repo),
        source,
        config: config.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/model/info", get(routes::model_info))
        .route("/races", get(routes::list_races))
        .route("/predict", post(routes::predict))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
