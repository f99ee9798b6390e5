mod admin;
mod config;
mod db;
mod errors;
mod models;
mod questionnaire;
mod recommendation;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, PgRepository};
use crate::questionnaire::repository::{MemoryRepository, Repository};
use crate::recommendation::courses::CourseCatalog;
use crate::recommendation::model_store::{ModelInfo, ModelStore};
use crate::recommendation::scorer::{RecommendationScorer, ScoringConfig};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Orientation API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize persistence
    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => Arc::new(PgRepository::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set, using in-memory repository (data is lost on restart)");
            Arc::new(MemoryRepository::new())
        }
    };

    // Initialize the recommendation scorer (classifier blending via ENABLE_CLASSIFIER)
    let (scorer, model_info) = build_scorer(&config)?;
    info!(
        "Recommendation scorer ready: {} courses, model {}",
        scorer.catalog().len(),
        model_info.model_type
    );

    let state = AppState {
        repo,
        scorer: Arc::new(scorer),
        config: config.clone(),
        model_info,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the scorer, loading or bootstrapping the classifier when enabled.
fn build_scorer(config: &Config) -> Result<(RecommendationScorer, ModelInfo)> {
    let catalog = CourseCatalog::default();
    let scoring = ScoringConfig {
        renormalize_boost: config.renormalize_boost,
        ..ScoringConfig::default()
    };
    let model_version = scoring.model_version.clone();
    let scorer = RecommendationScorer::new(catalog, scoring)?;

    if !config.enable_classifier {
        return Ok((scorer, ModelInfo::disabled(&model_version)));
    }

    let artifacts = ModelStore::new(&config.model_path)
        .load_or_bootstrap(scorer.catalog().len())
        .context("Failed to prepare classifier model")?;
    let info = ModelInfo::from(&artifacts);
    let scorer = scorer
        .with_model(artifacts.into_blend_model())
        .context("Classifier does not fit the course catalog")?;
    Ok((scorer, info))
}

/// Restricts CORS to ALLOWED_ORIGINS when set; permissive otherwise.
fn build_cors(config: &Config) -> Result<CorsLayer> {
    if config.allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = config
        .allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{o}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
