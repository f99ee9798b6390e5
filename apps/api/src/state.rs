use std::sync::Arc;

use crate::config::Config;
use crate::questionnaire::repository::Repository;
use crate::recommendation::model_store::ModelInfo;
use crate::recommendation::scorer::RecommendationScorer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable persistence. PgRepository with DATABASE_URL, MemoryRepository otherwise.
    pub repo: Arc<dyn Repository>,
    /// Built once at startup; read-only afterwards, so handlers share it without locks.
    pub scorer: Arc<RecommendationScorer>,
    pub config: Config,
    pub model_info: ModelInfo,
}
