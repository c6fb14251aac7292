//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::config::Config;
use crate::error::{AdminError, Result};
use crate::models::{CacheStatsResponse, ClearResponse, HealthResponse, StatsResponse};
use crate::shield::Shield;

/// Application state shared across all handlers.
///
/// Holds a handle to the process-wide [`Shield`]; cloning it is cheap.
#[derive(Clone)]
pub struct AppState {
    pub shield: Shield,
}

impl AppState {
    /// Creates a new AppState around existing instances.
    pub fn new(shield: Shield) -> Self {
        Self { shield }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Shield::from_config(config))
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.shield.all_cache_stats(),
        state.shield.upstream.stats(),
    ))
}

/// Handler for GET /stats/caches/:name
pub async fn cache_stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CacheStatsResponse>> {
    let stats = state
        .shield
        .cache_stats(&name)
        .ok_or_else(|| AdminError::UnknownCache(name.clone()))?;

    Ok(Json(CacheStatsResponse::new(name, stats)))
}

/// Handler for DELETE /caches/:name
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearResponse>> {
    if !state.shield.clear_cache(&name) {
        return Err(AdminError::UnknownCache(name));
    }

    info!(cache = %name, "cache cleared by operator");
    Ok(Json(ClearResponse::new(name)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
