//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::batch::BatcherStats;
use crate::cache::CacheStats;

/// Response body for a single cache (GET /stats/caches/:name)
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    /// Cache name
    pub name: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Lifetime hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl CacheStatsResponse {
    pub fn new(name: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            name: name.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Every named cache
    pub caches: BTreeMap<String, CacheStatsResponse>,
    /// The upstream batcher
    pub batcher: BatcherStats,
}

impl StatsResponse {
    pub fn new(caches: BTreeMap<String, CacheStats>, batcher: BatcherStats) -> Self {
        let caches = caches
            .into_iter()
            .map(|(name, stats)| {
                let body = CacheStatsResponse::new(name.clone(), stats);
                (name, body)
            })
            .collect();
        Self { caches, batcher }
    }
}

/// Response body for clearing a cache (DELETE /caches/:name)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
    /// The cache that was cleared
    pub name: String,
}

impl ClearResponse {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            message: format!("Cache '{}' cleared", name),
            name,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
