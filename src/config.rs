//! Configuration Module
//!
//! Handles loading the capacities, TTLs and batching thresholds of the
//! shared instances from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::batch::BatchConfig;

/// Process configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Capacity of the upstream-result cache
    pub analysis_cache_max_entries: usize,
    /// Default TTL in seconds of the upstream-result cache
    pub analysis_cache_ttl: u64,
    /// Capacity of the prompt-optimization cache
    pub prompt_cache_max_entries: usize,
    /// Default TTL in seconds of the prompt-optimization cache
    pub prompt_cache_ttl: u64,
    /// Capacity of the provider status cache
    pub status_cache_max_entries: usize,
    /// Default TTL in seconds of the provider status cache
    pub status_cache_ttl: u64,
    /// Group size that triggers an immediate upstream call
    pub batch_size: usize,
    /// Milliseconds a partial group waits before flushing
    pub batch_timeout_ms: u64,
    /// Admin HTTP port
    pub server_port: u16,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ANALYSIS_CACHE_MAX_ENTRIES` (default: 100)
    /// - `ANALYSIS_CACHE_TTL_SECS` (default: 3600)
    /// - `PROMPT_CACHE_MAX_ENTRIES` (default: 500)
    /// - `PROMPT_CACHE_TTL_SECS` (default: 1800)
    /// - `STATUS_CACHE_MAX_ENTRIES` (default: 50)
    /// - `STATUS_CACHE_TTL_SECS` (default: 300)
    /// - `BATCH_SIZE` (default: 5, clamped to at least 1)
    /// - `BATCH_TIMEOUT_MS` (default: 1000)
    /// - `SERVER_PORT` (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            analysis_cache_max_entries: env_or(
                "ANALYSIS_CACHE_MAX_ENTRIES",
                defaults.analysis_cache_max_entries,
            ),
            analysis_cache_ttl: env_or("ANALYSIS_CACHE_TTL_SECS", defaults.analysis_cache_ttl),
            prompt_cache_max_entries: env_or(
                "PROMPT_CACHE_MAX_ENTRIES",
                defaults.prompt_cache_max_entries,
            ),
            prompt_cache_ttl: env_or("PROMPT_CACHE_TTL_SECS", defaults.prompt_cache_ttl),
            status_cache_max_entries: env_or(
                "STATUS_CACHE_MAX_ENTRIES",
                defaults.status_cache_max_entries,
            ),
            status_cache_ttl: env_or("STATUS_CACHE_TTL_SECS", defaults.status_cache_ttl),
            batch_size: env_or("BATCH_SIZE", defaults.batch_size).max(1),
            batch_timeout_ms: env_or("BATCH_TIMEOUT_MS", defaults.batch_timeout_ms),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis_cache_max_entries: 100,
            analysis_cache_ttl: 3600,
            prompt_cache_max_entries: 500,
            prompt_cache_ttl: 1800,
            status_cache_max_entries: 50,
            status_cache_ttl: 300,
            batch_size: 5,
            batch_timeout_ms: 1000,
            server_port: 3000,
        }
    }
}
