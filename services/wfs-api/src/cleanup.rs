//! Result set expiry background task.
//!
//! Result sets that have not been paged through for `ttl_hours` are removed,
//! record and stored request together.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info};

use storage::{CursorStore, ExpireStats};

use crate::metrics::WfsMetrics;

/// Configuration for the cleanup task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Whether cleanup is enabled
    pub enabled: bool,
    /// How often to run cleanup (in seconds)
    pub interval_secs: u64,
    /// Result sets unused for this long are expired
    pub ttl_hours: u32,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            ttl_hours: 24,
        }
    }
}

impl CleanupConfig {
    /// Load cleanup configuration from environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enabled = lookup("ENABLE_CURSOR_CLEANUP")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(defaults.enabled);

        let interval_secs = lookup("CURSOR_CLEANUP_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.interval_secs);

        let ttl_hours = lookup("CURSOR_TTL_HOURS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.ttl_hours);

        Self {
            enabled,
            interval_secs,
            ttl_hours,
        }
    }

    /// Cutoff (epoch millis) for a cleanup pass starting now.
    pub fn cutoff_millis(&self) -> i64 {
        (Utc::now() - Duration::hours(self.ttl_hours as i64)).timestamp_millis()
    }
}

/// Background task expiring unused result sets.
pub struct CursorCleanupTask {
    cursors: Arc<CursorStore>,
    metrics: Arc<WfsMetrics>,
    config: CleanupConfig,
}

impl CursorCleanupTask {
    pub fn new(cursors: Arc<CursorStore>, metrics: Arc<WfsMetrics>, config: CleanupConfig) -> Self {
        Self {
            cursors,
            metrics,
            config,
        }
    }

    /// Run the cleanup task once.
    pub async fn run_once(&self) -> Result<ExpireStats> {
        self.run_with_cutoff(self.config.cutoff_millis()).await
    }

    /// Expire result sets last used before `cutoff` (epoch millis).
    pub async fn run_with_cutoff(&self, cutoff: i64) -> Result<ExpireStats> {
        info!(
            ttl_hours = self.config.ttl_hours,
            cutoff = cutoff,
            "Starting result set cleanup"
        );

        let stats = self.cursors.expire_updated_before(cutoff).await?;
        self.metrics.record_cursors_expired(stats.records_deleted);

        info!(
            records = stats.records_deleted,
            blobs = stats.blobs_deleted,
            errors = stats.delete_errors,
            "Result set cleanup complete"
        );

        Ok(stats)
    }

    /// Run the cleanup task in a loop.
    pub async fn run_forever(self) {
        if !self.config.enabled {
            info!("Result set cleanup disabled");
            return;
        }

        info!(
            interval_secs = self.config.interval_secs,
            ttl_hours = self.config.ttl_hours,
            "Starting result set cleanup task"
        );

        // First tick completes immediately
        let mut ticker = interval(TokioDuration::from_secs(self.config.interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Result set cleanup failed");
            }
        }
    }
}
