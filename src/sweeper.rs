//! Retention sweeper: removes aged artifacts and expires stuck jobs
//!
//! Runs as one detached task. Artifacts are deleted by age alone; whether a
//! client has fetched the file yet is not tracked.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactMeta, ArtifactStore};
use crate::config::RetentionConfig;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;

/// Result of one sweep pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
    pub jobs_expired: usize,
}

pub struct Sweeper {
    artifacts: ArtifactStore,
    registry: Arc<JobRegistry>,
    metrics: Arc<Metrics>,
    artifact_ttl: Duration,
    pending_ttl: Duration,
    interval: Duration,
}

impl Sweeper {
    pub fn from_config(
        config: &RetentionConfig,
        artifacts: ArtifactStore,
        registry: Arc<JobRegistry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            artifacts,
            registry,
            metrics,
            artifact_ttl: config.artifact_ttl(),
            pending_ttl: config.pending_job_ttl(),
            interval: config.sweep_interval(),
        }
    }

    /// Starts the periodic sweep. The first pass runs immediately so files
    /// left over from a previous run are cleaned up.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_secs = self.interval.as_secs(),
                artifact_ttl_secs = self.artifact_ttl.as_secs(),
                "Retention sweeper started"
            );

            loop {
                ticker.tick().await;
                self.sweep_once(Utc::now()).await;
            }
        })
    }

    /// One pass at time `now`. Per-file failures are logged and counted.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();

        match chrono::Duration::from_std(self.artifact_ttl) {
            Ok(ttl) => self.sweep_artifacts(now - ttl, &mut stats).await,
            Err(e) => warn!(error = %e, "Artifact TTL out of range, skipping artifacts"),
        }

        stats.jobs_expired = self.registry.expire_pending(self.pending_ttl, now).await;
        self.metrics.artifacts_swept(stats.deleted as u64);

        if stats.deleted > 0 || stats.failed > 0 || stats.jobs_expired > 0 {
            info!(?stats, "Sweep complete");
        } else {
            debug!(?stats, "Sweep complete");
        }
        stats
    }

    async fn sweep_artifacts(&self, cutoff: DateTime<Utc>, stats: &mut SweepStats) {
        let entries = match self.artifacts.list().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to list artifacts");
                return;
            }
        };

        self.delete_expired(entries, cutoff, stats).await;
    }

    async fn delete_expired(
        &self,
        entries: Vec<ArtifactMeta>,
        cutoff: DateTime<Utc>,
        stats: &mut SweepStats,
    ) {
        for entry in entries {
            stats.scanned += 1;
            if entry.last_modified >= cutoff {
                continue;
            }

            match self.artifacts.delete(&entry.name).await {
                Ok(()) => {
                    debug!(name = %entry.name, size = entry.size, "Deleted expired artifact");
                    stats.deleted += 1;
                }
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "Failed to delete artifact");
                    stats.failed += 1;
                }
            }
        }
    }
}
