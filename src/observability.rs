//! Observability: tracing setup and in-process counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Counters reported by the health endpoint
#[derive(Debug, Default)]
pub struct Metrics {
    downloads_succeeded: AtomicU64,
    downloads_blocked: AtomicU64,
    downloads_exhausted: AtomicU64,
    remote_triggered: AtomicU64,
    remote_failed: AtomicU64,
    callbacks_received: AtomicU64,
    artifacts_swept: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_succeeded(&self) {
        self.downloads_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_succeeded", "Metric incremented");
    }

    pub fn download_blocked(&self) {
        self.downloads_blocked.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_blocked", "Metric incremented");
    }

    pub fn download_exhausted(&self) {
        self.downloads_exhausted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_exhausted", "Metric incremented");
    }

    pub fn remote_triggered(&self) {
        self.remote_triggered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "remote_triggered", "Metric incremented");
    }

    pub fn remote_failed(&self) {
        self.remote_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "remote_failed", "Metric incremented");
    }

    pub fn callback_received(&self) {
        self.callbacks_received.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "callbacks_received", "Metric incremented");
    }

    pub fn artifacts_swept(&self, count: u64) {
        self.artifacts_swept.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            downloads_succeeded: self.downloads_succeeded.load(Ordering::Relaxed),
            downloads_blocked: self.downloads_blocked.load(Ordering::Relaxed),
            downloads_exhausted: self.downloads_exhausted.load(Ordering::Relaxed),
            remote_triggered: self.remote_triggered.load(Ordering::Relaxed),
            remote_failed: self.remote_failed.load(Ordering::Relaxed),
            callbacks_received: self.callbacks_received.load(Ordering::Relaxed),
            artifacts_swept: self.artifacts_swept.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub downloads_succeeded: u64,
    pub downloads_blocked: u64,
    pub downloads_exhausted: u64,
    pub remote_triggered: u64,
    pub remote_failed: u64,
    pub callbacks_received: u64,
    pub artifacts_swept: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.download_succeeded();
        metrics.download_succeeded();
        metrics.remote_triggered();
        metrics.artifacts_swept(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.downloads_succeeded, 2);
        assert_eq!(snapshot.remote_triggered, 1);
        assert_eq!(snapshot.artifacts_swept, 3);
        assert_eq!(snapshot.downloads_blocked, 0);
    }
}
