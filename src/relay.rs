//! Ties the pieces together: strategy → orchestrator → remote fallback → registry.
//!
//! A download either finishes locally, or, when the upstream blocks us,
//! becomes a pending job that the remote worker completes via callback.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifacts::download_stem;
use crate::extraction::{MediaExtractor, MediaPreview, user_message};
use crate::jobs::{Completion, JobRegistry};
use crate::observability::Metrics;
use crate::orchestrator::{DownloadOutcome, Orchestrator};
use crate::remote::{RemoteTrigger, TriggerOutcome};
use crate::strategy::{DownloadRequest, Strategy, StrategyError};

pub const TRIGGER_FAILED_MESSAGE: &str =
    "The remote worker could not be started. Please try again later.";

/// Result of a download the caller waited for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineResult {
    Ready {
        file_name: String,
        title: Option<String>,
        thumbnail_url: Option<String>,
    },
    /// Escalated to the remote worker; poll the job
    Deferred { job_id: Uuid },
    Failed { message: String },
}

pub struct Relay {
    strategy: Strategy,
    orchestrator: Orchestrator,
    extractor: Arc<dyn MediaExtractor>,
    trigger: Arc<dyn RemoteTrigger>,
    registry: Arc<JobRegistry>,
    metrics: Arc<Metrics>,
}

impl Relay {
    pub fn new(
        strategy: Strategy,
        extractor: Arc<dyn MediaExtractor>,
        trigger: Arc<dyn RemoteTrigger>,
        registry: Arc<JobRegistry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let orchestrator = Orchestrator::new(extractor.clone(), strategy.delay());
        Self {
            strategy,
            orchestrator,
            extractor,
            trigger,
            registry,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn remote_configured(&self) -> bool {
        self.trigger.is_configured()
    }

    pub fn prepare(&self, raw_url: &str) -> Result<DownloadRequest, StrategyError> {
        self.strategy.request(raw_url)
    }

    /// Runs the request to completion on the caller's task
    pub async fn download(&self, request: &DownloadRequest) -> InlineResult {
        let stem = download_stem(Uuid::new_v4(), Utc::now());

        match self.orchestrator.run(request, &stem).await {
            DownloadOutcome::Success {
                file_name,
                title,
                thumbnail_url,
            } => {
                self.metrics.download_succeeded();
                InlineResult::Ready {
                    file_name,
                    title,
                    thumbnail_url,
                }
            }
            DownloadOutcome::Blocked { reason, message } => {
                self.metrics.download_blocked();
                if !self.trigger.is_configured() {
                    info!(%reason, "Local attempts blocked, no remote worker");
                    return InlineResult::Failed { message };
                }

                let job_id = self.registry.create().await;
                info!(%job_id, %reason, "Local attempts blocked, escalating");

                match self.escalate(request, job_id, &message).await {
                    Ok(()) => InlineResult::Deferred { job_id },
                    Err(message) => {
                        // The caller never sees this id
                        self.registry.remove(job_id).await;
                        InlineResult::Failed { message }
                    }
                }
            }
            DownloadOutcome::Exhausted { message, .. } => {
                self.metrics.download_exhausted();
                InlineResult::Failed { message }
            }
        }
    }

    /// Registers a pending job and runs it in the background
    pub async fn submit(self: &Arc<Self>, request: DownloadRequest) -> Uuid {
        let job_id = self.registry.create().await;
        let relay = Arc::clone(self);

        tokio::spawn(async move {
            relay.run_job(job_id, request).await;
        });

        job_id
    }

    async fn run_job(&self, job_id: Uuid, request: DownloadRequest) {
        let stem = download_stem(job_id, Utc::now());

        let settled = match self.orchestrator.run(&request, &stem).await {
            DownloadOutcome::Success {
                file_name,
                title,
                thumbnail_url,
            } => {
                self.metrics.download_succeeded();
                self.registry
                    .complete(
                        job_id,
                        Completion {
                            file_name,
                            title,
                            thumbnail_url,
                        },
                    )
                    .await
                    .map(drop)
            }
            DownloadOutcome::Blocked { reason, message } => {
                self.metrics.download_blocked();
                info!(%job_id, %reason, "Local attempts blocked, escalating");
                // escalate() settles the job itself on failure
                let _ = self.escalate(&request, job_id, &message).await;
                Ok(())
            }
            DownloadOutcome::Exhausted { message, .. } => {
                self.metrics.download_exhausted();
                self.registry.fail(job_id, message).await.map(drop)
            }
        };

        if let Err(e) = settled {
            warn!(%job_id, error = %e, "Could not record job outcome");
        }
    }

    /// Hands the original URL to the remote worker. On failure the job is
    /// marked failed and the user-facing reason is returned.
    async fn escalate(
        &self,
        request: &DownloadRequest,
        job_id: Uuid,
        blocked_message: &str,
    ) -> Result<(), String> {
        let message = match self.trigger.dispatch(request.original_url(), job_id).await {
            TriggerOutcome::Triggered => {
                self.metrics.remote_triggered();
                return Ok(());
            }
            TriggerOutcome::MissingCredentials => blocked_message.to_string(),
            TriggerOutcome::TriggerFailed { message } => {
                self.metrics.remote_failed();
                warn!(%job_id, reason = %message, "Remote fallback failed");
                TRIGGER_FAILED_MESSAGE.to_string()
            }
        };

        if let Err(e) = self.registry.fail(job_id, message.clone()).await {
            warn!(%job_id, error = %e, "Could not mark job failed");
        }
        Err(message)
    }

    /// Metadata for the request using the first fingerprint only
    pub async fn preview(&self, request: &DownloadRequest) -> Result<MediaPreview, String> {
        let Some(attempt) = request.attempts().first() else {
            return Err("no attempts configured".to_string());
        };

        self.extractor
            .peek(request.url(), attempt)
            .await
            .map_err(|e| {
                let kind = e.kind();
                warn!(url = %request.url(), %kind, error = %e, "Preview failed");
                user_message(kind, e.raw())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::jobs::{JobStatus, PENDING_EXPIRED_MESSAGE};
    use crate::orchestrator::tests::{ScriptedExtractor, fail, media};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingTrigger {
        outcome: TriggerOutcome,
        calls: Mutex<Vec<(String, Uuid)>>,
    }

    impl RecordingTrigger {
        fn new(outcome: TriggerOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RemoteTrigger for RecordingTrigger {
        async fn dispatch(&self, url: &str, job_id: Uuid) -> TriggerOutcome {
            self.calls.lock().unwrap().push((url.to_string(), job_id));
            self.outcome.clone()
        }

        fn is_configured(&self) -> bool {
            self.outcome != TriggerOutcome::MissingCredentials
        }
    }

    fn trigger_calls(trigger: &RecordingTrigger) -> Vec<(String, Uuid)> {
        trigger.calls.lock().unwrap().clone()
    }

    fn relay(extractor: Arc<ScriptedExtractor>, trigger: Arc<RecordingTrigger>) -> Arc<Relay> {
        let defaults = Strategy::from_config(&ExtractorConfig::default()).unwrap();
        let strategy = Strategy::new(defaults.attempts().to_vec(), Duration::ZERO).unwrap();
        Arc::new(Relay::new(
            strategy,
            extractor,
            trigger,
            Arc::new(JobRegistry::new()),
            Arc::new(Metrics::new()),
        ))
    }

    fn forbidden_thrice() -> Arc<ScriptedExtractor> {
        Arc::new(ScriptedExtractor::new([
            fail("HTTP Error 403: Forbidden"),
            fail("HTTP Error 403: Forbidden"),
            fail("HTTP Error 403: Forbidden"),
        ]))
    }

    async fn wait_for_terminal(relay: &Relay, job_id: Uuid) -> JobStatus {
        for _ in 0..200 {
            let job = relay.registry().get(job_id).await.unwrap();
            if job.status.is_terminal() {
                return job.status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        JobStatus::Pending
    }

    #[tokio::test]
    async fn blocked_download_escalates_with_original_url() {
        let extractor = forbidden_thrice();
        let trigger = RecordingTrigger::new(TriggerOutcome::Triggered);
        let relay = relay(extractor.clone(), trigger.clone());

        let request = relay.prepare("https://site/reel/ABC123?utm_source=x").unwrap();
        let result = relay.download(&request).await;

        let InlineResult::Deferred { job_id } = result else {
            panic!("expected Deferred, got {result:?}");
        };
        assert_eq!(extractor.labels(), ["desktop", "mobile", "stealth"]);
        assert!(
            extractor.calls.lock().unwrap().iter().all(|c| c.0 == "https://site/reel/ABC123")
        );

        let calls = trigger.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("https://site/reel/ABC123?utm_source=x".to_string(), job_id));
        drop(calls);

        let job = relay.registry().get(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(relay.metrics().snapshot().remote_triggered, 1);
    }

    #[tokio::test]
    async fn missing_credentials_fail_with_blocked_message() {
        let relay_trigger = RecordingTrigger::new(TriggerOutcome::MissingCredentials);
        let relay = relay(forbidden_thrice(), relay_trigger.clone());

        let request = relay.prepare("https://site/reel/ABC123").unwrap();
        let result = relay.download(&request).await;

        match result {
            InlineResult::Failed { message } => {
                assert!(message.contains("blocking this server"), "{message}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!relay.remote_configured());
        assert!(trigger_calls(&relay_trigger).is_empty());
        assert!(relay.registry().is_empty().await);
    }

    #[tokio::test]
    async fn inline_trigger_failure_leaves_no_job_behind() {
        let trigger = RecordingTrigger::new(TriggerOutcome::TriggerFailed {
            message: "trigger returned HTTP 500".to_string(),
        });
        let relay = relay(forbidden_thrice(), trigger.clone());

        let request = relay.prepare("https://site/reel/ABC123").unwrap();
        let result = relay.download(&request).await;

        match result {
            InlineResult::Failed { message } => assert_eq!(message, TRIGGER_FAILED_MESSAGE),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(trigger_calls(&trigger).len(), 1);
        assert!(relay.registry().is_empty().await);
    }

    #[tokio::test]
    async fn trigger_failure_fails_background_job() {
        let trigger = RecordingTrigger::new(TriggerOutcome::TriggerFailed {
            message: "trigger returned HTTP 401".to_string(),
        });
        let relay = relay(forbidden_thrice(), trigger);

        let request = relay.prepare("https://site/reel/ABC123").unwrap();
        let job_id = relay.submit(request).await;

        assert_eq!(wait_for_terminal(&relay, job_id).await, JobStatus::Failed);
        let job = relay.registry().get(job_id).await.unwrap();
        assert_eq!(job.message.as_deref(), Some(TRIGGER_FAILED_MESSAGE));
        assert_ne!(job.message.as_deref(), Some(PENDING_EXPIRED_MESSAGE));
        assert_eq!(relay.metrics().snapshot().remote_failed, 1);
    }

    #[tokio::test]
    async fn background_success_makes_job_ready() {
        let extractor = Arc::new(ScriptedExtractor::new([
            fail("HTTP Error 429: Too Many Requests"),
            Ok(media("media_1_ABC123.mp4")),
        ]));
        let trigger = RecordingTrigger::new(TriggerOutcome::Triggered);
        let relay = relay(extractor, trigger.clone());

        let request = relay.prepare("https://site/reel/ABC123").unwrap();
        let job_id = relay.submit(request).await;

        assert_eq!(wait_for_terminal(&relay, job_id).await, JobStatus::Ready);
        let job = relay.registry().get(job_id).await.unwrap();
        assert_eq!(job.file_name.as_deref(), Some("media_1_ABC123.mp4"));
        assert!(trigger.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn private_content_is_not_escalated() {
        let extractor = Arc::new(ScriptedExtractor::new([fail("ERROR: This video is private")]));
        let trigger = RecordingTrigger::new(TriggerOutcome::Triggered);
        let relay = relay(extractor, trigger.clone());

        let request = relay.prepare("https://site/reel/P").unwrap();
        let result = relay.download(&request).await;

        assert!(matches!(result, InlineResult::Failed { ref message } if message.contains("private")));
        assert!(trigger.calls.lock().unwrap().is_empty());
        assert!(relay.registry().is_empty().await);
    }

    #[tokio::test]
    async fn preview_uses_first_fingerprint() {
        let script: Vec<Result<crate::extraction::ExtractedMedia, crate::extraction::ExtractionError>> =
            Vec::new();
        let extractor = Arc::new(ScriptedExtractor::new(script));
        let trigger = RecordingTrigger::new(TriggerOutcome::Triggered);
        let relay = relay(extractor, trigger);

        let request = relay.prepare("https://site/reel/A").unwrap();
        assert_eq!(relay.preview(&request).await, Ok(MediaPreview::default()));
    }
}
