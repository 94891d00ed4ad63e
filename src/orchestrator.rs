//! Local download orchestration: try each fingerprint in order until one
//! succeeds, a fatal error is seen, or the list runs out.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::extraction::{ErrorKind, MediaExtractor, user_message};
use crate::strategy::DownloadRequest;

/// Terminal result of one [`DownloadRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Success {
        file_name: String,
        title: Option<String>,
        thumbnail_url: Option<String>,
    },
    /// Attempts ran out on a block signal; eligible for remote fallback
    Blocked { reason: ErrorKind, message: String },
    Exhausted { kind: ErrorKind, message: String },
}

pub struct Orchestrator {
    extractor: Arc<dyn MediaExtractor>,
    delay: Duration,
}

impl Orchestrator {
    pub fn new(extractor: Arc<dyn MediaExtractor>, delay: Duration) -> Self {
        Self { extractor, delay }
    }

    /// Runs the attempts strictly one after another.
    ///
    /// The inter-attempt delay is slept before every attempt but the first.
    pub async fn run(&self, request: &DownloadRequest, output_stem: &str) -> DownloadOutcome {
        let total = request.attempts().len();
        let mut last = (ErrorKind::Unclassified, String::from("no attempts configured"));

        for (index, attempt) in request.attempts().iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            info!(
                url = %request.url(),
                attempt = index + 1,
                total,
                fingerprint = %attempt.label,
                extractor = self.extractor.name(),
                "Download attempt"
            );

            match self.extractor.extract(request.url(), attempt, output_stem).await {
                Ok(media) => {
                    info!(
                        url = %request.url(),
                        attempt = index + 1,
                        file = %media.file_name,
                        "Download succeeded"
                    );
                    return DownloadOutcome::Success {
                        file_name: media.file_name,
                        title: media.title,
                        thumbnail_url: media.thumbnail_url,
                    };
                }
                Err(err) => {
                    let kind = err.kind();
                    warn!(
                        url = %request.url(),
                        attempt = index + 1,
                        fingerprint = %attempt.label,
                        %kind,
                        error = %err,
                        "Download attempt failed"
                    );

                    if kind.is_fatal() {
                        return DownloadOutcome::Exhausted {
                            kind,
                            message: user_message(kind, err.raw()),
                        };
                    }
                    last = (kind, err.raw().to_string());
                }
            }
        }

        let (kind, raw) = last;
        let message = user_message(kind, &raw);
        warn!(url = %request.url(), %kind, "All download attempts failed");

        if kind.is_blocking() {
            DownloadOutcome::Blocked {
                reason: kind,
                message,
            }
        } else {
            DownloadOutcome::Exhausted { kind, message }
        }
    }
}
