//! Request and response bodies for the relay's HTTP API.
//!
//! ```json
//! POST /download  {"url": "https://www.instagram.com/reel/ABC123/", "wait": true}
//! 200             {"success": true, "filename": "media_1700000000_..._ABC123.mp4",
//!                  "title": "...", "thumbnail": "https://..."}
//! 202             {"job_id": "5b9f...", "status": "pending"}
//! 422             {"success": false, "message": "The source site is rate-limiting us..."}
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::JobStatus;
use crate::observability::MetricsSnapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadPayload {
    pub url: String,
    /// Run inline and answer with the final outcome instead of a job handle
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreviewPayload {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobAcceptedResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

impl JobAcceptedResponse {
    pub fn pending(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DownloadReadyResponse {
    pub success: bool,
    pub filename: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

/// User-safe failure body for download and preview
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DownloadFailedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PreviewResponse {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CallbackResponse {
    pub success: bool,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
    pub jobs: usize,
    pub metrics: MetricsSnapshot,
}
