//! In-memory job registry
//!
//! Single source of truth for deferred downloads. Jobs start `Pending` and
//! move once to `Ready` or `Failed`; terminal jobs never change again, so
//! concurrent pollers always observe monotonic progress. State lives for the
//! process lifetime only.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub const PENDING_EXPIRED_MESSAGE: &str = "The remote worker did not respond in time. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Ready,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Set only when `Ready`
    #[serde(rename = "filename", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "thumbnail", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Set only when `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn pending(job_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            file_name: None,
            title: None,
            thumbnail_url: None,
            message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
    #[error("job {0} already finished")]
    AlreadyTerminal(Uuid),
}

/// Artifact details attached to a job when it becomes ready
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub file_name: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl Completion {
    pub fn file(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh `Pending` job
    pub async fn create(&self) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs
            .write()
            .await
            .insert(job_id, Job::pending(job_id, Utc::now()));
        debug!(%job_id, "Job created");
        job_id
    }

    pub async fn get(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// `Pending -> Ready`. A second completion is rejected.
    pub async fn complete(&self, job_id: Uuid, completion: Completion) -> Result<Job, RegistryError> {
        let job = self
            .transition(job_id, |job| {
                job.status = JobStatus::Ready;
                job.file_name = Some(completion.file_name);
                job.title = completion.title;
                job.thumbnail_url = completion.thumbnail_url;
            })
            .await?;
        info!(%job_id, file = ?job.file_name, "Job ready");
        Ok(job)
    }

    /// `Pending -> Failed`
    pub async fn fail(&self, job_id: Uuid, message: impl Into<String>) -> Result<Job, RegistryError> {
        let message = message.into();
        let job = self
            .transition(job_id, |job| {
                job.status = JobStatus::Failed;
                job.message = Some(message);
            })
            .await?;
        info!(%job_id, message = ?job.message, "Job failed");
        Ok(job)
    }

    async fn transition(
        &self,
        job_id: Uuid,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(RegistryError::NotFound(job_id))?;

        if job.status.is_terminal() {
            return Err(RegistryError::AlreadyTerminal(job_id));
        }

        apply(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Fails every `Pending` job created more than `max_age` before `now`.
    /// Returns how many jobs were expired.
    pub async fn expire_pending(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = now - max_age;

        let mut jobs = self.jobs.write().await;
        let mut expired = 0;
        for job in jobs.values_mut() {
            if job.status == JobStatus::Pending && job.created_at < cutoff {
                job.status = JobStatus::Failed;
                job.message = Some(PENDING_EXPIRED_MESSAGE.to_string());
                job.updated_at = now;
                expired += 1;
            }
        }

        if expired > 0 {
            info!(expired, "Expired stale pending jobs");
        }
        expired
    }

    /// Drops a job outright; used when its id was never handed out
    pub async fn remove(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.write().await.remove(&job_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
