//! Remote fallback: hand a blocked URL to a CI workflow that downloads it
//! from a different network and posts the file back to our callback endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RemoteConfig;

const USER_AGENT: &str = concat!("mediarelay/", env!("CARGO_PKG_VERSION"));
const MAX_LOGGED_BODY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Work is queued; the job stays pending until the callback arrives
    Triggered,
    /// Offline mode: no credential, repository, or public URL configured
    MissingCredentials,
    TriggerFailed { message: String },
}

#[async_trait]
pub trait RemoteTrigger: Send + Sync {
    /// Queue remote work for `url`. Returns without waiting for the worker.
    async fn dispatch(&self, url: &str, job_id: Uuid) -> TriggerOutcome;

    /// Whether dispatching can succeed at all (for health reporting)
    fn is_configured(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct DispatchBody<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    inputs: DispatchInputs<'a>,
}

#[derive(Debug, Serialize)]
struct DispatchInputs<'a> {
    video_url: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Clone)]
struct Credentials {
    token: String,
    repository: String,
    public_base_url: String,
}

/// GitHub Actions `workflow_dispatch` trigger
pub struct WorkflowDispatcher {
    client: Client,
    api_base: String,
    workflow: String,
    git_ref: String,
    credentials: Option<Credentials>,
}

impl WorkflowDispatcher {
    pub fn from_config(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        let credentials = match (&config.token, &config.repository, &config.public_base_url) {
            (Some(token), Some(repository), Some(public_base_url)) => Some(Credentials {
                token: token.clone(),
                repository: repository.clone(),
                public_base_url: public_base_url.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            workflow: config.workflow.clone(),
            git_ref: config.git_ref.clone(),
            credentials,
        })
    }

    fn dispatch_url(&self, repository: &str) -> String {
        format!(
            "{}/repos/{}/actions/workflows/{}/dispatches",
            self.api_base, repository, self.workflow
        )
    }
}

/// `{base}/callback?job_id={id}`
pub fn callback_url(public_base_url: &str, job_id: Uuid) -> String {
    format!(
        "{}/callback?job_id={}",
        public_base_url.trim_end_matches('/'),
        job_id
    )
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl RemoteTrigger for WorkflowDispatcher {
    async fn dispatch(&self, url: &str, job_id: Uuid) -> TriggerOutcome {
        let Some(creds) = &self.credentials else {
            warn!(%job_id, "Remote worker not configured, skipping fallback");
            return TriggerOutcome::MissingCredentials;
        };

        let callback = callback_url(&creds.public_base_url, job_id);
        let body = DispatchBody {
            git_ref: &self.git_ref,
            inputs: DispatchInputs {
                video_url: url,
                callback_url: &callback,
            },
        };

        let response = self
            .client
            .post(self.dispatch_url(&creds.repository))
            .bearer_auth(&creds.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == StatusCode::NO_CONTENT => {
                info!(%job_id, repository = %creds.repository, "Remote worker triggered");
                TriggerOutcome::Triggered
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!(%job_id, %status, body = truncate(&text), "Remote trigger rejected");
                TriggerOutcome::TriggerFailed {
                    message: format!("trigger returned HTTP {}", status.as_u16()),
                }
            }
            Err(e) => {
                warn!(%job_id, error = %e, "Remote trigger request failed");
                TriggerOutcome::TriggerFailed {
                    message: if e.is_timeout() {
                        "trigger request timed out".to_string()
                    } else {
                        "trigger request failed".to_string()
                    },
                }
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}
