//! Attempt strategy: URL normalization and the ordered fingerprint list
//!
//! Ordering is fixed by configuration and never shuffled, so a failing URL
//! is always retried the same way.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::{ExtractorConfig, FingerprintConfig};
use crate::humanize::ByteSize;

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("url is empty")]
    Empty,
    #[error("url is not valid: {0}")]
    Invalid(String),
    #[error("unsupported url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error("at least one attempt must be configured")]
    NoAttempts,
    #[error("format selector '{0}' requires merging separate streams")]
    MergingFormat(String),
    #[error(transparent)]
    Url(#[from] UrlError),
}

/// Strips query string and fragment (tracking parameters) from a post URL
pub fn normalize_url(raw: &str) -> Result<String, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut url = Url::parse(raw).map_err(|e| UrlError::Invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(UrlError::Invalid(format!("{raw} has no host")));
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url.into())
}

/// True when any alternative of the selector combines streams with `+`
pub fn requires_merge(format: &str) -> bool {
    format.split('/').any(|alternative| alternative.contains('+'))
}

/// One fingerprint tried against the upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptConfig {
    pub label: String,
    pub user_agent: String,
    /// Sent in this order; the user agent is passed separately
    pub headers: Vec<(String, String)>,
    pub format: String,
    pub socket_timeout: Duration,
    pub proxy: Option<String>,
    pub max_filesize: ByteSize,
    pub verify_certificates: bool,
}

impl AttemptConfig {
    fn from_fingerprint(fingerprint: &FingerprintConfig, extractor: &ExtractorConfig) -> Self {
        let mut headers = vec![
            ("Accept".to_string(), ACCEPT.to_string()),
            ("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string()),
            ("Referer".to_string(), extractor.referer.clone()),
        ];

        if !fingerprint.minimal_headers {
            headers.extend([
                ("Sec-Fetch-Dest".to_string(), "document".to_string()),
                ("Sec-Fetch-Mode".to_string(), "navigate".to_string()),
                ("Sec-Fetch-Site".to_string(), "none".to_string()),
            ]);
        }

        Self {
            label: fingerprint.label.clone(),
            user_agent: fingerprint.user_agent.clone(),
            headers,
            format: extractor.format.clone(),
            socket_timeout: Duration::from_secs(extractor.socket_timeout_secs),
            proxy: extractor.proxy.clone(),
            max_filesize: extractor.max_filesize,
            verify_certificates: extractor.verify_certificates,
        }
    }
}

/// A URL ready to be attempted. Immutable once built.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    original_url: String,
    url: String,
    attempts: Vec<AttemptConfig>,
}

impl DownloadRequest {
    /// URL exactly as the caller submitted it
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Normalized URL handed to the extractor
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn attempts(&self) -> &[AttemptConfig] {
        &self.attempts
    }
}

#[derive(Debug, Clone)]
pub struct Strategy {
    attempts: Vec<AttemptConfig>,
    delay: Duration,
}

impl Strategy {
    pub fn new(attempts: Vec<AttemptConfig>, delay: Duration) -> Result<Self, StrategyError> {
        if attempts.is_empty() {
            return Err(StrategyError::NoAttempts);
        }
        if let Some(attempt) = attempts.iter().find(|a| requires_merge(&a.format)) {
            return Err(StrategyError::MergingFormat(attempt.format.clone()));
        }
        Ok(Self { attempts, delay })
    }

    pub fn from_config(extractor: &ExtractorConfig) -> Result<Self, StrategyError> {
        let attempts = extractor
            .fingerprints
            .iter()
            .map(|fp| AttemptConfig::from_fingerprint(fp, extractor))
            .collect();
        Self::new(attempts, extractor.attempt_delay())
    }

    /// Normalizes `raw_url` and pairs it with the full attempt list
    pub fn request(&self, raw_url: &str) -> Result<DownloadRequest, StrategyError> {
        let url = normalize_url(raw_url)?;
        Ok(DownloadRequest {
            original_url: raw_url.trim().to_string(),
            url,
            attempts: self.attempts.clone(),
        })
    }

    pub fn attempts(&self) -> &[AttemptConfig] {
        &self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
