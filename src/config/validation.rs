use super::models::Config;
use crate::strategy::requires_merge;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("At least one fingerprint must be configured")]
    NoFingerprints,

    #[error("Fingerprint '{label}' has an empty user agent")]
    EmptyUserAgent { label: String },

    #[error("Format selector '{format}' requires merging separate streams")]
    MergingFormat { format: String },

    #[error("{field} must be positive")]
    ZeroValue { field: &'static str },

    #[error("Peek timeout ({peek}s) must not exceed download timeout ({download}s)")]
    PeekTimeoutTooLong { peek: u64, download: u64 },

    #[error("public_base_url must be an absolute http(s) URL, got '{url}'")]
    InvalidPublicBaseUrl { url: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_extractor(config)?;
    validate_remote(config)?;
    validate_retention(config)?;
    Ok(())
}

fn validate_extractor(config: &Config) -> Result<(), ValidationError> {
    let extractor = &config.extractor;

    if extractor.fingerprints.is_empty() {
        return Err(ValidationError::NoFingerprints);
    }

    if let Some(fp) = extractor
        .fingerprints
        .iter()
        .find(|fp| fp.user_agent.trim().is_empty())
    {
        return Err(ValidationError::EmptyUserAgent {
            label: fp.label.clone(),
        });
    }

    if requires_merge(&extractor.format) {
        return Err(ValidationError::MergingFormat {
            format: extractor.format.clone(),
        });
    }

    for (field, value) in [
        ("extractor.download_timeout_secs", extractor.download_timeout_secs),
        ("extractor.peek_timeout_secs", extractor.peek_timeout_secs),
        ("extractor.socket_timeout_secs", extractor.socket_timeout_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::ZeroValue { field });
        }
    }

    if extractor.peek_timeout_secs > extractor.download_timeout_secs {
        return Err(ValidationError::PeekTimeoutTooLong {
            peek: extractor.peek_timeout_secs,
            download: extractor.download_timeout_secs,
        });
    }

    Ok(())
}

/// Missing credentials are allowed (offline mode); a malformed base URL is not
fn validate_remote(config: &Config) -> Result<(), ValidationError> {
    if config.remote.request_timeout_secs == 0 {
        return Err(ValidationError::ZeroValue {
            field: "remote.request_timeout_secs",
        });
    }

    if let Some(base) = &config.remote.public_base_url {
        let valid = url::Url::parse(base)
            .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            return Err(ValidationError::InvalidPublicBaseUrl { url: base.clone() });
        }
    }

    Ok(())
}

fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    let retention = &config.retention;

    for (field, value) in [
        ("retention.artifact_ttl_secs", retention.artifact_ttl_secs),
        ("retention.sweep_interval_secs", retention.sweep_interval_secs),
        ("retention.pending_job_ttl_secs", retention.pending_job_ttl_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::ZeroValue { field });
        }
    }

    Ok(())
}
