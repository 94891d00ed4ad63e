use thiserror::Error;

const MAX_URL_LEN: usize = 2048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadValidationError {
    #[error("url is required")]
    MissingUrl,
    #[error("url exceeds 2048 characters")]
    UrlTooLong,
    #[error("url must not contain whitespace or control characters")]
    InvalidCharacters,
}

/// Cheap structural checks before the URL reaches the strategy layer
pub fn validate_url_field(url: &str) -> Result<(), PayloadValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(PayloadValidationError::MissingUrl);
    }

    if url.len() > MAX_URL_LEN {
        return Err(PayloadValidationError::UrlTooLong);
    }

    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(PayloadValidationError::InvalidCharacters);
    }

    Ok(())
}
