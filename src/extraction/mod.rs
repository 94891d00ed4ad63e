//! Extraction adapter over the external media-extraction engine
//!
//! [`MediaExtractor`] is the seam the orchestrator drives. The production
//! implementation is [`YtDlpExtractor`]; tests substitute scripted doubles.

pub mod classify;
mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::strategy::AttemptConfig;

pub use classify::{ErrorKind, classify, user_message};
pub use ytdlp::YtDlpExtractor;

/// Container extensions the engine may finalize instead of the predicted one
pub const ALTERNATE_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "webm", "3gp"];

/// Raw failure from the engine. The message text is the only signal.
#[derive(Debug, Clone, Error)]
#[error("{raw}")]
pub struct ExtractionError {
    raw: String,
}

impl ExtractionError {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> ErrorKind {
        classify(&self.raw)
    }
}

/// A file written to the artifact area by a successful extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    /// Bare file name inside the artifact area
    pub file_name: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPreview {
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &str;

    /// Download one URL with one fingerprint. Output files are named
    /// `{output_stem}_{media id}.{ext}`. A failed call may leave partial files.
    async fn extract(
        &self,
        url: &str,
        config: &AttemptConfig,
        output_stem: &str,
    ) -> Result<ExtractedMedia, ExtractionError>;

    /// Metadata only, bounded by a short timeout
    async fn peek(&self, url: &str, config: &AttemptConfig)
    -> Result<MediaPreview, ExtractionError>;
}

/// Returns `predicted` if it exists, otherwise the first sibling with the
/// same stem and one of [`ALTERNATE_EXTENSIONS`].
pub async fn locate_output(predicted: &Path) -> Option<PathBuf> {
    if tokio::fs::try_exists(predicted).await.unwrap_or(false) {
        return Some(predicted.to_path_buf());
    }

    for ext in ALTERNATE_EXTENSIONS {
        let candidate = predicted.with_extension(ext);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn locate_output_prefers_predicted_path() {
        let dir = TempDir::new().unwrap();
        let predicted = dir.path().join("media_1_abc.mp4");
        tokio::fs::write(&predicted, b"data").await.unwrap();
        tokio::fs::write(dir.path().join("media_1_abc.mkv"), b"other").await.unwrap();

        assert_eq!(locate_output(&predicted).await, Some(predicted));
    }

    #[tokio::test]
    async fn locate_output_probes_alternate_extensions() {
        let dir = TempDir::new().unwrap();
        let predicted = dir.path().join("media_1_abc.mp4");
        let actual = dir.path().join("media_1_abc.webm");
        tokio::fs::write(&actual, b"data").await.unwrap();

        assert_eq!(locate_output(&predicted).await, Some(actual));
    }

    #[tokio::test]
    async fn locate_output_gives_up() {
        let dir = TempDir::new().unwrap();
        let predicted = dir.path().join("media_1_abc.mp4");
        tokio::fs::write(dir.path().join("media_1_abc.mov"), b"data").await.unwrap();

        assert_eq!(locate_output(&predicted).await, None);
    }

    #[test]
    fn extraction_error_classifies_its_text() {
        let err = ExtractionError::new("HTTP Error 403: Forbidden");
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.to_string(), "HTTP Error 403: Forbidden");
    }
}
