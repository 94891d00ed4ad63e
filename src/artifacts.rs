//! Shared artifact area for downloaded media
//! Uses the object_store crate over a local directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use futures::stream::BoxStream;
use object_store::local::LocalFileSystem;
use object_store::{ObjectStore, PutPayload, path::Path as StoragePath};
use thiserror::Error;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 200;
const DEFAULT_UPLOAD_NAME: &str = "video.mp4";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Listing entry used by the retention sweeper
#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

pub struct ArtifactStream {
    pub size: u64,
    pub stream: BoxStream<'static, object_store::Result<Bytes>>,
}

/// Prefix for direct downloads: time plus a unique id, so concurrent jobs
/// never collide. The extractor appends `_{media id}.{ext}`.
pub fn download_stem(id: Uuid, now: DateTime<Utc>) -> String {
    format!("media_{}_{}", now.timestamp(), id.simple())
}

/// Name for a file uploaded by the remote worker for `job_id`
///
/// `upload_id` is fresh per request, so two deliveries for the same job
/// never write to the same file.
pub fn callback_name(job_id: Uuid, upload_id: Uuid, upload_name: Option<&str>) -> String {
    let cleaned = upload_name
        .map(|name| restrict(&sanitize_filename::sanitize(name)))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
    let upload_id = upload_id.simple().to_string();

    format!("job_{}_{}_{}", job_id.simple(), &upload_id[..8], cleaned)
}

/// Names we hand out are flat, ASCII, and never hidden or relative
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN + 64
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn restrict(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut cleaned = mapped.trim_start_matches('.').to_string();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    cleaned.chars().take(MAX_NAME_LEN).collect()
}

/// Artifact directory wrapped in an object store
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    store: Arc<dyn ObjectStore>,
}

impl ArtifactStore {
    /// Opens (creating if needed) the artifact directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let store = LocalFileSystem::new_with_prefix(&root)?;

        Ok(Self {
            root,
            store: Arc::new(store),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `data` under `name`, replacing nothing: names are unique per job
    pub async fn put(&self, name: &str, data: Bytes) -> Result<u64> {
        let path = checked_path(name)?;
        let size = data.len() as u64;

        self.store.put(&path, PutPayload::from(data)).await?;
        tracing::info!(name, size, "Stored artifact");

        Ok(size)
    }

    /// Opens an artifact for streaming to a client
    pub async fn open_stream(&self, name: &str) -> Result<ArtifactStream> {
        let path = checked_path(name)?;

        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => ArtifactError::NotFound(name.to_string()),
            other => other.into(),
        })?;

        Ok(ArtifactStream {
            size: result.meta.size as u64,
            stream: result.into_stream(),
        })
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let path = checked_path(name)?;

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self) -> Result<Vec<ArtifactMeta>> {
        let entries: Vec<_> = self.store.list(None).try_collect().await?;

        Ok(entries
            .into_iter()
            .map(|meta| ArtifactMeta {
                name: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            })
            .collect())
    }

    /// Deletes a listed artifact. Names come from [`ArtifactStore::list`].
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = StoragePath::from(name);

        self.store.delete(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => ArtifactError::NotFound(name.to_string()),
            other => other.into(),
        })
    }
}

fn checked_path(name: &str) -> Result<StoragePath> {
    if !is_safe_name(name) {
        return Err(ArtifactError::InvalidName(name.to_string()));
    }
    Ok(StoragePath::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn download_stem_is_time_and_id_based() {
        let id = Uuid::nil();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        assert_eq!(
            download_stem(id, now),
            "media_1700000000_00000000000000000000000000000000"
        );
        assert_ne!(
            download_stem(Uuid::new_v4(), now),
            download_stem(Uuid::new_v4(), now)
        );
    }

    #[test]
    fn callback_name_is_sanitized() {
        let id = Uuid::nil();
        let upload = Uuid::nil();
        let prefix = format!("job_{}_00000000_", id.simple());

        assert_eq!(
            callback_name(id, upload, Some("clip.mp4")),
            format!("{prefix}clip.mp4")
        );
        assert_eq!(
            callback_name(id, upload, Some("../../etc/passwd")),
            format!("{prefix}etcpasswd")
        );
        assert_eq!(
            callback_name(id, upload, Some("my reel (1).mp4")),
            format!("{prefix}my_reel__1_.mp4")
        );
        assert_eq!(callback_name(id, upload, None), format!("{prefix}video.mp4"));
        assert!(is_safe_name(&callback_name(id, upload, Some("..."))));
        assert!(is_safe_name(&callback_name(
            id,
            Uuid::new_v4(),
            Some(&"x".repeat(400))
        )));
    }

    #[test]
    fn callback_names_differ_per_upload() {
        let id = Uuid::new_v4();
        assert_ne!(
            callback_name(id, Uuid::new_v4(), Some("clip.mp4")),
            callback_name(id, Uuid::new_v4(), Some("clip.mp4"))
        );
    }

    #[test]
    fn unsafe_names_are_rejected() {
        assert!(is_safe_name("media_1_abc.mp4"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name(".env"));
        assert!(!is_safe_name("a/../b.mp4"));
        assert!(!is_safe_name("..mp4"));
        assert!(!is_safe_name("dir/file.mp4"));
        assert!(!is_safe_name("file name.mp4"));
    }

    #[tokio::test]
    async fn put_list_stream_delete() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path().join("downloads")).unwrap();

        store.put("media_1_a.mp4", Bytes::from_static(b"video-bytes")).await.unwrap();
        assert!(dir.path().join("downloads/media_1_a.mp4").exists());
        assert!(store.exists("media_1_a.mp4").await.unwrap());

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "media_1_a.mp4");
        assert_eq!(listed[0].size, 11);

        let opened = store.open_stream("media_1_a.mp4").await.unwrap();
        assert_eq!(opened.size, 11);
        let chunks: Vec<Bytes> = opened.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"video-bytes");

        store.delete("media_1_a.mp4").await.unwrap();
        assert!(!store.exists("media_1_a.mp4").await.unwrap());
        assert!(matches!(
            store.delete("media_1_a.mp4").await,
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_and_invalid_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.open_stream("absent.mp4").await,
            Err(ArtifactError::NotFound(_))
        ));
        assert!(matches!(
            store.open_stream("../secret").await,
            Err(ArtifactError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn files_written_outside_the_store_are_visible() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        tokio::fs::write(dir.path().join("media_2_b.webm"), b"xyz").await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(store.open_stream("media_2_b.webm").await.is_ok());
    }
}
