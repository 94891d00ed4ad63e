use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Shared artifact area for downloads and callback uploads
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Largest multipart upload accepted from the remote worker
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            artifact_dir: default_artifact_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7860))
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize::mib(200)
}

/// Extraction engine and attempt strategy settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Extraction engine executable (`yt-dlp` on PATH by default)
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Upper bound for preview lookups, kept short so callers never hang
    #[serde(default = "default_peek_timeout_secs")]
    pub peek_timeout_secs: u64,
    #[serde(default = "default_socket_timeout_secs")]
    pub socket_timeout_secs: u64,
    /// Pause between consecutive attempts (never before the first)
    #[serde(default = "default_attempt_delay_ms")]
    pub attempt_delay_ms: u64,
    #[serde(default = "default_max_filesize")]
    pub max_filesize: ByteSize,
    /// Must select a single pre-merged stream; no merge tool is assumed
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub verify_certificates: bool,
    pub proxy: Option<String>,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_fingerprints")]
    pub fingerprints: Vec<FingerprintConfig>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            download_timeout_secs: default_download_timeout_secs(),
            peek_timeout_secs: default_peek_timeout_secs(),
            socket_timeout_secs: default_socket_timeout_secs(),
            attempt_delay_ms: default_attempt_delay_ms(),
            max_filesize: default_max_filesize(),
            format: default_format(),
            verify_certificates: false,
            proxy: None,
            referer: default_referer(),
            fingerprints: default_fingerprints(),
        }
    }
}

impl ExtractorConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn peek_timeout(&self) -> Duration {
        Duration::from_secs(self.peek_timeout_secs)
    }

    pub fn attempt_delay(&self) -> Duration {
        Duration::from_millis(self.attempt_delay_ms)
    }
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_peek_timeout_secs() -> u64 {
    8
}

fn default_socket_timeout_secs() -> u64 {
    60
}

fn default_attempt_delay_ms() -> u64 {
    1000
}

fn default_max_filesize() -> ByteSize {
    ByteSize::mib(100)
}

fn default_format() -> String {
    "b[ext=mp4]/b".to_string()
}

fn default_referer() -> String {
    "https://www.instagram.com/".to_string()
}

/// One request fingerprint presented to the upstream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FingerprintConfig {
    pub label: String,
    pub user_agent: String,
    /// Send only Accept/Accept-Language/Referer, without Sec-Fetch-* headers
    #[serde(default)]
    pub minimal_headers: bool,
}

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Desktop first, then mobile, then the minimal stealth variant
pub fn default_fingerprints() -> Vec<FingerprintConfig> {
    vec![
        FingerprintConfig {
            label: "desktop".to_string(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            minimal_headers: false,
        },
        FingerprintConfig {
            label: "mobile".to_string(),
            user_agent: MOBILE_USER_AGENT.to_string(),
            minimal_headers: false,
        },
        FingerprintConfig {
            label: "stealth".to_string(),
            user_agent: STEALTH_USER_AGENT.to_string(),
            minimal_headers: true,
        },
    ]
}

/// Remote worker (CI workflow dispatch) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_workflow")]
    pub workflow: String,
    #[serde(default = "default_git_ref")]
    pub git_ref: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Repository identifier, `owner/name`
    pub repository: Option<String>,
    /// Externally reachable base URL used to build callback URLs
    pub public_base_url: Option<String>,
    /// Worker credential (loaded from environment, not from config file)
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            workflow: default_workflow(),
            git_ref: default_git_ref(),
            request_timeout_secs: default_request_timeout_secs(),
            repository: None,
            public_base_url: None,
            token: None,
        }
    }
}

impl RemoteConfig {
    /// True when every value needed to trigger the worker is present
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.repository.is_some() && self.public_base_url.is_some()
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_workflow() -> String {
    "download.yml".to_string()
}

fn default_git_ref() -> String {
    "main".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Artifacts older than this are deleted by the sweeper
    #[serde(default = "default_artifact_ttl_secs")]
    pub artifact_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Pending jobs older than this are failed by the sweeper
    #[serde(default = "default_pending_job_ttl_secs")]
    pub pending_job_ttl_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            artifact_ttl_secs: default_artifact_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            pending_job_ttl_secs: default_pending_job_ttl_secs(),
        }
    }
}

impl RetentionConfig {
    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifact_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn pending_job_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_job_ttl_secs)
    }
}

fn default_artifact_ttl_secs() -> u64 {
    20 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_pending_job_ttl_secs() -> u64 {
    60 * 60
}
