//! `yt-dlp` command-line backend

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExtractedMedia, ExtractionError, MediaExtractor, MediaPreview, locate_output};
use crate::config::ExtractorConfig;
use crate::strategy::AttemptConfig;

const MISSING_OUTPUT_MESSAGE: &str = "output file missing after download";

/// Subset of the engine's `--dump-json` output we rely on
#[derive(Debug, Deserialize)]
struct InfoJson {
    id: String,
    title: Option<String>,
    thumbnail: Option<String>,
    ext: Option<String>,
    #[serde(rename = "_filename")]
    filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Download,
    Peek,
}

pub struct YtDlpExtractor {
    binary: String,
    output_dir: PathBuf,
    download_timeout: Duration,
    peek_timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(
        binary: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        download_timeout: Duration,
        peek_timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
            download_timeout,
            peek_timeout,
        }
    }

    pub fn from_config(config: &ExtractorConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            config.binary.clone(),
            output_dir,
            config.download_timeout(),
            config.peek_timeout(),
        )
    }

    fn output_template(&self, output_stem: &str) -> String {
        self.output_dir
            .join(format!("{output_stem}_%(id)s.%(ext)s"))
            .to_string_lossy()
            .into_owned()
    }

    fn build_args(
        &self,
        url: &str,
        config: &AttemptConfig,
        mode: Mode,
        output_stem: &str,
    ) -> Vec<String> {
        let socket_timeout = match mode {
            Mode::Download => config.socket_timeout,
            Mode::Peek => config.socket_timeout.min(self.peek_timeout),
        };

        let mut args: Vec<String> = vec![
            "--format".into(),
            config.format.clone(),
            "--user-agent".into(),
            config.user_agent.clone(),
            "--socket-timeout".into(),
            socket_timeout.as_secs().max(1).to_string(),
            "--max-filesize".into(),
            config.max_filesize.to_extractor_arg(),
            "--no-playlist".into(),
            "--restrict-filenames".into(),
            "--no-warnings".into(),
            "--quiet".into(),
            "--dump-json".into(),
            "--extractor-args".into(),
            "instagram:allow_anon_user_id=1".into(),
        ];

        for (name, value) in &config.headers {
            args.push("--add-header".into());
            args.push(format!("{name}:{value}"));
        }

        if !config.verify_certificates {
            args.push("--no-check-certificate".into());
        }

        if let Some(proxy) = &config.proxy {
            args.push("--proxy".into());
            args.push(proxy.clone());
        }

        match mode {
            Mode::Download => {
                args.push("--no-simulate".into());
                args.push("--output".into());
                args.push(self.output_template(output_stem));
            }
            Mode::Peek => args.push("--skip-download".into()),
        }

        args.push("--".into());
        args.push(url.to_string());
        args
    }

    /// Runs the engine and returns its parsed info JSON
    async fn invoke(&self, args: Vec<String>, limit: Duration) -> Result<InfoJson, ExtractionError> {
        debug!(binary = %self.binary, ?args, "Invoking extractor");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionError::new(format!("failed to start {}: {e}", self.binary)))?;

        let output = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| {
                ExtractionError::new(format!("{} timed out after {}s", self.binary, limit.as_secs()))
            })?
            .map_err(|e| ExtractionError::new(format!("failed to wait for {}: {e}", self.binary)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = [stderr.trim(), stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} exited with {}", self.binary, output.status));
            return Err(ExtractionError::new(message));
        }

        parse_info(&stdout)
    }
}

/// The engine prints one JSON object per line; the last one describes the
/// final media item.
fn parse_info(stdout: &str) -> Result<InfoJson, ExtractionError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| ExtractionError::new("failed to parse extractor output: no JSON line"))?;

    serde_json::from_str(line)
        .map_err(|e| ExtractionError::new(format!("failed to parse extractor output: {e}")))
}

fn predicted_path(dir: &Path, output_stem: &str, info: &InfoJson) -> PathBuf {
    match &info.filename {
        Some(name) => PathBuf::from(name),
        None => {
            let ext = info.ext.as_deref().unwrap_or("mp4");
            dir.join(format!("{output_stem}_{}.{ext}", info.id))
        }
    }
}

/// The path stays in the log; the error text reaches users
fn missing_output(predicted: &Path) -> ExtractionError {
    warn!(path = %predicted.display(), "Extractor reported success but no output file");
    ExtractionError::new(MISSING_OUTPUT_MESSAGE)
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        url: &str,
        config: &AttemptConfig,
        output_stem: &str,
    ) -> Result<ExtractedMedia, ExtractionError> {
        let args = self.build_args(url, config, Mode::Download, output_stem);
        let info = self.invoke(args, self.download_timeout).await?;

        let predicted = predicted_path(&self.output_dir, output_stem, &info);
        let path = locate_output(&predicted)
            .await
            .ok_or_else(|| missing_output(&predicted))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ExtractionError::new("output path has no file name"))?;

        Ok(ExtractedMedia {
            file_name,
            title: info.title,
            thumbnail_url: info.thumbnail,
        })
    }

    async fn peek(&self, url: &str, config: &AttemptConfig) -> Result<MediaPreview, ExtractionError> {
        let args = self.build_args(url, config, Mode::Peek, "");
        let info = self.invoke(args, self.peek_timeout).await?;

        Ok(MediaPreview {
            title: info.title,
            thumbnail_url: info.thumbnail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::extraction::ErrorKind;
    use crate::strategy::Strategy;

    fn desktop() -> AttemptConfig {
        Strategy::from_config(&ExtractorConfig::default())
            .unwrap()
            .attempts()[0]
            .clone()
    }

    fn extractor() -> YtDlpExtractor {
        YtDlpExtractor::new(
            "yt-dlp",
            "/srv/downloads",
            Duration::from_secs(300),
            Duration::from_secs(8),
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn download_args_carry_fingerprint() {
        let args = extractor().build_args(
            "https://site/reel/ABC123",
            &desktop(),
            Mode::Download,
            "media_1700000000_f00d",
        );

        assert_eq!(value_after(&args, "--format"), Some("b[ext=mp4]/b"));
        assert_eq!(value_after(&args, "--max-filesize"), Some("100M"));
        assert_eq!(value_after(&args, "--socket-timeout"), Some("60"));
        assert_eq!(
            value_after(&args, "--output"),
            Some("/srv/downloads/media_1700000000_f00d_%(id)s.%(ext)s")
        );
        assert!(args.contains(&"--no-simulate".to_string()));
        assert!(args.contains(&"--no-check-certificate".to_string()));
        assert!(args.contains(&"Referer:https://www.instagram.com/".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://site/reel/ABC123"));
        assert!(!args.contains(&"--proxy".to_string()));
    }

    #[test]
    fn peek_args_skip_download_with_short_socket_timeout() {
        let mut config = desktop();
        config.proxy = Some("http://proxy:3128".to_string());

        let args = extractor().build_args("https://site/p/1", &config, Mode::Peek, "");

        assert!(args.contains(&"--skip-download".to_string()));
        assert!(!args.contains(&"--output".to_string()));
        assert_eq!(value_after(&args, "--socket-timeout"), Some("8"));
        assert_eq!(value_after(&args, "--proxy"), Some("http://proxy:3128"));
    }

    #[test]
    fn parse_info_uses_last_json_line() {
        let stdout = "noise\n{\"id\":\"first\"}\n{\"id\":\"ABC123\",\"title\":\"Clip\",\"thumbnail\":\"https://cdn/t.jpg\",\"ext\":\"mp4\"}\n";
        let info = parse_info(stdout).unwrap();
        assert_eq!(info.id, "ABC123");
        assert_eq!(info.title.as_deref(), Some("Clip"));

        let err = parse_info("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedUpstreamResponse);
    }

    #[test]
    fn predicted_path_falls_back_to_template() {
        let info = InfoJson {
            id: "ABC123".to_string(),
            title: None,
            thumbnail: None,
            ext: Some("webm".to_string()),
            filename: None,
        };
        assert_eq!(
            predicted_path(Path::new("/srv/downloads"), "media_1_x", &info),
            PathBuf::from("/srv/downloads/media_1_x_ABC123.webm")
        );
    }

    #[test]
    fn missing_output_error_hides_server_paths() {
        let err = missing_output(Path::new("/srv/downloads/media_1_abc_XYZ.mp4"));

        assert_eq!(err.raw(), MISSING_OUTPUT_MESSAGE);
        assert_eq!(err.kind(), ErrorKind::Unclassified);
        assert!(!crate::extraction::user_message(err.kind(), err.raw()).contains("/srv"));
    }

    #[tokio::test]
    async fn missing_binary_is_reported_not_panicked() {
        let extractor = YtDlpExtractor::new(
            "/nonexistent/yt-dlp-binary",
            "/tmp",
            Duration::from_secs(5),
            Duration::from_secs(1),
        );

        let err = extractor.peek("https://site/p/1", &desktop()).await.unwrap_err();
        assert!(err.raw().starts_with("failed to start"));
        assert_eq!(err.kind(), ErrorKind::Unclassified);
    }
}
