//! Model downloading from `HuggingFace` repositories
//!
//! Files are fetched into a temporary directory and moved into the cache only
//! once every required file is present, so an interrupted download never
//! leaves a half-populated model behind.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Configuration files every model needs
const REQUIRED_FILES: &[&str] = &["config.json", "preprocessor_config.json"];

/// ONNX files to try; at least one must download
const ONNX_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "fp32"),
    ("onnx/model_fp16.onnx", "fp16"),
];

/// Progress display that degrades to nothing without the CLI feature
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn new(show_progress: bool) -> Self {
        #[cfg(feature = "cli")]
        {
            if show_progress {
                let pb = ProgressBar::new(0);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                ) {
                    pb.set_style(style.progress_chars("#>-"));
                }
                return Self::Indicatif(pb);
            }
        }
        let _ = show_progress;
        Self::NoOp
    }

    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

/// Downloads models into a [`ModelCache`]
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a downloader for the default cache
    ///
    /// # Errors
    /// - Failed to create HTTP client or open the cache
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a downloader targeting `cache`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Download a model repository into the cache and return its id
    ///
    /// Already cached models are not fetched again.
    ///
    /// # Errors
    /// - Invalid or unsupported URL
    /// - Network errors, or no ONNX variant could be fetched
    /// - File system errors while moving into the cache
    pub async fn download_model(&self, url: &str, show_progress: bool) -> Result<String> {
        validate_model_url(url)?;
        let model_id = ModelCache::url_to_model_id(url);
        log::info!("Downloading model from: {}", url);
        log::debug!("Model ID: {}", model_id);

        if self.cache.is_model_cached(&model_id) {
            log::info!("Model already cached: {}", model_id);
            return Ok(model_id);
        }

        let temp_dir = Self::create_temp_download_dir(&model_id)?;
        let final_dir = self.cache.get_model_path(&model_id);
        let progress = ProgressIndicator::new(show_progress);

        match self.download_model_files(url, &temp_dir, &progress).await {
            Ok(()) => {
                if final_dir.exists() {
                    fs::remove_dir_all(&final_dir).map_err(|e| {
                        BgRemovalError::file_io_error(
                            "remove existing model directory",
                            &final_dir,
                            &e,
                        )
                    })?;
                }
                move_dir(&temp_dir, &final_dir)?;

                progress.finish_with_message(format!("Downloaded {model_id}"));
                log::info!("Successfully downloaded model: {}", model_id);
                Ok(model_id)
            },
            Err(e) => {
                if temp_dir.exists() {
                    if let Err(cleanup_err) = fs::remove_dir_all(&temp_dir) {
                        log::warn!("Failed to cleanup temp directory: {}", cleanup_err);
                    }
                }
                progress.finish_with_message("Download failed".to_string());
                Err(e)
            },
        }
    }

    fn create_temp_download_dir(model_id: &str) -> Result<PathBuf> {
        let temp_dir = std::env::temp_dir().join(format!("closet-bgremove-{model_id}"));

        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).map_err(|e| {
                BgRemovalError::file_io_error("remove existing temp directory", &temp_dir, &e)
            })?;
        }

        fs::create_dir_all(temp_dir.join("onnx"))
            .map_err(|e| BgRemovalError::file_io_error("create temp directory", &temp_dir, &e))?;

        Ok(temp_dir)
    }

    async fn download_model_files(
        &self,
        base_url: &str,
        download_dir: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        let raw_base = format!("{}/resolve/main/", base_url.trim_end_matches('/'));

        for file_name in REQUIRED_FILES {
            progress.set_message(format!("Downloading {file_name}"));
            self.download_file(
                &format!("{raw_base}{file_name}"),
                &download_dir.join(file_name),
                progress,
            )
            .await?;
        }

        let mut downloaded_models = 0;
        for (file_path, variant) in ONNX_FILES {
            progress.set_message(format!("Downloading {variant} model"));
            match self
                .download_file(
                    &format!("{raw_base}{file_path}"),
                    &download_dir.join(file_path),
                    progress,
                )
                .await
            {
                Ok(()) => {
                    downloaded_models += 1;
                    log::info!("Downloaded {} model variant", variant);
                },
                Err(e) => log::warn!("Failed to download {} variant: {}", variant, e),
            }
        }

        if downloaded_models == 0 {
            return Err(BgRemovalError::network_error(
                "Failed to download any ONNX model variants",
                std::io::Error::new(std::io::ErrorKind::NotFound, "No model files found"),
            ));
        }

        Ok(())
    }

    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        let response =
            self.client.get(url).send().await.map_err(|e| {
                BgRemovalError::network_error(format!("Failed to download {url}"), e)
            })?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("HTTP error {} for {}", response.status(), url),
                std::io::Error::new(std::io::ErrorKind::Other, "HTTP error"),
            ));
        }

        let total_size = response.content_length();
        if let Some(total) = total_size {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192];
        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;
            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| BgRemovalError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            if total_size.is_some() {
                progress.set_position(downloaded);
            } else {
                progress.set_message(format!("Downloaded {:.1} MB", downloaded as f64 / 1_048_576.0));
            }
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", local_path, &e))?;

        log::debug!("Downloaded {} bytes to {}", downloaded, local_path.display());
        Ok(())
    }

    /// Cache this downloader writes into
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Check a file against a SHA-256 hex digest; `None` skips the check
///
/// # Errors
/// - File unreadable
pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
    let Some(expected) = expected_hash else {
        return Ok(true);
    };

    let contents = fs::read(file_path)
        .map_err(|e| BgRemovalError::file_io_error("read file for verification", file_path, &e))?;
    let actual_hash = format!("{:x}", Sha256::digest(&contents));

    if actual_hash.eq_ignore_ascii_case(expected) {
        Ok(true)
    } else {
        log::warn!(
            "File integrity check failed for {}: expected {}, got {}",
            file_path.display(),
            expected,
            actual_hash
        );
        Ok(false)
    }
}

/// Move a directory, falling back to copy + delete across filesystems
fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    copy_dir(from, to)?;
    fs::remove_dir_all(from)
        .map_err(|e| BgRemovalError::file_io_error("remove temp directory", from, &e))
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)
        .map_err(|e| BgRemovalError::file_io_error("create model directory", to, &e))?;
    let entries =
        fs::read_dir(from).map_err(|e| BgRemovalError::file_io_error("read directory", from, &e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BgRemovalError::file_io_error("read directory", from, &e))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        if source.is_dir() {
            copy_dir(&source, &target)?;
        } else {
            fs::copy(&source, &target)
                .map_err(|e| BgRemovalError::file_io_error("copy model file", &source, &e))?;
        }
    }
    Ok(())
}

/// Validate that a URL names a `HuggingFace` repository
///
/// # Errors
/// - Empty URL, other host, or missing `user/repo` path
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(BgRemovalError::invalid_config("Model URL cannot be empty"));
    }

    let Some(repo_path) = url.strip_prefix(HUGGINGFACE_PREFIX) else {
        return Err(BgRemovalError::invalid_config(format!(
            "Unsupported URL format: {url}. Only HuggingFace repositories are supported (https://huggingface.co/...)"
        )));
    };

    let mut parts = repo_path.trim_end_matches('/').split('/');
    let user = parts.next().unwrap_or_default();
    let repo = parts.next().unwrap_or_default();
    if user.is_empty() || repo.is_empty() {
        return Err(BgRemovalError::invalid_config(format!(
            "Invalid HuggingFace repository URL: {url}. Expected format: https://huggingface.co/username/repo-name"
        )));
    }

    Ok(())
}

/// Split a `HuggingFace` URL into `(username, repository)`
///
/// # Errors
/// - URL fails [`validate_model_url`]
pub fn parse_huggingface_url(url: &str) -> Result<(String, String)> {
    validate_model_url(url)?;

    let repo_path = url.strip_prefix(HUGGINGFACE_PREFIX).unwrap_or_default();
    let mut parts = repo_path.split('/');
    match (parts.next(), parts.next()) {
        (Some(user), Some(repo)) => Ok((user.to_string(), repo.to_string())),
        _ => Err(BgRemovalError::invalid_config(format!(
            "Invalid HuggingFace URL format: {url}"
        ))),
    }
}
