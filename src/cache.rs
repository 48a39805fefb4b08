//! Model cache for downloaded models
//!
//! Downloaded models live under `<cache root>/models/<model id>/`. The root is
//! `$BGREMOVE_CACHE_DIR` when set, otherwise `<user cache dir>/closet-bgremove`.

use crate::error::{BgRemovalError, Result};
use crate::models::DirectoryModelProvider;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "BGREMOVE_CACHE_DIR";

/// Model fetched when nothing else is configured
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/imgly/isnet-general-onnx";

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Model identifier (derived from URL)
    pub model_id: String,
    /// Path to the cached model directory
    pub path: PathBuf,
    /// Available ONNX model variants (fp16, fp32)
    pub variants: Vec<String>,
    /// Size of the model directory in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Open the default cache, creating its directory if needed
    ///
    /// # Errors
    /// - Failed to determine or create the cache directory
    pub fn new() -> Result<Self> {
        let root = match std::env::var_os(CACHE_DIR_ENV) {
            Some(root) => PathBuf::from(root),
            None => dirs::cache_dir()
                .ok_or_else(|| {
                    BgRemovalError::invalid_config(format!(
                        "Failed to determine cache directory. Set {CACHE_DIR_ENV}."
                    ))
                })?
                .join("closet-bgremove"),
        };

        Self::with_custom_cache_dir(&root)
    }

    /// Open a cache rooted at `cache_dir`; models go in `cache_dir/models`
    ///
    /// # Errors
    /// - Failed to create the models directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        let models_dir = cache_dir.join("models");

        if !models_dir.exists() {
            fs::create_dir_all(&models_dir).map_err(|e| {
                BgRemovalError::file_io_error("create cache directory", &models_dir, &e)
            })?;
        }

        Ok(Self {
            cache_dir: models_dir,
        })
    }

    /// Generate a filesystem-safe model ID from a URL
    ///
    /// ```
    /// use closet_bgremove::cache::ModelCache;
    ///
    /// let id = ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx");
    /// assert_eq!(id, "imgly--isnet-general-onnx");
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        if let Some(repo) = url.strip_prefix(HUGGINGFACE_PREFIX) {
            return repo.trim_end_matches('/').replace('/', "--");
        }

        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(url.as_bytes());
        let hash_string = format!("url-{digest:x}");
        hash_string.get(..16).unwrap_or(&hash_string).to_string()
    }

    /// ID of the default model
    #[must_use]
    pub fn default_model_id() -> String {
        Self::url_to_model_id(DEFAULT_MODEL_URL)
    }

    /// Whether a complete model directory exists for `model_id`
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        !model_id.is_empty() && Self::validate_model_directory(&self.get_model_path(model_id))
    }

    /// Path of the directory for `model_id` (may not exist)
    #[must_use]
    pub fn get_model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }

    /// List all valid cached models, sorted by id
    ///
    /// # Errors
    /// - Failed to read the cache directory
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(models);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                BgRemovalError::file_io_error("read cache directory entry", &self.cache_dir, &e)
            })?;
            let path = entry.path();
            if !path.is_dir() || !Self::validate_model_directory(&path) {
                log::debug!("Skipping invalid model directory: {}", path.display());
                continue;
            }

            let Some(model_id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let variants = DirectoryModelProvider::scan_variants(&path).unwrap_or_default();
            let size_bytes = directory_size(&path).unwrap_or(0);

            models.push(CachedModelInfo {
                model_id: model_id.to_string(),
                path: path.clone(),
                variants,
                size_bytes,
            });
        }

        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    /// Remove every cached model, returning the removed ids
    ///
    /// # Errors
    /// - Failed to read the cache or delete a model directory
    pub fn clear_all_models(&self) -> Result<Vec<String>> {
        let mut removed_models = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(removed_models);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let model_id = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown")
                .to_string();

            log::info!("Removing cached model: {}", model_id);
            fs::remove_dir_all(&path).map_err(|e| {
                BgRemovalError::file_io_error("remove cached model directory", &path, &e)
            })?;
            removed_models.push(model_id);
        }

        removed_models.sort();
        Ok(removed_models)
    }

    /// Remove one cached model; `false` when it was not cached
    ///
    /// # Errors
    /// - Failed to delete the model directory
    pub fn clear_specific_model(&self, model_id: &str) -> Result<bool> {
        let model_path = self.get_model_path(model_id);

        if model_id.is_empty() || !model_path.exists() {
            return Ok(false);
        }

        log::info!("Removing cached model: {}", model_id);
        fs::remove_dir_all(&model_path).map_err(|e| {
            BgRemovalError::file_io_error("remove cached model", &model_path, &e)
        })?;

        Ok(true)
    }

    /// Directory holding the cached models
    #[must_use]
    pub fn get_current_cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn validate_model_directory(model_path: &Path) -> bool {
        model_path.join("config.json").is_file()
            && model_path.join("preprocessor_config.json").is_file()
            && model_path.join("onnx").is_dir()
    }
}

fn directory_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            total += directory_size(&path)?;
        } else {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Format a byte count for humans
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS.get(unit_index).unwrap_or(&"B");
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}
