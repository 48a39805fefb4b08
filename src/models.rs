//! Model specification and loading
//!
//! Models are directories in the `HuggingFace` layout:
//!
//! ```text
//! <model>/config.json
//! <model>/preprocessor_config.json
//! <model>/onnx/model.onnx        (fp32)
//! <model>/onnx/model_fp16.onnx   (fp16)
//! ```
//!
//! They are either passed as a path (`ModelSource::External`) or looked up in
//! the model cache by id (`ModelSource::Downloaded`).

use crate::config::ExecutionProvider;
use crate::error::{BgRemovalError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Model source specification
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ModelSource {
    /// External model directory on the filesystem
    External(PathBuf),
    /// Downloaded model from cache by model ID
    Downloaded(String),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Downloaded(model_id) => format!("cached:{model_id}"),
        }
    }
}

/// Complete model specification including source and optional variant
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    pub variant: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        // Empty id means "first cached model"
        Self {
            source: ModelSource::Downloaded(String::new()),
            variant: None,
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW
    pub output_shape: (usize, usize, usize, usize),
}

/// Preprocessing parameters a model expects
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Tensor spatial size as `[height, width]`
    pub target_size: [u32; 2],
    /// Per-channel mean in 0-1 units
    pub normalization_mean: [f32; 3],
    /// Per-channel std in 0-1 units
    pub normalization_std: [f32; 3],
}

impl PreprocessingConfig {
    /// Identity normalization: tensor values are plain `pixel / 255`
    #[must_use]
    pub fn identity(target_size: u32) -> Self {
        Self {
            target_size: [target_size, target_size],
            normalization_mean: [0.0, 0.0, 0.0],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Model provider trait for loading models
pub trait ModelProvider: std::fmt::Debug + Send + Sync {
    /// Load model data as bytes
    ///
    /// # Errors
    /// - Model file not found or inaccessible
    fn load_model_data(&self) -> Result<Vec<u8>>;

    /// Get model information
    ///
    /// # Errors
    /// - Invalid shape or precision information
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Get preprocessing configuration
    ///
    /// # Errors
    /// - Missing or invalid preprocessing values
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get the model file path
    ///
    /// # Errors
    /// - Model path not available for this provider type
    fn get_model_path(&self) -> Result<PathBuf>;
}

/// Provider for a model directory in the `HuggingFace` layout
#[derive(Debug)]
pub struct DirectoryModelProvider {
    name: String,
    model_path: PathBuf,
    preprocessing: PreprocessingConfig,
    variant: String,
}

impl DirectoryModelProvider {
    /// Open a model directory and resolve the variant to load
    ///
    /// # Errors
    /// - Directory missing or not a directory
    /// - Missing or invalid `config.json` / `preprocessor_config.json`
    /// - No ONNX files, or the requested variant is absent
    pub fn open<P: AsRef<Path>>(
        model_path: P,
        variant: Option<String>,
        execution_provider: Option<&ExecutionProvider>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();

        if !model_path.exists() {
            return Err(BgRemovalError::invalid_config(format!(
                "Model path does not exist: {}",
                model_path.display()
            )));
        }
        if !model_path.is_dir() {
            return Err(BgRemovalError::invalid_config(format!(
                "Model path must be a directory: {}",
                model_path.display()
            )));
        }

        let (model_config, preprocessor_config) = Self::load_configurations(&model_path)?;
        let preprocessing = PreprocessingConfig {
            target_size: Self::parse_image_size(&preprocessor_config)?,
            normalization_mean: Self::parse_channel_values(&preprocessor_config, "image_mean")?,
            normalization_std: Self::parse_channel_values(&preprocessor_config, "image_std")?,
        };

        let name = model_config
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                model_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let available = Self::scan_variants(&model_path)?;
        let variant = resolve_variant(&available, variant, execution_provider)?;

        log::debug!(
            "Opened model '{}' at {} (variant {}, available {:?})",
            name,
            model_path.display(),
            variant,
            available
        );

        Ok(Self {
            name,
            model_path,
            preprocessing,
            variant,
        })
    }

    /// Selected variant
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    fn load_configurations(model_path: &Path) -> Result<(serde_json::Value, serde_json::Value)> {
        let read_json = |file_name: &str| -> Result<serde_json::Value> {
            let path = model_path.join(file_name);
            let content = fs::read_to_string(&path)
                .map_err(|e| BgRemovalError::file_io_error("read model configuration", &path, &e))?;
            serde_json::from_str(&content)
                .map_err(|e| BgRemovalError::model(format!("Failed to parse {file_name}: {e}")))
        };

        Ok((read_json("config.json")?, read_json("preprocessor_config.json")?))
    }

    /// List variants present under `onnx/`
    ///
    /// # Errors
    /// - `onnx/` directory missing or holding no `.onnx` files
    pub fn scan_variants(model_path: &Path) -> Result<Vec<String>> {
        let onnx_dir = model_path.join("onnx");
        if !onnx_dir.is_dir() {
            return Err(BgRemovalError::incomplete_model(model_path, "onnx/ directory"));
        }

        let mut variants = Vec::new();
        let entries = fs::read_dir(&onnx_dir)
            .map_err(|e| BgRemovalError::file_io_error("read onnx directory", &onnx_dir, &e))?;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(variant) = variant_from_file_name(file_name) {
                variants.push(variant);
            }
        }

        if variants.is_empty() {
            return Err(BgRemovalError::model(format!(
                "No ONNX model files found in: {}",
                onnx_dir.display()
            )));
        }

        variants.sort();
        Ok(variants)
    }

    fn model_file_path(&self) -> PathBuf {
        variant_file_path(&self.model_path, &self.variant)
    }

    fn parse_image_size(preprocessor: &serde_json::Value) -> Result<[u32; 2]> {
        let size = preprocessor
            .get("size")
            .ok_or_else(|| BgRemovalError::model("Missing size in preprocessor config"))?;

        let dimension = |key: &str| -> Result<u32> {
            size.get(key)
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| {
                    BgRemovalError::model(format!("Missing or invalid {key} in size config"))
                })?
                .try_into()
                .map_err(|_| BgRemovalError::model(format!("{key} value too large for u32")))
        };

        let height = dimension("height")?;
        let width = dimension("width")?;
        if height == 0 || width == 0 {
            return Err(BgRemovalError::model("Model input size must be non-zero"));
        }
        if height != width {
            return Err(BgRemovalError::model(format!(
                "Only square model inputs are supported, got {width}x{height}"
            )));
        }

        Ok([height, width])
    }

    /// Parse a 3-value array from 0-255 units into 0-1 units
    fn parse_channel_values(preprocessor: &serde_json::Value, key: &str) -> Result<[f32; 3]> {
        let values = preprocessor
            .get(key)
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| {
                BgRemovalError::model(format!("Missing or invalid {key} in preprocessor config"))
            })?;

        if values.len() < 3 {
            return Err(BgRemovalError::model(format!(
                "{key} must have at least 3 values"
            )));
        }

        let mut parsed = [0.0_f32; 3];
        for (slot, value) in parsed.iter_mut().zip(values.iter()) {
            let raw = value.as_f64().ok_or_else(|| {
                BgRemovalError::model(format!("{key} contains a non-numeric value"))
            })?;
            *slot = (raw / 255.0) as f32;
        }

        if key == "image_std" && parsed.iter().any(|std| *std <= 0.0) {
            return Err(BgRemovalError::model("image_std values must be positive"));
        }

        Ok(parsed)
    }
}

impl ModelProvider for DirectoryModelProvider {
    fn load_model_data(&self) -> Result<Vec<u8>> {
        let path = self.model_file_path();
        fs::read(&path).map_err(|e| BgRemovalError::file_io_error("read model file", &path, &e))
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let path = self.model_file_path();
        let size_bytes = fs::metadata(&path)
            .map_err(|e| BgRemovalError::file_io_error("inspect model file", &path, &e))?
            .len();
        let [height, width] = self.preprocessing.target_size;
        let (height, width) = (height as usize, width as usize);

        Ok(ModelInfo {
            name: self.name.clone(),
            precision: self.variant.clone(),
            size_bytes: usize::try_from(size_bytes).unwrap_or(usize::MAX),
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    fn get_model_path(&self) -> Result<PathBuf> {
        Ok(self.model_file_path())
    }
}

/// Map an ONNX file name to its variant name
fn variant_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(".onnx")?;
    match stem {
        "model" => Some("fp32".to_string()),
        other => other.strip_prefix("model_").map(str::to_string),
    }
}

/// Path of the ONNX file holding `variant`
#[must_use]
pub fn variant_file_path(model_path: &Path, variant: &str) -> PathBuf {
    let onnx_dir = model_path.join("onnx");
    match variant {
        "fp32" => onnx_dir.join("model.onnx"),
        variant => onnx_dir.join(format!("model_{variant}.onnx")),
    }
}

/// Pick a variant from those available
///
/// An explicit request must exist. Otherwise `CoreML` prefers fp32, CPU and
/// CUDA prefer fp16, and the fallback order is fp16, fp32, first found.
///
/// # Errors
/// - Requested variant not available
/// - No variants available
pub fn resolve_variant(
    available: &[String],
    requested: Option<String>,
    execution_provider: Option<&ExecutionProvider>,
) -> Result<String> {
    let has = |variant: &str| available.iter().any(|v| v == variant);

    if let Some(variant) = requested {
        if has(&variant) {
            return Ok(variant);
        }
        return Err(BgRemovalError::model(format!(
            "Requested variant '{variant}' not available. Available: {available:?}"
        )));
    }

    let preferred = match execution_provider {
        Some(ExecutionProvider::CoreMl) => Some("fp32"),
        Some(ExecutionProvider::Cpu | ExecutionProvider::Cuda) => Some("fp16"),
        Some(ExecutionProvider::Auto) if cfg!(target_os = "macos") => Some("fp32"),
        Some(ExecutionProvider::Auto) => Some("fp16"),
        None => None,
    };
    if let Some(variant) = preferred.filter(|variant| has(variant)) {
        return Ok(variant.to_string());
    }

    for variant in ["fp16", "fp32"] {
        if has(variant) {
            return Ok(variant.to_string());
        }
    }

    available
        .first()
        .cloned()
        .ok_or_else(|| BgRemovalError::model("No model variants available"))
}

/// Unified model manager over the configured model provider
#[derive(Debug)]
pub struct ModelManager {
    provider: Box<dyn ModelProvider>,
}

impl ModelManager {
    /// Create a model manager, letting the execution provider steer variant choice
    ///
    /// # Errors
    /// - External directory missing or malformed
    /// - Downloaded model not in cache, or cache empty when no id was given
    pub fn from_spec_with_provider(
        spec: &ModelSpec,
        execution_provider: Option<&ExecutionProvider>,
    ) -> Result<Self> {
        match &spec.source {
            ModelSource::External(path) => {
                Self::with_model_directory(path, spec.variant.clone(), execution_provider)
            },
            ModelSource::Downloaded(model_id) => {
                let cache = crate::cache::ModelCache::new()?;
                Self::from_cache(&cache, model_id, spec.variant.clone(), execution_provider)
            },
        }
    }

    /// Create a model manager for a model held in `cache`
    ///
    /// An empty `model_id` selects the first cached model.
    ///
    /// # Errors
    /// - Model not cached, or no models cached at all
    pub fn from_cache(
        cache: &crate::cache::ModelCache,
        model_id: &str,
        variant: Option<String>,
        execution_provider: Option<&ExecutionProvider>,
    ) -> Result<Self> {
        let model_id = if model_id.is_empty() {
            cache
                .scan_cached_models()?
                .into_iter()
                .next()
                .map(|model| model.model_id)
                .ok_or_else(|| {
                    BgRemovalError::model(
                        "No cached models found. Download one with `remove-bg --only-download` or pass --model",
                    )
                })?
        } else {
            model_id.to_string()
        };

        if !cache.is_model_cached(&model_id) {
            let available: Vec<String> = cache
                .scan_cached_models()?
                .into_iter()
                .map(|m| m.model_id)
                .collect();
            return Err(BgRemovalError::model(format!(
                "Model '{model_id}' not found in cache. Available models: {available:?}"
            )));
        }

        Self::with_model_directory(
            cache.get_model_path(&model_id),
            variant,
            execution_provider,
        )
    }

    /// Create a model manager for a model directory
    ///
    /// # Errors
    /// - Directory missing or malformed
    pub fn with_model_directory<P: AsRef<Path>>(
        model_path: P,
        variant: Option<String>,
        execution_provider: Option<&ExecutionProvider>,
    ) -> Result<Self> {
        let provider = DirectoryModelProvider::open(model_path, variant, execution_provider)?;
        Ok(Self {
            provider: Box::new(provider),
        })
    }

    /// Load model data
    ///
    /// # Errors
    /// - Model file unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        self.provider.load_model_data()
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata unavailable
    pub fn get_info(&self) -> Result<ModelInfo> {
        self.provider.get_model_info()
    }

    /// Get preprocessing configuration
    ///
    /// # Errors
    /// - Provider cannot describe its preprocessing
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.provider.get_preprocessing_config()
    }

    /// Get the model file path
    ///
    /// # Errors
    /// - Model path not available for this provider type
    pub fn get_model_path(&self) -> Result<PathBuf> {
        self.provider.get_model_path()
    }
}
