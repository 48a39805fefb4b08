//! Configuration types for background removal operations

use crate::models::ModelSpec;
use crate::processor::BackendType;
use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency, alpha is dropped)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl OutputFormat {
    /// Guess the output format from a file extension, defaulting to PNG
    #[must_use]
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("jpg" | "jpeg") => Self::Jpeg,
            Some("webp") => Self::WebP,
            Some("tif" | "tiff") => Self::Tiff,
            Some("raw" | "rgba") => Self::Rgba8,
            _ => Self::Png,
        }
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Inference backend that performs the segmentation
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Output format
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// WebP quality (0-100, only used for WebP output)
    pub webp_quality: u8,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Model specification including source and variant
    pub model_spec: ModelSpec,

    /// Optional format hint for reader-based processing
    #[serde(skip)]
    pub format_hint: Option<ImageFormat>,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            webp_quality: 85,
            debug: false,
            intra_threads: 0,
            inter_threads: 0,
            model_spec: ModelSpec::default(), // resolved to the first cached model at runtime
            format_hint: None,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use closet_bgremove::{RemovalConfig, BackendType, OutputFormat};
    ///
    /// let config = RemovalConfig::builder()
    ///     .backend_type(BackendType::Threshold { inverted: false })
    ///     .output_format(OutputFormat::Png)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.output_format, OutputFormat::Png);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid JPEG quality value (must be 0-100)
    /// - Invalid WebP quality value (must be 0-100)
    pub fn validate(&self) -> crate::Result<()> {
        if self.jpeg_quality > 100 {
            return Err(crate::error::BgRemovalError::quality_out_of_range(
                "JPEG",
                self.jpeg_quality,
            ));
        }

        if self.webp_quality > 100 {
            return Err(crate::error::BgRemovalError::quality_out_of_range(
                "WebP",
                self.webp_quality,
            ));
        }

        Ok(())
    }

    /// Quality value that applies to the configured output format
    #[must_use]
    pub fn quality_for_output(&self) -> u8 {
        match self.output_format {
            OutputFormat::Jpeg => self.jpeg_quality,
            OutputFormat::WebP => self.webp_quality,
            OutputFormat::Png | OutputFormat::Tiff | OutputFormat::Rgba8 => 100,
        }
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set inference backend
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Set WebP quality
    #[must_use]
    pub fn webp_quality(mut self, quality: u8) -> Self {
        self.config.webp_quality = quality.min(100);
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both intra and inter threads
    ///
    /// Intra-op gets `threads`, inter-op gets `threads / 2` (minimum 1).
    /// Zero leaves both on auto-detect.
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Set the model specification
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    /// Set the format hint for reader-based processing
    #[must_use]
    pub fn format_hint(mut self, format: Option<ImageFormat>) -> Self {
        self.config.format_hint = format;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Invalid JPEG quality value (must be 0-100)
    /// - Invalid WebP quality value (must be 0-100)
    pub fn build(self) -> crate::Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RemovalConfig::default();
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.webp_quality, 85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = RemovalConfig::builder()
            .jpeg_quality(150)
            .webp_quality(200)
            .build()
            .unwrap();
        assert_eq!(config.jpeg_quality, 100);
        assert_eq!(config.webp_quality, 100);
    }

    #[test]
    fn test_manual_invalid_quality_fails_validation() {
        let mut config = RemovalConfig::default();
        config.jpeg_quality = 101;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("JPEG quality"));
        assert!(error.to_string().contains("101"));
        assert!(error.to_string().contains("0-100"));
    }

    #[test]
    fn test_num_threads_split() {
        let config = RemovalConfig::builder().num_threads(8).build().unwrap();
        assert_eq!(config.intra_threads, 8);
        assert_eq!(config.inter_threads, 4);

        let config = RemovalConfig::builder().num_threads(1).build().unwrap();
        assert_eq!(config.inter_threads, 1);

        let config = RemovalConfig::builder().num_threads(0).build().unwrap();
        assert_eq!(config.intra_threads, 0);
        assert_eq!(config.inter_threads, 0);
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path("a/test.png"), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path("a/test.JPG"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path("test.webp"), OutputFormat::WebP);
        assert_eq!(OutputFormat::from_path("test.tif"), OutputFormat::Tiff);
        assert_eq!(OutputFormat::from_path("no_extension"), OutputFormat::Png);
    }

    #[test]
    fn test_quality_for_output() {
        let config = RemovalConfig::builder()
            .output_format(OutputFormat::Jpeg)
            .jpeg_quality(70)
            .build()
            .unwrap();
        assert_eq!(config.quality_for_output(), 70);

        let config = RemovalConfig::builder()
            .output_format(OutputFormat::Png)
            .build()
            .unwrap();
        assert_eq!(config.quality_for_output(), 100);
    }

    #[test]
    fn test_config_serialization() {
        let config = RemovalConfig::builder()
            .backend_type(BackendType::Threshold { inverted: true })
            .execution_provider(ExecutionProvider::Cpu)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RemovalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
