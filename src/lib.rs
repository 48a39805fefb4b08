#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Closet background removal
//!
//! Removes the background from wardrobe photos: decode an image, segment the
//! garment, write it back with a transparent background.
//!
//! Segmentation runs on one of three backends:
//!
//! - **ONNX Runtime** (`onnx` feature): ISNet-style models with CPU, CUDA or
//!   `CoreML` execution
//! - **Tract** (`tract` feature): the same models in pure Rust
//! - **Threshold**: an Otsu threshold on luminance, for garments shot against
//!   a plain backdrop. Needs no model.
//!
//! ## File job
//!
//! ```rust,no_run
//! use closet_bgremove::{remove_background, BackendType, RemovalConfig, RemovalJob};
//!
//! let config = RemovalConfig::builder()
//!     .backend_type(BackendType::Threshold { inverted: false })
//!     .build()?;
//! let report = remove_background(&RemovalJob::new("shirt.jpeg", "shirt.png"), &config)?;
//! println!("{}x{}", report.dimensions.0, report.dimensions.1);
//! # Ok::<(), closet_bgremove::BgRemovalError>(())
//! ```
//!
//! `RemovalJob::legacy()` reads
//! `temp_uncprocessed_imgs/clr15oo8j005c356d04xhef8b.jpeg` and writes
//! `temp_processed_imgs/test.png`, which is what `remove-bg` does with no
//! arguments.
//!
//! ## In memory
//!
//! ```rust,no_run
//! use closet_bgremove::{remove_background_from_bytes, ModelDownloader, ModelSource, ModelSpec, RemovalConfig};
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let downloader = ModelDownloader::new()?;
//! let model_id = downloader
//!     .download_model("https://huggingface.co/imgly/isnet-general-onnx", false)
//!     .await?;
//!
//! let config = RemovalConfig::builder()
//!     .model_spec(ModelSpec {
//!         source: ModelSource::Downloaded(model_id),
//!         variant: None,
//!     })
//!     .build()?;
//! let result = remove_background_from_bytes(&upload, &config).await?;
//! let png = result.to_bytes(config.output_format, 100)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `onnx` (default): ONNX Runtime backend
//! - `tract` (default): pure Rust backend
//! - `cli` (default): the `remove-bg` binary, progress bars and log setup
//! - `webp-support` (default): WebP input and output
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod job;
pub mod models;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;

pub use backends::ThresholdBackend;
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use config::{ExecutionProvider, OutputFormat, RemovalConfig, RemovalConfigBuilder};
pub use download::{parse_huggingface_url, validate_model_url, ModelDownloader};
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use job::{
    remove_background, remove_background_with_confirmation, run_job, RemovalJob, RemovalReport,
    CONFIRMATION_MESSAGE, LEGACY_INPUT_PATH, LEGACY_OUTPUT_PATH,
};
pub use models::{ModelManager, ModelSource, ModelSpec};
pub use processor::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory,
};
pub use services::{
    ConsoleProgressReporter, ImageIOService, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{ProcessingMetadata, ProcessingTimings, RemovalResult, SegmentationMask};
pub use utils::{
    ExecutionProviderManager, ImagePreprocessor, LetterboxGeometry, ModelSpecParser,
    PreprocessingOptions, ProviderInfo,
};

#[cfg(feature = "cli")]
pub use tracing_config::TracingConfig;

/// Remove the background of encoded image bytes
///
/// ```rust,no_run
/// use closet_bgremove::{remove_background_from_bytes, BackendType, OutputFormat, RemovalConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::builder()
///     .backend_type(BackendType::Threshold { inverted: true })
///     .build()?;
/// let result = remove_background_from_bytes(&upload, &config).await?;
/// let png = result.to_bytes(OutputFormat::Png, 100)?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes)
}

/// Remove the background of an already decoded image
pub async fn remove_background_from_image(
    image: image::DynamicImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_image(&image)
}

/// Remove the background of an image read from an async stream
///
/// `config.format_hint` skips format sniffing when set.
///
/// ```rust,no_run
/// use closet_bgremove::{remove_background_from_reader, RemovalConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("jacket.jpg").await?;
/// let result = remove_background_from_reader(file, &RemovalConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_reader(reader, config.format_hint).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn threshold_config() -> RemovalConfig {
        RemovalConfig::builder()
            .backend_type(BackendType::Threshold { inverted: false })
            .build()
            .unwrap()
    }

    fn striped_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(24, 12, |x, _| {
            if x < 12 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }))
    }

    #[tokio::test]
    async fn test_in_memory_entry_points_agree() {
        let config = threshold_config();
        let png = ImageIOService::encode_image(&striped_image(), OutputFormat::Png, 100).unwrap();

        let from_image = remove_background_from_image(striped_image(), &config).await.unwrap();
        let from_bytes = remove_background_from_bytes(&png, &config).await.unwrap();
        let from_reader = remove_background_from_reader(std::io::Cursor::new(png), &config)
            .await
            .unwrap();

        assert_eq!(from_image.mask, from_bytes.mask);
        assert_eq!(from_bytes.mask, from_reader.mask);
        assert_eq!(from_image.dimensions(), (24, 12));
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let err = remove_background_from_bytes(b"definitely not a jpeg", &threshold_config())
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Image(_)));
    }
}
