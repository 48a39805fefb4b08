//! Core types for background removal operations

use crate::config::OutputFormat;
use crate::error::{BgRemovalError, Result};
use crate::services::ImageIOService;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, GrayImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of a background removal operation
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// The processed image with background removed
    pub image: DynamicImage,

    /// The segmentation mask used for removal
    pub mask: SegmentationMask,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl RemovalResult {
    #[must_use]
    pub fn new(
        image: DynamicImage,
        mask: SegmentationMask,
        original_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            mask,
            original_dimensions,
            metadata,
        }
    }

    /// Encode and write the result, replacing any existing file
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    /// - Encoding failure
    /// - Output directory missing or not writable
    pub fn save<P: AsRef<Path>>(&mut self, path: P, format: OutputFormat, quality: u8) -> Result<()> {
        let encode_start = instant::Instant::now();
        ImageIOService::save_image(&self.image, path, format, quality)?;
        self.metadata.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(())
    }

    /// Get the image as raw RGBA bytes
    #[must_use]
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.image.to_rgba8().into_raw()
    }

    /// Get the image as encoded bytes in the specified format
    ///
    /// # Errors
    /// - Encoding failure, or a format this build cannot encode
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        ImageIOService::encode_image(&self.image, format, quality)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// One-line timing breakdown for logs
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Preprocess: {}ms | Inference: {}ms | Postprocess: {}ms",
            t.total_ms, t.image_decode_ms, t.preprocessing_ms, t.inference_ms, t.postprocessing_ms
        );
        if let Some(encode_ms) = t.image_encode_ms {
            summary.push_str(&format!(" | Encode: {encode_ms}ms"));
        }
        summary
    }
}

/// Per-pixel alpha mask at the original image resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Alpha values (0-255), row-major
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone())
            .ok_or_else(|| BgRemovalError::processing("Failed to create image from mask data"))
    }

    /// Resize the mask to new dimensions
    ///
    /// # Errors
    /// - Mask data is inconsistent with its dimensions
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<SegmentationMask> {
        let resized = image::imageops::resize(
            &self.to_image()?,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );
        Ok(SegmentationMask::from_image(&resized))
    }

    /// Get mask statistics; values above 127 count as foreground
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&alpha| alpha > 127).count();
        let foreground_ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio,
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
}

/// Timing breakdown for a single removal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Backend initialization (first call only)
    pub model_load_ms: u64,

    /// Image decoding
    pub image_decode_ms: u64,

    /// Letterboxing and tensor conversion
    pub preprocessing_ms: u64,

    /// Backend inference
    pub inference_ms: u64,

    /// Mask mapping and alpha application
    pub postprocessing_ms: u64,

    /// Encoding, when the result was written
    pub image_encode_ms: Option<u64>,

    /// End-to-end time excluding encoding
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Time not attributed to any measured phase
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured = self.model_load_ms
            + self.image_decode_ms
            + self.preprocessing_ms
            + self.inference_ms
            + self.postprocessing_ms;
        self.total_ms.saturating_sub(measured)
    }
}

/// Metadata about the processing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub timings: ProcessingTimings,

    /// Model (or backend) that produced the mask
    pub model_name: String,

    pub model_precision: String,

    pub output_format: OutputFormat,

    /// When processing finished
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(model_name: String) -> Self {
        Self {
            timings: ProcessingTimings::default(),
            model_name,
            model_precision: "unknown".to_string(),
            output_format: OutputFormat::default(),
            processed_at: Utc::now(),
        }
    }
}
