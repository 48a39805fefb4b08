//! Luminance threshold backend
//!
//! Segments by global Otsu threshold on luminance
//! (`0.299 R + 0.587 G + 0.114 B`). Works for product shots of a light garment
//! on a dark backdrop, or the reverse when inverted. Needs no model file.

use crate::config::RemovalConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, PreprocessingConfig};
use crate::utils::LetterboxGeometry;
use instant::Duration;
use ndarray::{Array4, Axis};

/// Canvas size the threshold backend works at
pub const THRESHOLD_CANVAS_SIZE: u32 = 320;

/// Otsu threshold backend
#[derive(Debug, Clone)]
pub struct ThresholdBackend {
    inverted: bool,
    preprocessing: PreprocessingConfig,
    initialized: bool,
    last_threshold: Option<u8>,
    letterbox: Option<LetterboxGeometry>,
}

impl ThresholdBackend {
    /// Bright pixels become foreground; `inverted` makes dark pixels foreground
    #[must_use]
    pub fn new(inverted: bool) -> Self {
        Self::with_canvas_size(inverted, THRESHOLD_CANVAS_SIZE)
    }

    #[must_use]
    pub fn with_canvas_size(inverted: bool, size: u32) -> Self {
        Self {
            inverted,
            preprocessing: PreprocessingConfig::identity(size),
            initialized: false,
            last_threshold: None,
            letterbox: None,
        }
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Threshold chosen by the most recent inference
    #[must_use]
    pub fn last_threshold(&self) -> Option<u8> {
        self.last_threshold
    }

    fn size(&self) -> usize {
        self.preprocessing.target_size[0] as usize
    }

    /// Rows and columns of a `height`x`width` canvas covered by the image
    fn placed_region(
        letterbox: Option<LetterboxGeometry>,
        height: usize,
        width: usize,
    ) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let Some(geometry) = letterbox else {
            return (0..height, 0..width);
        };
        let span = |offset: u32, len: u32, limit: usize| {
            let start = (offset as usize).min(limit);
            start..(start + len as usize).min(limit)
        };
        let rows = span(geometry.offset_y, geometry.new_height, height);
        let cols = span(geometry.offset_x, geometry.new_width, width);
        if rows.is_empty() || cols.is_empty() {
            (0..height, 0..width)
        } else {
            (rows, cols)
        }
    }
}

/// Luminance of an RGB sample in 0-255 units
#[must_use]
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Grey level maximising between-class variance
///
/// Returns 0 for a histogram with a single occupied level.
#[must_use]
pub fn otsu_threshold(histogram: &[u64; 256]) -> u8 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }
    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut background_weight = 0_u64;
    let mut background_sum = 0.0_f64;
    let mut best_variance = 0.0_f64;
    let mut threshold = 0_u8;

    for (level, &count) in histogram.iter().enumerate() {
        background_weight += count;
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }

        background_sum += level as f64 * count as f64;
        let background_mean = background_sum / background_weight as f64;
        let foreground_mean = (weighted_sum - background_sum) / foreground_weight as f64;
        let variance = background_weight as f64
            * foreground_weight as f64
            * (background_mean - foreground_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            threshold = level as u8;
        }
    }

    threshold
}

impl InferenceBackend for ThresholdBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        self.initialized = true;
        Ok(None)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }
        let shape = input.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            return Err(BgRemovalError::inference(format!(
                "Threshold backend expects a (1, 3, H, W) tensor, got {shape:?}"
            )));
        }
        let (height, width) = (shape[2], shape[3]);
        let (rows, cols) = Self::placed_region(self.letterbox.take(), height, width);

        let mean = self.preprocessing.normalization_mean;
        let std = self.preprocessing.normalization_std;
        let image = input.index_axis(Axis(0), 0);
        let mut levels = Vec::with_capacity(height * width);
        let mut histogram = [0_u64; 256];

        for y in 0..height {
            for x in 0..width {
                let mut rgb = [0.0_f32; 3];
                for (channel, value) in rgb.iter_mut().enumerate() {
                    let normalized = image[[channel, y, x]];
                    *value = ((normalized * std[channel] + mean[channel]) * 255.0).clamp(0.0, 255.0);
                }
                let level = luminance(rgb[0], rgb[1], rgb[2]).round() as u8;
                if rows.contains(&y) && cols.contains(&x) {
                    histogram[usize::from(level)] += 1;
                }
                levels.push(level);
            }
        }

        let threshold = otsu_threshold(&histogram);
        self.last_threshold = Some(threshold);
        log::debug!(
            "Otsu threshold {} ({} mode)",
            threshold,
            if self.inverted { "inverted" } else { "normal" }
        );

        let mask = levels
            .into_iter()
            .map(|level| {
                if (level > threshold) != self.inverted {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();

        Array4::from_shape_vec((1, 1, height, width), mask)
            .map_err(|e| BgRemovalError::inference(format!("Failed to build mask tensor: {e}")))
    }

    fn set_letterbox(&mut self, geometry: &LetterboxGeometry) {
        self.letterbox = Some(*geometry);
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.size(), self.size())
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, self.size(), self.size())
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: if self.inverted {
                "threshold-inverted".to_string()
            } else {
                "threshold".to_string()
            },
            precision: "u8".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
