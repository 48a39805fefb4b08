//! Image preprocessing for model inference
//!
//! Images are letterboxed: resized keeping aspect ratio, centred on a square
//! canvas filled with the padding colour, then normalized into an NCHW tensor.
//! [`LetterboxGeometry`] is shared with postprocessing so the mask can be
//! mapped back with the exact inverse transform.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Padding color for aspect ratio preservation (RGB)
    pub padding_color: [u8; 3],
    /// Whether to return the letterboxed canvas for debugging
    pub return_preprocessed_image: bool,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255],
            return_preprocessed_image: false,
        }
    }
}

/// Placement of the resized image on the square canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxGeometry {
    pub scale: f32,
    pub new_width: u32,
    pub new_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl LetterboxGeometry {
    /// Compute the letterbox for an image of `width`×`height` on a
    /// `target_size` square canvas
    ///
    /// # Errors
    /// - Zero image dimension or zero target size
    pub fn compute(width: u32, height: u32, target_size: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BgRemovalError::zero_dimension("preprocessing", width, height));
        }
        if target_size == 0 {
            return Err(BgRemovalError::invalid_config("Target size must be non-zero"));
        }

        let target = target_size as f32;
        let scale = target.min((target / width as f32).min(target / height as f32));

        let new_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Ok(Self {
            scale,
            new_width,
            new_height,
            offset_x: (target_size - new_width) / 2,
            offset_y: (target_size - new_height) / 2,
        })
    }

    /// Canvas coordinate for an original pixel coordinate along one axis
    #[must_use]
    pub fn canvas_coordinate(&self, original: u32, offset: u32) -> u32 {
        (original as f32 * self.scale).round() as u32 + offset
    }
}

/// Letterboxing and tensor conversion
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Letterbox an image and convert it to a normalized NCHW tensor
    ///
    /// # Errors
    /// - Zero image dimension
    /// - Target size too large to allocate
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<(Option<DynamicImage>, Array4<f32>)> {
        let target_size = preprocessing_config.target_size[0];
        let rgb_image = image.to_rgb8();
        let (orig_width, orig_height) = rgb_image.dimensions();
        let geometry = LetterboxGeometry::compute(orig_width, orig_height, target_size)?;

        let resized = image::imageops::resize(
            &rgb_image,
            geometry.new_width,
            geometry.new_height,
            image::imageops::FilterType::Triangle,
        );

        let padding = options.padding_color;
        let mut canvas = ImageBuffer::from_pixel(target_size, target_size, image::Rgb(padding));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(geometry.offset_x),
            i64::from(geometry.offset_y),
        );

        let target_size_usize = usize::try_from(target_size).map_err(|_| {
            BgRemovalError::processing("Target size too large for tensor allocation")
        })?;
        let tensor = Self::canvas_to_tensor(&canvas, preprocessing_config, target_size_usize);

        let preprocessed_image = options
            .return_preprocessed_image
            .then(|| DynamicImage::ImageRgb8(canvas));

        Ok((preprocessed_image, tensor))
    }

    fn canvas_to_tensor(
        canvas: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
        target_size: usize,
    ) -> Array4<f32> {
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor = Array4::<f32>::zeros((1, 3, target_size, target_size));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor allocated with the canvas dimensions
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for channel in 0..3 {
                    tensor[[0, channel, y, x]] =
                        (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel];
                }
            }
        }

        tensor
    }

    /// Letterbox with white padding and return the tensor only
    ///
    /// # Errors
    /// - See [`ImagePreprocessor::preprocess_image`]
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let (_, tensor) = Self::preprocess_image(
            image,
            preprocessing_config,
            &PreprocessingOptions::default(),
        )?;
        Ok(tensor)
    }
}
