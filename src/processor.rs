//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns one inference backend and runs the whole
//! pipeline for an image: letterbox, infer, map the mask back to the original
//! resolution, apply it as alpha and convert to the output format. The same
//! processor serves the file job, the CLI and the in-memory entry points.

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::ModelManager,
    services::{ImageIOService, OutputFormatHandler, ProcessingStage, ProgressTracker},
    types::{ProcessingMetadata, ProcessingTimings, RemovalResult, SegmentationMask},
    utils::{ImagePreprocessor, LetterboxGeometry},
};
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba, RgbaImage};
use instant::Instant;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument, span, Level};

/// Backend type enumeration for runtime selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
    /// Otsu luminance threshold, no model needed
    Threshold { inverted: bool },
}

impl BackendType {
    /// Whether this backend needs a segmentation model
    #[must_use]
    pub fn requires_model(self) -> bool {
        !matches!(self, Self::Threshold { .. })
    }
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else if cfg!(feature = "tract") {
            Self::Tract
        } else {
            Self::Threshold { inverted: false }
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
            Self::Threshold { inverted: false } => write!(f, "threshold"),
            Self::Threshold { inverted: true } => write!(f, "threshold:inverted"),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend of the given type
    ///
    /// `model_manager` is `None` for backends that need no model.
    ///
    /// # Errors
    /// - Backend not compiled into this build
    /// - Model backend requested without a model
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: Option<ModelManager>,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Builds whichever backends the enabled features provide
#[derive(Debug, Default)]
pub struct DefaultBackendFactory;

#[cfg(any(feature = "onnx", feature = "tract"))]
fn require_model(
    backend_type: BackendType,
    model_manager: Option<ModelManager>,
) -> Result<ModelManager> {
    model_manager.ok_or_else(|| {
        BgRemovalError::model(format!("The {backend_type} backend needs a model"))
    })
}

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: Option<ModelManager>,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Threshold { inverted } => {
                Ok(Box::new(crate::backends::ThresholdBackend::new(inverted)))
            },
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                require_model(backend_type, model_manager)?,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                require_model(backend_type, model_manager)?,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(model_manager);
                Err(BgRemovalError::invalid_config(format!(
                    "The {other} backend is not compiled into this build; enable the `{other}` feature"
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        if cfg!(feature = "onnx") {
            backends.push(BackendType::Onnx);
        }
        if cfg!(feature = "tract") {
            backends.push(BackendType::Tract);
        }
        backends.push(BackendType::Threshold { inverted: false });
        backends.push(BackendType::Threshold { inverted: true });
        backends
    }
}

/// Runs background removal with one lazily initialized backend
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
    initialized: bool,
    pending_model_load_ms: Option<u64>,
    progress_tracker: Option<ProgressTracker>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor using [`DefaultBackendFactory`]
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(
        config: RemovalConfig,
        backend_factory: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend_factory,
            backend: None,
            initialized: false,
            pending_model_load_ms: None,
            progress_tracker: None,
        })
    }

    /// Create a processor around an already constructed backend
    ///
    /// The backend is still initialized lazily with this processor's config.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_backend(config: RemovalConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        let mut processor = Self::new(config)?;
        processor.backend = Some(backend);
        Ok(processor)
    }

    /// Attach a progress tracker
    #[must_use]
    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.progress_tracker = Some(tracker);
        self
    }

    fn report_stage(&mut self, stage: ProcessingStage) {
        if let Some(ref mut tracker) = self.progress_tracker {
            tracker.report_stage(stage);
        }
    }

    /// Initialize the backend, loading its model if it needs one
    ///
    /// Called automatically by the first `process_*` call.
    ///
    /// # Errors
    /// - Model not found or not loadable
    /// - Backend not compiled into this build
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let _span = span!(Level::INFO, "initialize", backend = %self.config.backend_type).entered();
        self.report_stage(ProcessingStage::Initialization);

        if self.backend.is_none() {
            let backend_type = self.config.backend_type;
            let model_manager = if backend_type.requires_model() {
                debug!(model = %self.config.model_spec.source.display_name(), "Resolving model");
                Some(ModelManager::from_spec_with_provider(
                    &self.config.model_spec,
                    Some(&self.config.execution_provider),
                )?)
            } else {
                None
            };
            self.backend = Some(self.backend_factory.create_backend(backend_type, model_manager)?);
        }

        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend missing after creation"))?;
        let model_load_time = backend.initialize(&self.config)?;
        self.pending_model_load_ms = model_load_time.map(|d| d.as_millis() as u64);
        self.initialized = true;

        info!(backend = %self.config.backend_type, "Background removal processor initialized");
        Ok(())
    }

    /// Decode an image file and remove its background
    ///
    /// # Errors
    /// - Input missing (`Io` with `NotFound`) or not decodable
    /// - Backend initialization or inference failure
    pub fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<RemovalResult> {
        self.restart_progress();
        self.report_stage(ProcessingStage::ImageLoading);

        let decode_start = Instant::now();
        let image = self.track_error(ImageIOService::load_image(input_path.as_ref()))?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;
        debug!(path = %input_path.as_ref().display(), decode_ms, "Decoded input image");

        self.process_decoded(&image, decode_ms)
    }

    /// Remove the background of an already decoded image
    ///
    /// # Errors
    /// - Image has a zero dimension
    /// - Backend initialization or inference failure
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RemovalResult> {
        self.restart_progress();
        self.process_decoded(image, 0)
    }

    /// Decode encoded image bytes and remove the background
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    /// - Backend initialization or inference failure
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<RemovalResult> {
        self.restart_progress();
        self.report_stage(ProcessingStage::ImageLoading);

        let decode_start = Instant::now();
        let image = self.track_error(ImageIOService::load_from_bytes(image_bytes))?;
        self.process_decoded(&image, decode_start.elapsed().as_millis() as u64)
    }

    /// Read an image from an async stream and remove the background
    ///
    /// `format_hint` falls back to the configured hint, then to content sniffing.
    ///
    /// # Errors
    /// - Reader failure
    /// - Data is not a decodable image
    /// - Backend initialization or inference failure
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &mut self,
        reader: R,
        format_hint: Option<image::ImageFormat>,
    ) -> Result<RemovalResult> {
        self.restart_progress();
        self.report_stage(ProcessingStage::ImageLoading);

        let decode_start = Instant::now();
        let hint = format_hint.or(self.config.format_hint);
        let image = ImageIOService::load_from_reader(reader, hint).await;
        let image = self.track_error(image)?;
        self.process_decoded(&image, decode_start.elapsed().as_millis() as u64)
    }

    /// Compute the segmentation mask only, at the image's resolution
    ///
    /// # Errors
    /// - Image has a zero dimension
    /// - Backend initialization or inference failure
    pub fn segment_image(&mut self, image: &DynamicImage) -> Result<SegmentationMask> {
        let (mask, _) = self.segment(image, &mut ProcessingTimings::default())?;
        Ok(mask)
    }

    /// Apply a previously computed mask to an image
    ///
    /// The mask is resized when its dimensions differ from the image's.
    ///
    /// # Errors
    /// - Mask data inconsistent with its dimensions
    pub fn apply_mask(&self, image: &DynamicImage, mask: &SegmentationMask) -> Result<RemovalResult> {
        let original_dimensions = image.dimensions();
        let resized_mask = if mask.dimensions == original_dimensions {
            mask.clone()
        } else {
            mask.resize(original_dimensions.0, original_dimensions.1)?
        };

        let result_image = Self::apply_background_removal(image, &resized_mask);
        let final_image = OutputFormatHandler::convert_format(result_image, self.config.output_format);

        let mut metadata = ProcessingMetadata::new("precomputed-mask".to_string());
        metadata.output_format = self.config.output_format;
        Ok(RemovalResult::new(
            final_image,
            resized_mask,
            original_dimensions,
            metadata,
        ))
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.backend_factory.available_backends()
    }

    fn restart_progress(&mut self) {
        if let Some(ref mut tracker) = self.progress_tracker {
            tracker.restart();
        }
    }

    fn track_error<T>(&self, result: Result<T>) -> Result<T> {
        if let (Err(e), Some(tracker)) = (&result, &self.progress_tracker) {
            tracker.report_error(&e.to_string());
        }
        result
    }

    fn process_decoded(&mut self, image: &DynamicImage, decode_ms: u64) -> Result<RemovalResult> {
        let result = self.run_pipeline(image, decode_ms);
        self.track_error(result)
    }

    #[instrument(
        skip(self, image),
        fields(
            backend = %self.config.backend_type,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    fn run_pipeline(&mut self, image: &DynamicImage, decode_ms: u64) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            image_decode_ms: decode_ms,
            ..ProcessingTimings::default()
        };
        let original_dimensions = image.dimensions();

        let (mask, backend_name) = self.segment(image, &mut timings)?;

        let result_image = {
            let _span = span!(Level::DEBUG, "background_removal").entered();
            self.report_stage(ProcessingStage::BackgroundRemoval);
            let start = Instant::now();
            let result = Self::apply_background_removal(image, &mask);
            timings.postprocessing_ms += start.elapsed().as_millis() as u64;
            result
        };

        self.report_stage(ProcessingStage::FormatConversion);
        let final_image = OutputFormatHandler::convert_format(result_image, self.config.output_format);

        timings.total_ms = total_start.elapsed().as_millis() as u64 + decode_ms;

        let (model_name, model_precision) = backend_name;
        let mut metadata = ProcessingMetadata::new(model_name);
        metadata.model_precision = model_precision;
        metadata.output_format = self.config.output_format;
        metadata.timings = timings.clone();

        self.report_stage(ProcessingStage::Completed);
        if let Some(ref tracker) = self.progress_tracker {
            tracker.report_completion(timings);
        }

        Ok(RemovalResult::new(
            final_image,
            mask,
            original_dimensions,
            metadata,
        ))
    }

    /// Letterbox, infer and map the output back to a full-resolution mask
    fn segment(
        &mut self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
    ) -> Result<(SegmentationMask, (String, String))> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(BgRemovalError::zero_dimension("validation", width, height));
        }

        self.initialize()?;
        if let Some(model_load_ms) = self.pending_model_load_ms.take() {
            timings.model_load_ms = model_load_ms;
        }

        self.report_stage(ProcessingStage::Preprocessing);
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| BgRemovalError::processing("Backend not initialized"))?;
        let preprocessing_config = backend.get_preprocessing_config()?;
        let backend_name = backend.get_model_info().map_or_else(
            |_| (self.config.backend_type.to_string(), "unknown".to_string()),
            |info| (info.name, info.precision),
        );

        let (geometry, input_tensor) = {
            let _span = span!(Level::DEBUG, "preprocessing", width, height).entered();
            let start = Instant::now();
            let geometry =
                LetterboxGeometry::compute(width, height, preprocessing_config.target_size[0])?;
            let tensor = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            (geometry, tensor)
        };

        self.report_stage(ProcessingStage::Inference);
        let output_tensor = {
            let _span = span!(Level::INFO, "inference", backend = %self.config.backend_type).entered();
            let start = Instant::now();
            let backend = self
                .backend
                .as_mut()
                .ok_or_else(|| BgRemovalError::processing("Backend not initialized"))?;
            backend.set_letterbox(&geometry);
            let output = backend.infer(&input_tensor)?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            output
        };

        self.report_stage(ProcessingStage::MaskGeneration);
        let start = Instant::now();
        let mask = Self::tensor_to_mask(&output_tensor, (width, height), &geometry)?;
        timings.postprocessing_ms = start.elapsed().as_millis() as u64;

        let stats = mask.statistics();
        debug!(
            foreground_ratio = stats.foreground_ratio,
            "Mask generated"
        );

        Ok((mask, backend_name))
    }

    /// Map a `(1, 1, S, S)` output tensor back to original image coordinates
    fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
        geometry: &LetterboxGeometry,
    ) -> Result<SegmentationMask> {
        let shape = tensor.shape();
        if shape[0] != 1 || shape[1] != 1 {
            return Err(BgRemovalError::processing(format!(
                "Invalid output tensor shape {shape:?}, expected (1, 1, H, W)"
            )));
        }
        let (mask_height, mask_width) = (shape[2] as u32, shape[3] as u32);
        if geometry.offset_x + geometry.new_width > mask_width
            || geometry.offset_y + geometry.new_height > mask_height
        {
            return Err(BgRemovalError::processing(format!(
                "Output tensor {mask_width}x{mask_height} smaller than the letterboxed input"
            )));
        }

        // Last canvas row/column covered by the resized image
        let max_x = geometry.offset_x + geometry.new_width - 1;
        let max_y = geometry.offset_y + geometry.new_height - 1;

        let (orig_width, orig_height) = original_dimensions;
        let mut mask_data = Vec::with_capacity((orig_width * orig_height) as usize);
        for y in 0..orig_height {
            let tensor_y = geometry.canvas_coordinate(y, geometry.offset_y).min(max_y);
            for x in 0..orig_width {
                let tensor_x = geometry.canvas_coordinate(x, geometry.offset_x).min(max_x);
                let value = tensor
                    .get([0, 0, tensor_y as usize, tensor_x as usize])
                    .copied()
                    .unwrap_or(0.0);
                mask_data.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }

        Ok(SegmentationMask::new(mask_data, original_dimensions))
    }

    /// Use the mask as the alpha channel; fully transparent pixels are zeroed
    fn apply_background_removal(image: &DynamicImage, mask: &SegmentationMask) -> RgbaImage {
        let rgba_image = image.to_rgba8();
        let (width, height) = rgba_image.dimensions();
        let mut result = ImageBuffer::new(width, height);

        for (x, y, pixel) in rgba_image.enumerate_pixels() {
            let pixel_index = (y * width + x) as usize;
            let alpha = mask.data.get(pixel_index).copied().unwrap_or(0);

            if alpha > 0 {
                result.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
            } else {
                result.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }

        result
    }
}
