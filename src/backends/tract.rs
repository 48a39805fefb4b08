//! Tract backend
//!
//! Pure Rust inference of the same ONNX models the ONNX Runtime backend
//! loads. CPU only, no native libraries required.

use crate::config::RemovalConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::{Array4, Ix4};
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running background removal models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// Tract execution providers as `(name, available, description)`
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 Tract Backend System Analysis:");
        log::debug!("  - Platform: {}", std::env::consts::OS);
        log::debug!("  - Architecture: {}", std::env::consts::ARCH);

        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    fn model_manager(&self) -> Result<&ModelManager> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::model("No model manager available for Tract backend"))
    }

    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_manager = self.model_manager()?;
        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;
        let [height, width] = model_manager.get_preprocessing_config()?.target_size;

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {} ({})", model_info.name, model_info.precision);
        log::info!(
            "📏 Model size: {:.2} MB",
            model_info.size_bytes as f64 / (1024.0 * 1024.0)
        );

        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, height as usize, width as usize]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgRemovalError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::inference("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_array = output_tensor
            .to_array_view::<f32>()
            .map_err(|e| BgRemovalError::inference(format!("Failed to convert output tensor: {e}")))?
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|e| BgRemovalError::inference(format!("Expected 4D output tensor: {e}")))?;

        log::debug!(
            "✅ Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
        );
        Ok(output_array)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 3, 1024, 1024), |info| info.input_shape)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 1, 1024, 1024), |info| info.output_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager()?.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager()?.get_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::write_fake_model;
    use tempfile::TempDir;

    #[test]
    fn test_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0, "CPU");
        assert!(providers[0].1);
    }

    #[test]
    fn test_garbage_model_fails_to_load() {
        let temp = TempDir::new().unwrap();
        let model_dir = write_fake_model(temp.path(), "broken", &["fp16"]);
        let manager = ModelManager::with_model_directory(&model_dir, None, None).unwrap();
        let mut backend = TractBackend::with_model_manager(manager);

        let err = backend.initialize(&RemovalConfig::default()).unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(!backend.is_initialized());
        assert!(backend.infer(&Array4::zeros((1, 3, 2, 2))).is_err());
    }

    #[test]
    fn test_shapes_come_from_model() {
        let temp = TempDir::new().unwrap();
        let model_dir = write_fake_model(temp.path(), "isnet", &["fp32"]);
        let manager = ModelManager::with_model_directory(&model_dir, None, None).unwrap();
        let backend = TractBackend::with_model_manager(manager);

        assert_eq!(backend.input_shape(), (1, 3, 1024, 1024));
        assert_eq!(backend.output_shape(), (1, 1, 1024, 1024));
        assert_eq!(
            backend.get_preprocessing_config().unwrap().target_size,
            [1024, 1024]
        );
    }
}
