//! ONNX Runtime backend
//!
//! Runs segmentation models through `ort` with CPU, CUDA or `CoreML`
//! execution providers. Unavailable accelerators fall back to CPU with a
//! warning instead of failing.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

fn cuda_available() -> bool {
    OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
}

fn coreml_available() -> bool {
    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
}

impl OnnxBackend {
    /// ONNX Runtime execution providers as `(name, available, description)`
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 System Hardware Analysis:");
        log::debug!("  - Platform: {}", std::env::consts::OS);
        log::debug!("  - Architecture: {}", std::env::consts::ARCH);
        log::debug!(
            "  - CPU cores: {}",
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        );

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available(),
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available(),
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    fn model_manager(&self) -> Result<&ModelManager> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::model("ONNX backend has no model configured"))
    }

    /// Execution providers to register for the requested one
    fn execution_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let mut providers = Vec::new();
        let want_cuda = matches!(requested, ExecutionProvider::Auto | ExecutionProvider::Cuda);
        let want_coreml = matches!(requested, ExecutionProvider::Auto | ExecutionProvider::CoreMl);

        if want_cuda {
            if cuda_available() {
                log::info!("🚀 Using CUDA execution provider");
                providers.push(CUDAExecutionProvider::default().build());
            } else if requested == ExecutionProvider::Cuda {
                log::warn!("CUDA execution provider requested but not available, falling back to CPU");
            }
        }

        if want_coreml {
            if coreml_available() {
                log::info!("🍎 Using CoreML execution provider");
                providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
            } else if requested == ExecutionProvider::CoreMl {
                log::warn!("CoreML execution provider requested but not available, falling back to CPU");
            }
        }

        if providers.is_empty() {
            log::info!("Using CPU execution provider");
        }
        providers
    }

    fn thread_counts(config: &RemovalConfig) -> (usize, usize) {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };
        (intra, inter)
    }

    fn load_model(&mut self, config: &RemovalConfig) -> Result<std::time::Duration> {
        let model_load_start = std::time::Instant::now();
        let model_manager = self.model_manager()?;
        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        let ort_err = |what: &str| {
            let what = what.to_string();
            move |e: ort::Error| BgRemovalError::inference(format!("Failed to {what}: {e}"))
        };

        let mut session_builder: SessionBuilder = Session::builder()
            .map_err(ort_err("create session builder"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_err("set optimization level"))?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(ort_err("register execution providers"))?;
        }

        let (intra_threads, inter_threads) = Self::thread_counts(config);
        let session = session_builder
            .with_parallel_execution(true)
            .map_err(ort_err("enable parallel execution"))?
            .with_intra_threads(intra_threads)
            .map_err(ort_err("set intra threads"))?
            .with_inter_threads(inter_threads)
            .map_err(ort_err("set inter threads"))?
            .commit_from_memory(&model_data)
            .map_err(ort_err("create session from model data"))?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Requested provider: {:?}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op, {inter_threads} inter-op");
        log::debug!(
            "  - Model: {} ({}, {:.2} MB)",
            model_info.name,
            model_info.precision,
            model_info.size_bytes as f64 / (1024.0 * 1024.0)
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<std::time::Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("ONNX session not initialized"))?;

        let inference_start = std::time::Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| BgRemovalError::inference(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        // First output is the mask regardless of its name
        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgRemovalError::inference(format!("Failed to extract output tensor: {e}")))?;

        let result = output_tensor
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|e| {
                BgRemovalError::inference(format!("Expected 4D output tensor: {e}"))
            })?;

        log::info!(
            "📊 Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
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

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
