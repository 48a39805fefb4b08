//! Mock backends for unit tests
//!
//! They need no model files and record which trait methods were called.

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Backend producing a constant mask
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    size: usize,
    fill: f32,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Fully opaque mask on a `size`×`size` canvas
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::with_fill(size, 1.0)
    }

    #[must_use]
    pub fn with_fill(size: usize, fill: f32) -> Self {
        Self {
            initialized: false,
            size,
            fill,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the call history, usable after the backend is boxed
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");
        if !self.initialized {
            return Err(BgRemovalError::inference("Mock backend not initialized"));
        }
        if input.shape() != [1, 3, self.size, self.size] {
            return Err(BgRemovalError::inference(format!(
                "Unexpected input shape {:?}",
                input.shape()
            )));
        }
        Ok(Array4::from_elem((1, 1, self.size, self.size), self.fill))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.size, self.size)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, self.size, self.size)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig::identity(self.size as u32))
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock-model".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Backend that initializes but fails every inference
#[derive(Debug, Default)]
pub struct FailingBackend {
    initialized: bool,
}

impl FailingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InferenceBackend for FailingBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        self.initialized = true;
        Ok(None)
    }

    fn infer(&mut self, _input: &Array4<f32>) -> Result<Array4<f32>> {
        Err(BgRemovalError::inference("Mock inference failure"))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, 8, 8)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, 8, 8)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig::identity(8))
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Err(BgRemovalError::model("Failing backend has no model"))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
