//! Inference backend abstraction

use crate::{
    config::RemovalConfig,
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
    utils::LetterboxGeometry,
};
use instant::Duration;
use ndarray::Array4;

/// A segmentation engine turning an NCHW image tensor into a mask tensor
///
/// Input is `(1, 3, S, S)` as produced by
/// [`ImagePreprocessor`](crate::utils::ImagePreprocessor); output is
/// `(1, 1, S, S)` with foreground probabilities in `[0, 1]`.
pub trait InferenceBackend: std::fmt::Debug {
    /// Initialize the backend, returning the model load time when a model
    /// was loaded
    ///
    /// # Errors
    /// - Model loading or validation errors
    /// - Invalid configuration parameters
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Inference failures or unexpected tensor shapes
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Where the image sits inside the next input tensor
    ///
    /// Everything outside the placed region is letterbox padding. Backends
    /// that derive statistics from the input restrict them to this region.
    fn set_letterbox(&mut self, _geometry: &LetterboxGeometry) {}

    fn input_shape(&self) -> (usize, usize, usize, usize);

    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Preprocessing the backend expects its input tensor to have
    ///
    /// # Errors
    /// - Model not available
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// # Errors
    /// - Model not available
    fn get_model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{FailingBackend, MockBackend};

    #[test]
    fn test_backend_trait_object() {
        let mut backends: Vec<Box<dyn InferenceBackend>> =
            vec![Box::new(MockBackend::new(16)), Box::new(FailingBackend::new())];

        for backend in &mut backends {
            assert!(!backend.is_initialized());
            assert_eq!(backend.input_shape().1, 3);
            assert_eq!(backend.output_shape().1, 1);
        }

        let mock = backends.first_mut().unwrap();
        mock.initialize(&RemovalConfig::default()).unwrap();
        assert!(mock.is_initialized());

        let config = mock.get_preprocessing_config().unwrap();
        let output = mock
            .infer(&Array4::zeros((1, 3, config.target_size[0] as usize, config.target_size[1] as usize)))
            .unwrap();
        assert_eq!(output.shape(), &[1, 1, 16, 16]);
    }

    #[test]
    fn test_infer_before_initialize_fails() {
        let mut backend = MockBackend::new(8);
        assert!(backend.infer(&Array4::zeros((1, 3, 8, 8))).is_err());
    }
}
