//! Inference backends
//!
//! - ONNX Runtime (feature `onnx`): GPU acceleration where available
//! - Tract (feature `tract`): pure Rust, CPU only
//! - Threshold: Otsu luminance threshold, always available

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub mod threshold;

#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

pub use self::threshold::ThresholdBackend;
