//! Shared helpers used by the processor and the CLI

pub mod models;
pub mod preprocessing;
pub mod providers;

pub use models::ModelSpecParser;
pub use preprocessing::{ImagePreprocessor, LetterboxGeometry, PreprocessingOptions};
pub use providers::{ExecutionProviderManager, ProviderInfo};
