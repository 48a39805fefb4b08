//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error taxonomy for decoding, removal, encoding and model management
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input/output errors (file not found, permission denied, missing directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported file format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Image shape or processing pipeline errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Model download errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a network error wrapping the underlying cause
    pub fn network_error<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Create file I/O error with operation context
    ///
    /// The original `ErrorKind` is kept so callers can still match on
    /// `NotFound` and friends.
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Input bytes that no enabled decoder understands
    ///
    /// Reported as `Image` with `InvalidData` so it is distinct from a
    /// missing file.
    pub fn undecodable_image<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        Self::Image(image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("'{}' is not a decodable image: {error}", path.as_ref().display()),
        )))
    }

    /// Model directory without the files a backend needs
    pub fn incomplete_model<P: AsRef<std::path::Path>>(model_dir: P, missing: &str) -> Self {
        Self::Model(format!(
            "Model directory '{}' has no {missing}; download it again with --only-download",
            model_dir.as_ref().display()
        ))
    }

    /// Encoder quality outside 0-100
    pub fn quality_out_of_range(encoder: &str, quality: u8) -> Self {
        Self::InvalidConfig(format!("{encoder} quality must be 0-100, got {quality}"))
    }

    /// Image with no pixels along one axis
    pub fn zero_dimension(stage: &str, width: u32, height: u32) -> Self {
        Self::Processing(format!(
            "Cannot remove background of a {width}x{height} image ({stage})"
        ))
    }

    /// Whether this error means a file was not there
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
