//! Error types for mask compositing operations

use thiserror::Error;

/// Result type alias for overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Error types for overlay rendering
///
/// `MaskDecode` is the only recoverable variant: the pipeline records it per
/// mask and keeps going. Every other variant aborts the run.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed collaborator payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A single mask blob could not be decoded
    #[error("Failed to decode mask {index}: {reason}")]
    MaskDecode { index: usize, reason: String },

    /// Base image is unusable as a compositing target
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Drawing surface could not be acquired
    #[error("Render surface unavailable: {0}")]
    RenderSurface(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Segmentation response did not have the expected shape
    #[error("Invalid segmentation response: {0}")]
    InvalidResponse(String),

    /// Generic processing failure
    #[error("Processing error: {0}")]
    Processing(String),
}

impl OverlayError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new dimension mismatch error
    pub fn dimension_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Create a new render surface error
    pub fn render_surface<S: Into<String>>(msg: S) -> Self {
        Self::RenderSurface(msg.into())
    }

    /// Create a new invalid response error
    pub fn invalid_response<S: Into<String>>(msg: S) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a per-mask decode error
    pub fn mask_decode<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::MaskDecode {
            index,
            reason: reason.into(),
        }
    }

    /// Whether the pipeline can skip the offending mask and continue
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MaskDecode { .. })
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}
