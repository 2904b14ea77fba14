//! Output format handling service

use crate::{
    config::OutputFormat,
    error::{OverlayError, Result},
};
use std::path::Path;

/// Service for output format queries
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Get the file extension for a given output format
    ///
    /// # Examples
    /// ```rust
    /// use segment_overlay::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "raw",
        }
    }

    /// Infer the output format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<OutputFormat> {
        let path_ref = path.as_ref();
        let extension = path_ref
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "raw" | "rgba" => Ok(OutputFormat::Rgba8),
            _ => Err(OverlayError::invalid_config(format!(
                "Cannot infer output format from '{}'",
                path_ref.display()
            ))),
        }
    }

    /// Check if a format keeps the alpha channel
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::Tiff | OutputFormat::Rgba8 => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Quality range `(min, max, default)` for lossy formats
    #[must_use]
    pub fn get_quality_range(format: OutputFormat) -> Option<(u8, u8, u8)> {
        match format {
            OutputFormat::Jpeg => Some((0, 100, 90)),
            OutputFormat::Png | OutputFormat::Tiff | OutputFormat::Rgba8 => None,
        }
    }
}
