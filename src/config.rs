//! Configuration types for overlay rendering

use crate::error::{OverlayError, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// Operating policy of the engine
///
/// `Count` tints every mask with a palette color and numbers the objects;
/// `Redact` paints every mask solid black and never annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Count,
    Redact,
}

impl Mode {
    /// Whether numbered markers are drawn in this mode
    #[must_use]
    pub fn annotates(self) -> bool {
        matches!(self, Self::Count)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count => write!(f, "count"),
            Self::Redact => write!(f, "redact"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "redact" => Ok(Self::Redact),
            other => Err(OverlayError::invalid_config(format!(
                "Unknown mode '{}' (expected 'count' or 'redact')",
                other
            ))),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG with alpha channel
    #[default]
    Png,
    /// JPEG (alpha channel dropped)
    Jpeg,
    /// TIFF with alpha channel and lossless compression
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl OutputFormat {
    /// The `image` crate format used for encoding, if any
    #[must_use]
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            Self::Png => Some(ImageFormat::Png),
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Tiff => Some(ImageFormat::Tiff),
            Self::Rgba8 => None,
        }
    }
}

/// Configuration for one overlay rendering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Styling policy
    pub mode: Mode,

    /// Encoding used when the result is exported
    pub output_format: OutputFormat,

    /// JPEG quality (0-100)
    pub jpeg_quality: u8,

    /// Draw numbered markers in count mode
    pub annotate: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Count,
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
            annotate: true,
        }
    }
}

impl OverlayConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> OverlayConfigBuilder {
        OverlayConfigBuilder::new()
    }

    /// Shorthand for a default configuration in the given mode
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Whether the annotation stage runs for this configuration
    #[must_use]
    pub fn draws_markers(&self) -> bool {
        self.annotate && self.mode.annotates()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(OverlayError::invalid_config(format!(
                "JPEG quality must be between 0 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Builder for `OverlayConfig`
pub struct OverlayConfigBuilder {
    config: OverlayConfig,
}

impl OverlayConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: OverlayConfig::default(),
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn annotate(mut self, annotate: bool) -> Self {
        self.config.annotate = annotate;
        self
    }

    /// Build the configuration, validating it first
    pub fn build(self) -> Result<OverlayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for OverlayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
