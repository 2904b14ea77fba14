#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Segment Overlay
//!
//! Renders the output of a text-prompted segmentation service onto the image
//! it was produced for. Each detected object arrives as a grayscale PNG mask
//! plus an optional bounding box.
//!
//! - **Count mode** tints every object with a rotating palette color and
//!   draws a numbered marker at the center of its box.
//! - **Redact mode** covers every object with an opaque black patch.
//!
//! Masks are decoded concurrently; compositing is a sequential fold in input
//! order, so later masks paint over earlier ones. A mask that fails to decode
//! is skipped and reported, never fatal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segment_overlay::{
//!     render_overlay, Mode, OverlayConfig, SegmentationResponse, services::ImageIOService,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let base = ImageIOService::load_raster("street.jpg")?;
//! let response = SegmentationResponse::from_json(&std::fs::read_to_string("response.json")?)?;
//!
//! let result = render_overlay(&base, response, &OverlayConfig::for_mode(Mode::Redact)).await?;
//! if result.is_empty() {
//!     println!("No regions found to redact");
//! }
//! result.save_png("street_redacted.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): command-line interface, progress spinner and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI

pub mod annotate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod decoder;
pub mod error;
pub mod pipeline;
pub mod response;
pub mod services;
pub mod styler;
pub mod threshold;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use annotate::{annotate, Marker};
pub use compositor::{blend_layer, composite};
pub use config::{Mode, OutputFormat, OverlayConfig, OverlayConfigBuilder};
pub use decoder::MaskDecoder;
pub use error::{OverlayError, Result};
pub use pipeline::{CompositingPipeline, DecodedMask};
pub use response::{GroundRequest, RedactionTargets, SegmentationResponse};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use styler::{style_for, COUNT_PALETTE, REDACT_COLOR};
pub use threshold::{to_alpha_mask, MASK_THRESHOLD};
pub use types::{
    pair_detections, pair_optional_boxes, AlphaMask, BoundingBox, EncodedMask, MaskFailure,
    OverlayResult, OverlayStatus, OverlaySummary, ProcessingTimings, RasterImage,
    SegmentedObject, Style,
};

#[cfg(feature = "cli")]
pub use tracing_config::{
    events, init_cli_tracing, new_session_id, spans, TracingConfig, TracingFormat,
};

/// Render a parsed segmentation response onto `base`
///
/// # Examples
///
/// ```rust,no_run
/// use segment_overlay::{render_overlay, OverlayConfig, RasterImage, SegmentationResponse};
///
/// # async fn example() -> anyhow::Result<()> {
/// let base = RasterImage::new_filled(64, 64, [255, 255, 255, 255]);
/// let response = SegmentationResponse::from_json(r#"{"masks": [], "boxes": []}"#)?;
/// let result = render_overlay(&base, response, &OverlayConfig::default()).await?;
/// assert_eq!(result.count, 0);
/// # Ok(())
/// # }
/// ```
pub async fn render_overlay(
    base: &RasterImage,
    response: SegmentationResponse,
    config: &OverlayConfig,
) -> Result<OverlayResult> {
    let pipeline = CompositingPipeline::new(config.clone())?;
    pipeline.run(base, response.into_objects()).await
}

/// Render from an encoded base image and a raw response body
///
/// Convenience wrapper that decodes the image, parses the JSON and runs
/// [`render_overlay`].
pub async fn render_overlay_from_bytes(
    image_bytes: &[u8],
    response_body: &[u8],
    config: &OverlayConfig,
) -> Result<OverlayResult> {
    let base = RasterImage::from_dynamic(&ImageIOService::load_from_bytes(image_bytes)?);
    let response = SegmentationResponse::from_slice(response_body)?;
    render_overlay(&base, response, config).await
}
