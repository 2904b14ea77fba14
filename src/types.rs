//! Core types for mask compositing operations

use crate::{
    annotate::Marker,
    config::{Mode, OutputFormat},
    error::{OverlayError, Result},
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Owned RGBA pixel buffer, row-major, 4 bytes per pixel
///
/// The constructor enforces `pixels.len() == width * height * 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Wrap raw RGBA bytes, checking the length invariant
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(OverlayError::dimension_mismatch(format!(
                "{}x{} RGBA image needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create an image with every pixel set to `rgba`
    #[must_use]
    pub fn new_filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Convert any decoded image to RGBA8
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from(image.to_rgba8())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels (not bytes)
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// RGBA value at `(x, y)`, or `None` outside the image
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(offset..offset + 4)
            .and_then(|px| px.try_into().ok())
    }

    /// Fail unless this image can serve as a compositing target
    pub fn ensure_drawable(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(OverlayError::dimension_mismatch(format!(
                "base image must have non-zero size, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length invariant holds, so this cannot fail.
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    /// Encode in the given format
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        match format {
            OutputFormat::Png | OutputFormat::Tiff => {
                let image_format = format
                    .image_format()
                    .ok_or_else(|| OverlayError::processing("missing encoder for format"))?;
                let mut cursor = Cursor::new(&mut buffer);
                DynamicImage::ImageRgba8(self.to_rgba_image()).write_to(&mut cursor, image_format)?;
            },
            OutputFormat::Jpeg => {
                let rgb_image = DynamicImage::ImageRgba8(self.to_rgba_image()).to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
                encoder.encode_image(&rgb_image)?;
            },
            OutputFormat::Rgba8 => buffer.extend_from_slice(&self.pixels),
        }
        Ok(buffer)
    }

    /// Encode and write to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat, quality: u8) -> Result<()> {
        let bytes = self.to_bytes(format, quality)?;
        std::fs::write(&path, bytes)
            .map_err(|e| OverlayError::file_io_error("write output image", &path, &e))
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }
}

/// Encoded grayscale mask as returned by the segmentation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMask {
    data: Vec<u8>,
}

impl EncodedMask {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolution of the mask as encoded, read from the image header
    pub fn native_dimensions(&self) -> Result<(u32, u32)> {
        let reader = image::ImageReader::new(Cursor::new(&self.data)).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }
}

impl From<Vec<u8>> for EncodedMask {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// Axis-aligned box in base-image pixel coordinates
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Midpoint of the box
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One detected object: its mask and, when known, its box
#[derive(Debug, Clone)]
pub struct SegmentedObject {
    pub mask: EncodedMask,
    pub bbox: Option<BoundingBox>,
}

impl SegmentedObject {
    #[must_use]
    pub fn new(mask: EncodedMask, bbox: Option<BoundingBox>) -> Self {
        Self { mask, bbox }
    }
}

/// Pair masks with boxes by array position
///
/// Masks without a box at the same index get `bbox: None`; surplus boxes are
/// dropped since there is no mask to number.
#[must_use]
pub fn pair_detections(masks: Vec<EncodedMask>, boxes: &[BoundingBox]) -> Vec<SegmentedObject> {
    let boxes: Vec<Option<BoundingBox>> = boxes.iter().copied().map(Some).collect();
    pair_optional_boxes(masks, &boxes)
}

/// Like [`pair_detections`], for box lists where entries may be missing
#[must_use]
pub fn pair_optional_boxes(
    masks: Vec<EncodedMask>,
    boxes: &[Option<BoundingBox>],
) -> Vec<SegmentedObject> {
    if masks.len() != boxes.len() {
        tracing::warn!(
            masks = masks.len(),
            boxes = boxes.len(),
            "Mask and box counts differ; masks without a box get no marker"
        );
    }
    masks
        .into_iter()
        .enumerate()
        .map(|(i, mask)| SegmentedObject::new(mask, boxes.get(i).copied().flatten()))
        .collect()
}

/// Per-pixel opacity for one mask, aligned with the base image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

impl AlphaMask {
    /// Number of pixels with non-zero alpha
    #[must_use]
    pub fn coverage(&self) -> usize {
        self.alpha.iter().filter(|&&a| a > 0).count()
    }
}

/// Visual treatment for one mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: [u8; 3],
    /// Alpha assigned to pixels inside the mask
    pub opacity: u8,
    /// Binary alpha (0 or 255) when true
    pub hard_edge: bool,
}

/// Outcome classification of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayStatus {
    /// At least one mask was composited
    Rendered,
    /// No mask survived decoding; the image is the untouched base
    NothingDetected,
}

/// A mask that was skipped because it could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskFailure {
    /// Position of the mask in the input sequence
    pub index: usize,
    pub reason: String,
}

impl TryFrom<OverlayError> for MaskFailure {
    type Error = OverlayError;

    /// Per-mask decode errors become failures; anything else is handed back
    fn try_from(error: OverlayError) -> std::result::Result<Self, Self::Error> {
        match error {
            OverlayError::MaskDecode { index, reason } => Ok(Self { index, reason }),
            other => Err(other),
        }
    }
}

/// Timing breakdown for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Concurrent mask decoding (wall clock)
    pub decode_ms: u64,

    /// Thresholding, styling and blending
    pub composite_ms: u64,

    /// Marker drawing (zero when skipped)
    pub annotate_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Composite: {}ms | Annotate: {}ms",
            self.total_ms, self.decode_ms, self.composite_ms, self.annotate_ms
        )
    }
}

/// Result of one overlay run
#[derive(Debug, Clone)]
pub struct OverlayResult {
    /// Final image at the base image's resolution
    pub image: RasterImage,

    /// Number of masks composited
    pub count: usize,

    /// Mode the image was rendered in
    pub mode: Mode,

    pub status: OverlayStatus,

    /// Masks dropped during decoding, in input order
    pub mask_failures: Vec<MaskFailure>,

    /// Markers drawn (count mode only)
    pub markers: Vec<Marker>,

    pub timings: ProcessingTimings,
}

impl OverlayResult {
    /// True when no regions were found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status == OverlayStatus::NothingDetected
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.mask_failures.is_empty()
    }

    /// Encode the final image
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        self.image.to_bytes(format, quality)
    }

    /// Save the final image as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save(path, OutputFormat::Png, 100)
    }

    /// Everything except the pixels, stamped with the current time
    #[must_use]
    pub fn summary(&self) -> OverlaySummary {
        OverlaySummary {
            rendered_at: Utc::now(),
            width: self.image.width(),
            height: self.image.height(),
            count: self.count,
            mode: self.mode,
            status: self.status,
            mask_failures: self.mask_failures.clone(),
            markers: self.markers.clone(),
            timings: self.timings.clone(),
        }
    }
}

/// JSON-friendly description of an overlay run
#[derive(Debug, Clone, Serialize)]
pub struct OverlaySummary {
    pub rendered_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub count: usize,
    pub mode: Mode,
    pub status: OverlayStatus,
    pub mask_failures: Vec<MaskFailure>,
    pub markers: Vec<Marker>,
    pub timings: ProcessingTimings,
}

impl OverlaySummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
