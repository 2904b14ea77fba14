//! Compositing pipeline
//!
//! Orchestrates one overlay run: validate the base image, decode every mask
//! concurrently, then threshold, style and blend the survivors in input order
//! and finally draw markers in count mode.

use crate::{
    annotate,
    compositor,
    config::{Mode, OverlayConfig},
    decoder::MaskDecoder,
    error::Result,
    services::{NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker},
    styler,
    threshold,
    types::{
        pair_detections, BoundingBox, EncodedMask, MaskFailure, OverlayResult, OverlayStatus,
        ProcessingTimings, RasterImage, SegmentedObject,
    },
};
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A mask already decoded to the base image's resolution
#[derive(Debug, Clone)]
pub struct DecodedMask {
    /// One intensity byte per base-image pixel
    pub intensity: Vec<u8>,
    pub bbox: Option<BoundingBox>,
}

/// Runs the decode, composite and annotate stages for one base image
pub struct CompositingPipeline {
    config: OverlayConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl CompositingPipeline {
    /// Create a pipeline with the given configuration
    pub fn new(config: OverlayConfig) -> Result<Self> {
        Self::with_reporter(config, Arc::new(NoOpProgressReporter))
    }

    /// Create a pipeline that reports stage transitions to `reporter`
    pub fn with_reporter(config: OverlayConfig, reporter: Arc<dyn ProgressReporter>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, reporter })
    }

    #[must_use]
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Render masks and boxes given as two positional sequences
    pub async fn run_sequences(
        &self,
        base: &RasterImage,
        masks: Vec<EncodedMask>,
        boxes: &[BoundingBox],
    ) -> Result<OverlayResult> {
        self.run(base, pair_detections(masks, boxes)).await
    }

    /// Render paired objects onto `base`
    ///
    /// `base` is only read; every run works on its own copy. Masks that fail
    /// to decode are listed in `mask_failures` and excluded from compositing
    /// and numbering.
    #[instrument(skip_all, fields(mode = %self.config.mode, objects = objects.len()))]
    pub async fn run(&self, base: &RasterImage, objects: Vec<SegmentedObject>) -> Result<OverlayResult> {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));

        tracker.report_stage(ProcessingStage::Validation);
        if let Err(e) = base.ensure_drawable() {
            tracker.report_error(&e.to_string());
            return Err(e);
        }

        tracker.report_stage(ProcessingStage::Decoding);
        let decode_start = Instant::now();
        let (masks, boxes): (Vec<EncodedMask>, Vec<Option<BoundingBox>>) =
            objects.into_iter().map(|o| (o.mask, o.bbox)).unzip();
        let decoder = MaskDecoder::new(base.width(), base.height());
        let outcomes = decoder.decode_all(masks).await;

        let mut survivors = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (outcome, bbox) in outcomes.into_iter().zip(boxes) {
            match outcome {
                Ok(intensity) => survivors.push(DecodedMask { intensity, bbox }),
                Err(e) if e.is_recoverable() => failures.extend(MaskFailure::try_from(e).ok()),
                Err(e) => {
                    tracker.report_error(&e.to_string());
                    return Err(e);
                },
            }
        }
        let decode_ms = decode_start.elapsed().as_millis() as u64;
        debug!(
            decoded = survivors.len(),
            failed = failures.len(),
            decode_ms,
            "Mask decoding finished"
        );

        self.render(base, survivors, failures, tracker, start, decode_ms)
    }

    /// Render masks that were decoded elsewhere
    ///
    /// Each intensity buffer must hold exactly one byte per base-image pixel.
    pub fn run_decoded(&self, base: &RasterImage, decoded: Vec<DecodedMask>) -> Result<OverlayResult> {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));

        tracker.report_stage(ProcessingStage::Validation);
        if let Err(e) = base.ensure_drawable() {
            tracker.report_error(&e.to_string());
            return Err(e);
        }

        self.render(base, decoded, Vec::new(), tracker, start, 0)
    }

    fn render(
        &self,
        base: &RasterImage,
        survivors: Vec<DecodedMask>,
        mask_failures: Vec<MaskFailure>,
        mut tracker: ProgressTracker,
        start: Instant,
        decode_ms: u64,
    ) -> Result<OverlayResult> {
        let mode = self.config.mode;
        let mut timings = ProcessingTimings {
            decode_ms,
            ..ProcessingTimings::default()
        };

        if survivors.is_empty() {
            match mode {
                Mode::Redact => info!("No regions found to redact"),
                Mode::Count => info!(count = 0, "No objects detected"),
            }
            timings.total_ms = start.elapsed().as_millis() as u64;
            tracker.report_stage(ProcessingStage::Completed);
            tracker.report_completion(&timings);
            return Ok(OverlayResult {
                image: base.clone(),
                count: 0,
                mode,
                status: OverlayStatus::NothingDetected,
                mask_failures,
                markers: Vec::new(),
                timings,
            });
        }

        tracker.report_stage_with_description(
            ProcessingStage::Compositing,
            format!("Compositing {} masks", survivors.len()),
        );
        let composite_start = Instant::now();
        let (width, height) = base.dimensions();
        let mut accumulator = base.clone();
        let mut boxes = Vec::with_capacity(survivors.len());
        for (position, decoded) in survivors.iter().enumerate() {
            let alpha = match threshold::to_alpha_mask(&decoded.intensity, width, height, mode) {
                Ok(alpha) => alpha,
                Err(e) => {
                    tracker.report_error(&e.to_string());
                    return Err(e);
                },
            };
            let style = styler::style_for(position, mode);
            compositor::blend_layer(&mut accumulator, &alpha, &style)?;
            boxes.push(decoded.bbox);
        }
        let count = survivors.len();
        timings.composite_ms = composite_start.elapsed().as_millis() as u64;

        let mut markers = Vec::new();
        if self.config.draws_markers() {
            let boxless = boxes.iter().filter(|b| b.is_none()).count();
            if boxless > 0 {
                warn!(
                    masks = count,
                    boxless,
                    "Some objects have no box and get no marker"
                );
            }
            tracker.report_stage(ProcessingStage::Annotating);
            let annotate_start = Instant::now();
            let (annotated, drawn) = match annotate::annotate(accumulator, &boxes) {
                Ok(out) => out,
                Err(e) => {
                    tracker.report_error(&e.to_string());
                    return Err(e);
                },
            };
            accumulator = annotated;
            markers = drawn;
            timings.annotate_ms = annotate_start.elapsed().as_millis() as u64;
        }

        timings.total_ms = start.elapsed().as_millis() as u64;
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(&timings);
        info!(
            count,
            failed = mask_failures.len(),
            markers = markers.len(),
            total_ms = timings.total_ms,
            "Overlay rendered"
        );

        Ok(OverlayResult {
            image: accumulator,
            count,
            mode,
            status: OverlayStatus::Rendered,
            mask_failures,
            markers,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;

    fn filled_mask(width: u32, height: u32, value: u8) -> DecodedMask {
        DecodedMask {
            intensity: vec![value; (width * height) as usize],
            bbox: None,
        }
    }

    #[test]
    fn test_rejects_zero_sized_base() {
        let pipeline = CompositingPipeline::new(OverlayConfig::for_mode(Mode::Count)).unwrap();
        let base = RasterImage::from_raw(0, 5, Vec::new()).unwrap();
        let result = pipeline.run_decoded(&base, vec![]);
        assert!(matches!(result, Err(OverlayError::DimensionMismatch(_))));
    }

    #[test]
    fn test_empty_redaction_signals_nothing_detected() {
        let pipeline = CompositingPipeline::new(OverlayConfig::for_mode(Mode::Redact)).unwrap();
        let base = RasterImage::new_filled(4, 4, [90, 80, 70, 255]);
        let result = pipeline.run_decoded(&base, vec![]).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.count, 0);
        assert_eq!(result.image, base);
    }

    #[test]
    fn test_full_redaction_blacks_out_image() {
        let pipeline = CompositingPipeline::new(OverlayConfig::for_mode(Mode::Redact)).unwrap();
        let base = RasterImage::new_filled(10, 10, [200, 150, 100, 255]);
        let result = pipeline
            .run_decoded(&base, vec![filled_mask(10, 10, 255)])
            .unwrap();
        assert_eq!(result.status, OverlayStatus::Rendered);
        assert_eq!(result.count, 1);
        assert!(result.markers.is_empty());
        assert!(result.image.pixels().chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn test_below_threshold_mask_leaves_image_but_counts() {
        let pipeline = CompositingPipeline::new(OverlayConfig::for_mode(Mode::Count)).unwrap();
        let base = RasterImage::new_filled(5, 5, [10, 10, 10, 255]);
        let result = pipeline.run_decoded(&base, vec![filled_mask(5, 5, 100)]).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.image, base);
    }

    #[test]
    fn test_wrong_sized_intensity_is_fatal() {
        let pipeline = CompositingPipeline::new(OverlayConfig::for_mode(Mode::Count)).unwrap();
        let base = RasterImage::new_filled(5, 5, [0, 0, 0, 255]);
        let result = pipeline.run_decoded(&base, vec![filled_mask(4, 4, 255)]);
        assert!(matches!(result, Err(OverlayError::DimensionMismatch(_))));
    }

    #[test]
    fn test_annotation_can_be_disabled() {
        let config = OverlayConfig::builder()
            .mode(Mode::Count)
            .annotate(false)
            .build()
            .unwrap();
        let pipeline = CompositingPipeline::new(config).unwrap();
        let base = RasterImage::new_filled(60, 60, [0, 0, 0, 255]);
        let mut mask = filled_mask(60, 60, 255);
        mask.bbox = Some(BoundingBox::new(0.0, 0.0, 60.0, 60.0));
        let result = pipeline.run_decoded(&base, vec![mask]).unwrap();
        assert!(result.markers.is_empty());
        assert_eq!(result.image.pixel(30, 30), Some([120, 0, 0, 255]));
    }

    #[test]
    fn test_marker_numbers_follow_survivor_position() {
        let pipeline = CompositingPipeline::new(OverlayConfig::for_mode(Mode::Count)).unwrap();
        let base = RasterImage::new_filled(90, 30, [0, 0, 0, 255]);
        let with_box = |x: f32| DecodedMask {
            bbox: Some(BoundingBox::new(x, 0.0, x + 30.0, 30.0)),
            ..filled_mask(90, 30, 0)
        };
        let decoded = vec![with_box(0.0), filled_mask(90, 30, 0), with_box(60.0)];

        let result = pipeline.run_decoded(&base, decoded).unwrap();

        assert_eq!(result.count, 3);
        let labels: Vec<(usize, (f32, f32))> =
            result.markers.iter().map(|m| (m.label, m.center)).collect();
        assert_eq!(labels, vec![(1, (15.0, 15.0)), (3, (75.0, 15.0))]);
    }
}
