//! End-to-end rendering scenarios for count and redact modes

mod common;

use common::{rect_mask, solid_mask};
use segment_overlay::{
    BoundingBox, CompositingPipeline, EncodedMask, Mode, OverlayConfig, OverlayStatus,
    RasterImage, Result, COUNT_PALETTE,
};

fn pipeline(mode: Mode) -> CompositingPipeline {
    CompositingPipeline::new(OverlayConfig::for_mode(mode)).unwrap()
}

#[tokio::test]
async fn test_full_mask_redacts_every_pixel() -> Result<()> {
    let base = RasterImage::new_filled(10, 10, [200, 40, 90, 255]);
    let result = pipeline(Mode::Redact)
        .run_sequences(&base, vec![solid_mask(10, 10, 255)], &[])
        .await?;

    assert_eq!(result.status, OverlayStatus::Rendered);
    assert_eq!(result.count, 1);
    assert!(result.markers.is_empty());
    assert!(result
        .image
        .pixels()
        .chunks_exact(4)
        .all(|px| px == [0, 0, 0, 255]));
    Ok(())
}

#[tokio::test]
async fn test_low_resolution_mask_is_stretched_to_base() -> Result<()> {
    let base = RasterImage::new_filled(40, 20, [255, 255, 255, 255]);
    // Left half of a 4x2 mask covers the left half of the base after resampling.
    let mask = rect_mask(4, 2, 0, 0, 2, 2);
    let result = pipeline(Mode::Redact).run_sequences(&base, vec![mask], &[]).await?;

    assert_eq!(result.image.dimensions(), (40, 20));
    assert_eq!(result.image.pixel(5, 10), Some([0, 0, 0, 255]));
    assert_eq!(result.image.pixel(35, 10), Some([255, 255, 255, 255]));
    Ok(())
}

#[tokio::test]
async fn test_two_objects_get_distinct_tints_and_numbers() -> Result<()> {
    let base = RasterImage::new_filled(100, 100, [0, 0, 0, 255]);
    let masks = vec![rect_mask(100, 100, 0, 0, 50, 100), rect_mask(100, 100, 50, 0, 100, 100)];
    let boxes = [
        BoundingBox::new(0.0, 0.0, 50.0, 100.0),
        BoundingBox::new(50.0, 0.0, 100.0, 100.0),
    ];

    let result = pipeline(Mode::Count).run_sequences(&base, masks, &boxes).await?;

    assert_eq!(result.count, 2);
    assert!(!result.has_failures());

    // Tints at alpha 120 over black, well away from the markers.
    let [r0, g0, b0] = COUNT_PALETTE[0];
    let [r1, g1, b1] = COUNT_PALETTE[1];
    let tint = |c: u8| (f32::from(c) * 120.0 / 255.0).round() as u8;
    assert_eq!(result.image.pixel(5, 5), Some([tint(r0), tint(g0), tint(b0), 255]));
    assert_eq!(result.image.pixel(95, 5), Some([tint(r1), tint(g1), tint(b1), 255]));

    let labels: Vec<usize> = result.markers.iter().map(|m| m.label).collect();
    assert_eq!(labels, vec![1, 2]);
    assert_eq!(result.markers[0].center, (25.0, 50.0));
    assert_eq!(result.markers[1].center, (75.0, 50.0));

    // The light disc sits over each box midpoint, beside the digit.
    for (x, y) in [(13, 50), (87, 50)] {
        let px = result.image.pixel(x, y).unwrap();
        assert!(px[0] > 180 && px[1] > 180 && px[2] > 180, "pixel {x},{y} = {px:?}");
    }
    Ok(())
}

#[tokio::test]
async fn test_corrupt_mask_is_skipped_and_reported() -> Result<()> {
    let base = RasterImage::new_filled(60, 60, [0, 0, 0, 255]);
    let masks = vec![
        EncodedMask::new(b"not a png".to_vec()),
        rect_mask(60, 60, 0, 0, 60, 60),
    ];
    let boxes = [
        BoundingBox::new(0.0, 0.0, 30.0, 30.0),
        BoundingBox::new(0.0, 0.0, 60.0, 60.0),
    ];

    let result = pipeline(Mode::Count).run_sequences(&base, masks, &boxes).await?;

    assert_eq!(result.count, 1);
    assert_eq!(result.mask_failures.len(), 1);
    assert_eq!(result.mask_failures[0].index, 0);

    // The survivor is the first composited mask, so it takes the first color
    // and the first number, and its marker uses its own box.
    assert_eq!(result.image.pixel(2, 2), Some([120, 0, 0, 255]));
    assert_eq!(result.markers.len(), 1);
    assert_eq!(result.markers[0].label, 1);
    assert_eq!(result.markers[0].center, (30.0, 30.0));
    Ok(())
}

#[tokio::test]
async fn test_no_masks_leaves_base_untouched() -> Result<()> {
    let base = RasterImage::new_filled(16, 9, [10, 20, 30, 255]);
    let result = pipeline(Mode::Redact).run_sequences(&base, Vec::new(), &[]).await?;

    assert_eq!(result.status, OverlayStatus::NothingDetected);
    assert!(result.is_empty());
    assert_eq!(result.count, 0);
    assert_eq!(result.image.pixels(), base.pixels());
    Ok(())
}

#[tokio::test]
async fn test_only_corrupt_masks_counts_as_nothing_detected() -> Result<()> {
    let base = RasterImage::new_filled(8, 8, [50, 50, 50, 255]);
    let masks = vec![EncodedMask::new(Vec::new()), EncodedMask::new(vec![1, 2, 3])];
    let result = pipeline(Mode::Count).run_sequences(&base, masks, &[]).await?;

    assert!(result.is_empty());
    assert_eq!(result.mask_failures.len(), 2);
    assert_eq!(result.image, base);
    Ok(())
}

#[tokio::test]
async fn test_redaction_is_independent_of_mask_order() -> Result<()> {
    let base = RasterImage::new_filled(30, 30, [90, 180, 45, 255]);
    let a = rect_mask(30, 30, 0, 0, 20, 20);
    let b = rect_mask(30, 30, 10, 10, 30, 30);

    let forward = pipeline(Mode::Redact)
        .run_sequences(&base, vec![a.clone(), b.clone()], &[])
        .await?;
    let reverse = pipeline(Mode::Redact).run_sequences(&base, vec![b, a], &[]).await?;

    assert_eq!(forward.image, reverse.image);
    Ok(())
}

#[tokio::test]
async fn test_later_mask_wins_where_tints_overlap() -> Result<()> {
    let base = RasterImage::new_filled(20, 20, [0, 0, 0, 255]);
    let config = OverlayConfig::builder().mode(Mode::Count).annotate(false).build()?;
    let pipeline = CompositingPipeline::new(config)?;
    let masks = vec![solid_mask(20, 20, 255), solid_mask(20, 20, 255)];

    let result = pipeline.run_sequences(&base, masks, &[]).await?;

    // Green over red-over-black.
    let red_on_black = 120u8;
    let expected_r = (f32::from(red_on_black) * 135.0 / 255.0).round() as u8;
    assert_eq!(result.image.pixel(10, 10), Some([expected_r, 120, 0, 255]));
    Ok(())
}

#[tokio::test]
async fn test_threshold_boundary_intensities() -> Result<()> {
    let base = RasterImage::new_filled(10, 10, [255, 255, 255, 255]);
    let masks = vec![solid_mask(10, 10, 100)];
    let at_threshold = pipeline(Mode::Redact).run_sequences(&base, masks, &[]).await?;
    assert_eq!(at_threshold.count, 1);
    assert_eq!(at_threshold.image, base);

    let masks = vec![solid_mask(10, 10, 101)];
    let above = pipeline(Mode::Redact).run_sequences(&base, masks, &[]).await?;
    assert_eq!(above.image.pixel(0, 0), Some([0, 0, 0, 255]));
    Ok(())
}

#[tokio::test]
async fn test_palette_repeats_after_seven_objects() -> Result<()> {
    let base = RasterImage::new_filled(8, 1, [0, 0, 0, 255]);
    let masks = (0..8).map(|x| rect_mask(8, 1, x, 0, x + 1, 1)).collect();
    let config = OverlayConfig::builder().mode(Mode::Count).annotate(false).build()?;

    let result = CompositingPipeline::new(config)?
        .run_sequences(&base, masks, &[])
        .await?;

    assert_eq!(result.count, 8);
    assert_eq!(result.image.pixel(0, 0), result.image.pixel(7, 0));
    assert_ne!(result.image.pixel(0, 0), result.image.pixel(1, 0));
    Ok(())
}

#[tokio::test]
async fn test_base_image_is_not_modified() -> Result<()> {
    let base = RasterImage::new_filled(12, 12, [1, 2, 3, 255]);
    let snapshot = base.clone();
    let _ = pipeline(Mode::Redact)
        .run_sequences(&base, vec![solid_mask(12, 12, 255)], &[])
        .await?;
    assert_eq!(base, snapshot);
    Ok(())
}
