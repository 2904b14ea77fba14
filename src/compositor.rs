//! Source-over compositing of styled masks
//!
//! Layers are painted in sequence onto a private copy of the base image, so a
//! later mask covers an earlier one wherever they overlap. The base image is
//! never modified.

use crate::{
    error::{OverlayError, Result},
    types::{AlphaMask, RasterImage, Style},
};
use tracing::trace;

/// Blend one channel: `src * a + dst * (1 - a)` with `a` in [0, 1]
#[inline]
fn blend_channel(src: u8, dst: u8, alpha: f32) -> u8 {
    (f32::from(src) * alpha + f32::from(dst) * (1.0 - alpha)).round() as u8
}

/// Paint one styled mask onto `accumulator` in place
pub fn blend_layer(accumulator: &mut RasterImage, mask: &AlphaMask, style: &Style) -> Result<()> {
    if (mask.width, mask.height) != accumulator.dimensions() {
        return Err(OverlayError::dimension_mismatch(format!(
            "alpha mask is {}x{} but accumulator is {}x{}",
            mask.width,
            mask.height,
            accumulator.width(),
            accumulator.height()
        )));
    }

    let expected = accumulator.width() as usize * accumulator.height() as usize;
    if mask.alpha.len() != expected {
        return Err(OverlayError::dimension_mismatch(format!(
            "alpha mask holds {} values for {} pixels",
            mask.alpha.len(),
            expected
        )));
    }

    let [r, g, b] = style.color;
    for (px, &a) in accumulator.pixels_mut().chunks_exact_mut(4).zip(&mask.alpha) {
        if a == 0 {
            continue;
        }
        let sa = f32::from(a) / 255.0;
        px[0] = blend_channel(r, px[0], sa);
        px[1] = blend_channel(g, px[1], sa);
        px[2] = blend_channel(b, px[2], sa);
        // Standard over for coverage: a_out = a_src + a_dst * (1 - a_src)
        px[3] = (f32::from(a) + f32::from(px[3]) * (1.0 - sa)).round().min(255.0) as u8;
    }
    Ok(())
}

/// Composite `layers` over a copy of `base` in iteration order
///
/// An empty layer sequence returns an exact copy of `base`.
pub fn composite<I>(base: &RasterImage, layers: I) -> Result<RasterImage>
where
    I: IntoIterator<Item = (AlphaMask, Style)>,
{
    layers
        .into_iter()
        .enumerate()
        .try_fold(base.clone(), |mut accumulator, (position, (mask, style))| {
            trace!(position, coverage = mask.coverage(), "Blending layer");
            blend_layer(&mut accumulator, &mask, &style)?;
            Ok(accumulator)
        })
}
