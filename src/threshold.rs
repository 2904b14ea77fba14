//! Intensity to alpha conversion

use crate::{
    config::Mode,
    error::{OverlayError, Result},
    types::AlphaMask,
};

/// Intensities strictly above this value belong to the object
pub const MASK_THRESHOLD: u8 = 100;

/// Alpha of a tinted pixel in count mode
pub const COUNT_OPACITY: u8 = 120;

/// Alpha of a redacted pixel; always fully opaque
pub const REDACT_OPACITY: u8 = 255;

/// Opacity assigned to pixels inside the mask for `mode`
#[must_use]
pub fn opacity_for(mode: Mode) -> u8 {
    match mode {
        Mode::Count => COUNT_OPACITY,
        Mode::Redact => REDACT_OPACITY,
    }
}

/// Map one intensity sample to an alpha value
#[must_use]
pub fn threshold(intensity: u8, mode: Mode) -> u8 {
    if intensity > MASK_THRESHOLD {
        opacity_for(mode)
    } else {
        0
    }
}

/// Threshold a whole intensity buffer into an alpha mask
pub fn to_alpha_mask(intensity: &[u8], width: u32, height: u32, mode: Mode) -> Result<AlphaMask> {
    let expected = width as usize * height as usize;
    if intensity.len() != expected {
        return Err(OverlayError::dimension_mismatch(format!(
            "intensity buffer has {} samples, {}x{} target needs {}",
            intensity.len(),
            width,
            height,
            expected
        )));
    }

    Ok(AlphaMask {
        width,
        height,
        alpha: intensity.iter().map(|&v| threshold(v, mode)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_exclusive() {
        assert_eq!(threshold(100, Mode::Redact), 0);
        assert_eq!(threshold(101, Mode::Redact), 255);
        assert_eq!(threshold(100, Mode::Count), 0);
        assert_eq!(threshold(101, Mode::Count), 120);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(threshold(0, Mode::Redact), 0);
        assert_eq!(threshold(255, Mode::Redact), 255);
        assert_eq!(threshold(255, Mode::Count), 120);
    }

    #[test]
    fn test_redact_alpha_is_binary() {
        let intensity: Vec<u8> = (0..=255).collect();
        let mask = to_alpha_mask(&intensity, 16, 16, Mode::Redact).unwrap();
        assert!(mask.alpha.iter().all(|&a| a == 0 || a == 255));
        assert_eq!(mask.coverage(), 155);
    }

    #[test]
    fn test_buffer_size_is_checked() {
        let result = to_alpha_mask(&[0; 10], 4, 4, Mode::Count);
        assert!(matches!(result, Err(OverlayError::DimensionMismatch(_))));
    }
}
