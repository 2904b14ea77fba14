//! Mask decoding
//!
//! Turns encoded grayscale masks into intensity buffers aligned pixel-for-pixel
//! with the base image. A set of masks decodes concurrently on the blocking
//! pool and is joined before anything downstream runs.

use crate::{
    error::{OverlayError, Result},
    types::EncodedMask,
};
use futures::future::join_all;
use image::imageops::{self, FilterType};
use tracing::{debug, instrument, warn};

/// Decodes masks to the resolution of one base image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskDecoder {
    target_width: u32,
    target_height: u32,
}

impl MaskDecoder {
    #[must_use]
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    #[must_use]
    pub fn target_dimensions(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Decode one mask into `target_width * target_height` intensity bytes
    ///
    /// Intensity is the red channel of the decoded image. Masks at a different
    /// resolution are stretched to the target with nearest-neighbor sampling.
    pub fn decode(&self, mask: &EncodedMask) -> Result<Vec<u8>> {
        if mask.is_empty() {
            return Err(OverlayError::processing("mask blob is empty"));
        }

        let decoded = image::load_from_memory(mask.as_bytes())?;
        let rgba = decoded.to_rgba8();
        let (native_width, native_height) = rgba.dimensions();
        if native_width == 0 || native_height == 0 {
            return Err(OverlayError::processing(format!(
                "mask has zero size ({}x{})",
                native_width, native_height
            )));
        }

        let aligned = if (native_width, native_height) == self.target_dimensions() {
            rgba
        } else {
            debug!(
                native_width,
                native_height,
                target_width = self.target_width,
                target_height = self.target_height,
                "Resampling mask to base resolution"
            );
            imageops::resize(
                &rgba,
                self.target_width,
                self.target_height,
                FilterType::Nearest,
            )
        };

        Ok(aligned.pixels().map(|p| p.0[0]).collect())
    }

    /// Decode the mask at `index` of a set
    ///
    /// Any failure is reported as [`OverlayError::MaskDecode`] for that index.
    pub fn decode_indexed(&self, index: usize, mask: &EncodedMask) -> Result<Vec<u8>> {
        self.decode(mask)
            .map_err(|e| OverlayError::mask_decode(index, e.to_string()))
    }

    /// Decode every mask concurrently and wait for all of them
    ///
    /// Output order matches input order. Each entry is either the intensity
    /// buffer or an [`OverlayError::MaskDecode`] for that index; one bad mask
    /// never affects the others.
    #[instrument(skip(self, masks), fields(mask_count = masks.len()))]
    pub async fn decode_all(&self, masks: Vec<EncodedMask>) -> Vec<Result<Vec<u8>>> {
        let decoder = *self;
        let tasks = masks.into_iter().enumerate().map(|(index, mask)| async move {
            let handle = tokio::task::spawn_blocking(move || decoder.decode_indexed(index, &mask));
            let outcome = handle.await.unwrap_or_else(|join_error| {
                Err(OverlayError::mask_decode(
                    index,
                    format!("decode task did not complete: {}", join_error),
                ))
            });
            if let Err(e) = &outcome {
                warn!(index, error = %e, "Skipping mask that failed to decode");
            }
            outcome
        });

        join_all(tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;

    fn encode_gray(image: GrayImage) -> EncodedMask {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        EncodedMask::new(bytes)
    }

    #[test]
    fn test_decode_same_resolution_reads_luminance() {
        let mut gray = GrayImage::new(4, 2);
        gray.put_pixel(1, 0, Luma([200]));
        gray.put_pixel(3, 1, Luma([77]));

        let intensity = MaskDecoder::new(4, 2).decode(&encode_gray(gray)).unwrap();
        assert_eq!(intensity.len(), 8);
        assert_eq!(intensity[1], 200);
        assert_eq!(intensity[7], 77);
        assert_eq!(intensity[0], 0);
    }

    #[test]
    fn test_decode_stretches_to_target() {
        // Left half bright, right half dark, at a quarter of the target size.
        let gray = GrayImage::from_fn(2, 2, |x, _| if x == 0 { Luma([255]) } else { Luma([0]) });

        let intensity = MaskDecoder::new(8, 8).decode(&encode_gray(gray)).unwrap();
        assert_eq!(intensity.len(), 64);
        for y in 0..8 {
            assert_eq!(intensity[y * 8], 255, "left edge row {y}");
            assert_eq!(intensity[y * 8 + 7], 0, "right edge row {y}");
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = MaskDecoder::new(4, 4).decode(&EncodedMask::new(b"not a png".to_vec()));
        assert!(result.is_err());

        let result = MaskDecoder::new(4, 4).decode(&EncodedMask::new(Vec::new()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_decode_all_keeps_order_and_isolates_failures() {
        let good = encode_gray(GrayImage::from_pixel(3, 3, Luma([180])));
        let bad = EncodedMask::new(vec![0x89, b'P', b'N', b'G', 0, 0]);

        let results = MaskDecoder::new(3, 3)
            .decode_all(vec![good.clone(), bad, good])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &vec![180; 9]);
        assert!(matches!(
            results[1],
            Err(OverlayError::MaskDecode { index: 1, .. })
        ));
        assert!(results[2].is_ok());
    }
}
