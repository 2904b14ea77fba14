//! Shared fixtures for integration tests

#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GrayImage, Luma};
use segment_overlay::{EncodedMask, OutputFormat, RasterImage};
use std::io::Cursor;

/// Encode a grayscale PNG whose pixel values come from `value(x, y)`
pub fn mask_png<F>(width: u32, height: u32, value: F) -> Vec<u8>
where
    F: Fn(u32, u32) -> u8,
{
    let gray = GrayImage::from_fn(width, height, |x, y| Luma([value(x, y)]));
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode mask png");
    bytes
}

/// Mask covering the half-open rectangle `[x0, x1) x [y0, y1)`
pub fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> EncodedMask {
    EncodedMask::new(mask_png(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            255
        } else {
            0
        }
    }))
}

pub fn solid_mask(width: u32, height: u32, value: u8) -> EncodedMask {
    EncodedMask::new(mask_png(width, height, |_, _| value))
}

pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Base image encoded as PNG
pub fn base_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    RasterImage::new_filled(width, height, rgba)
        .to_bytes(OutputFormat::Png, 100)
        .expect("encode base png")
}
