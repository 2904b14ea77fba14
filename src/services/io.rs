//! Image I/O operations service
//!
//! This module separates file I/O operations from the compositing engine,
//! keeping the engine itself free of filesystem access.

use crate::{
    config::OutputFormat,
    error::{OverlayError, Result},
    types::RasterImage,
};
use image::DynamicImage;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Tries extension-based format detection first and falls back to
    /// sniffing the content.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use segment_overlay::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(OverlayError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    OverlayError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    let extension = path_ref
                        .extension()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");

                    OverlayError::processing_stage_error(
                        "image loading",
                        &format!(
                            "Failed to load image with both extension-based ({}) and content-based detection. Extension error: {}. Content error: {}",
                            extension, e, content_err
                        ),
                        Some(&format!("path: {}, size: {} bytes", path_ref.display(), data.len())),
                    )
                })
            },
        }
    }

    /// Load a base image from a file path as an RGBA raster
    pub fn load_raster<P: AsRef<Path>>(path: P) -> Result<RasterImage> {
        Ok(RasterImage::from_dynamic(&Self::load_image(path)?))
    }

    /// Load an image from bytes
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| {
            OverlayError::processing(format!("Failed to decode image from bytes: {}", e))
        })
    }

    /// Load an image from an async reader
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
    ) -> Result<DynamicImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            OverlayError::processing(format!("Failed to read from stream: {}", e))
        })?;

        Self::load_from_bytes(&buffer)
    }

    /// Save a raster to a file, creating the parent directory if needed
    ///
    /// # Examples
    /// ```rust,no_run
    /// use segment_overlay::{services::ImageIOService, OutputFormat, RasterImage};
    ///
    /// let image = RasterImage::new_filled(100, 100, [0, 0, 0, 255]);
    /// ImageIOService::save_raster(&image, "output.png", OutputFormat::Png, 90)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save_raster<P: AsRef<Path>>(
        image: &RasterImage,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                OverlayError::file_io_error("create output directory", parent, &e)
            })?;
        }

        image.save(path_ref, format, quality).map_err(|e| match e {
            OverlayError::Io(_) => e,
            other => OverlayError::processing_stage_error(
                "image save",
                &other.to_string(),
                Some(&format!("format: {:?}, path: {}", format, path_ref.display())),
            ),
        })
    }

    /// Encode a raster and write it to an async writer
    ///
    /// Returns the number of bytes written.
    pub async fn save_to_writer<W: tokio::io::AsyncWrite + Unpin>(
        image: &RasterImage,
        mut writer: W,
        format: OutputFormat,
        quality: u8,
    ) -> Result<u64> {
        use tokio::io::AsyncWriteExt;

        let bytes = image.to_bytes(format, quality)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(bytes.len() as u64)
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "tiff" | "tif"
                )
            })
    }
}
