// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image decode/encode helpers for the detection pipeline

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, Limits, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Maximum image size (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum accepted width or height, checked from the header before decoding
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Custom error types for image processing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Image dimensions exceed {0}px or the decoder memory limit")]
    DimensionsTooLarge(u32),

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Decode raw upload bytes into a 3-channel RGB image
///
/// Alpha channels are dropped and grayscale is expanded, so every caller sees
/// the same channel layout regardless of the source format.
///
/// # Arguments
/// * `bytes` - Raw image bytes
/// * `max_bytes` - Upper bound on accepted input size
/// * `max_dimension` - Upper bound on declared width and height
///
/// # Returns
/// * `Ok((RgbImage, ImageInfo))` - The decoded image and metadata
/// * `Err(ImageError)` - If decoding fails
pub fn decode_rgb_image(
    bytes: &[u8],
    max_bytes: usize,
    max_dimension: u32,
) -> Result<(RgbImage, ImageInfo), ImageError> {
    // Validate size
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), max_bytes));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    // Detect format from magic bytes
    let format = detect_format(bytes)?;

    // Header dimensions are checked before any pixel buffer is allocated
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    reader.limits(limits);
    let img = reader.decode().map_err(|e| match e {
        image::ImageError::Limits(_) => ImageError::DimensionsTooLarge(max_dimension),
        other => ImageError::DecodeFailed(other.to_string()),
    })?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::DecodeFailed("image has zero area".to_string()));
    }

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img.to_rgb8(), info))
}

/// Encode an RGB image as lossless PNG
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::with_capacity(image.as_raw().len() / 2);
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;

    Ok(buffer)
}

/// Detect image format from magic bytes
///
/// # Arguments
/// * `bytes` - Raw image data
///
/// # Returns
/// * `Ok(ImageFormat)` - Detected format
/// * `Err(ImageError::UnsupportedFormat)` - If format cannot be detected
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}
