// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for YOLOv8 detection

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;

/// Default square input size for YOLOv8 exports
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Gray fill used for letterbox padding
pub const LETTERBOX_FILL: u8 = 114;

/// Mapping between letterboxed model space and original image space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Resize ratio applied to the original image
    pub scale: f32,
    /// Horizontal padding (left) in model pixels
    pub pad_x: f32,
    /// Vertical padding (top) in model pixels
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point from model space back to original image space
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Preprocess an image for YOLOv8 detection
///
/// Steps:
/// 1. Resize preserving aspect ratio so the longer side equals `size`
/// 2. Center on a `size x size` canvas filled with gray (114)
/// 3. Scale pixels to [0, 1]
/// 4. Convert to NCHW tensor format [1, 3, size, size]
pub fn letterbox(image: &RgbImage, size: u32) -> (Array4<f32>, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();
    let scale = (size as f32 / orig_w as f32).min(size as f32 / orig_h as f32);

    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    if (new_w, new_h) == (orig_w, orig_h) {
        imageops::replace(&mut canvas, image, pad_x as i64, pad_y as i64);
    } else {
        let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
        imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);
    }

    let side = size as usize;
    let mut tensor = Array4::zeros((1, 3, side, side));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}
