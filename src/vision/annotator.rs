// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Box and label rendering
//!
//! Colors come from the Ultralytics 20-color palette, indexed by class, so a
//! class renders identically within and across requests. Line width and label
//! placement follow the Ultralytics `box_label` layout.

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::debug;

use super::detector::Detection;

/// Embedded label font
const FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Ultralytics default palette (hex FF3838, FF9D97, ...)
pub const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

/// Minimum stroke width in pixels
const MIN_LINE_WIDTH: u32 = 2;

/// Gap between label text and its background edge
const LABEL_PADDING: u32 = 3;

/// Display color for a class index
pub fn class_color(class_index: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_index % PALETTE.len()])
}

/// Text color with enough contrast against a label background
pub fn text_color_for(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luminance = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luminance > 160.0 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}

/// Ultralytics default line width for an image size
pub fn default_line_width(width: u32, height: u32) -> u32 {
    let lw = ((width + height) as f32 / 2.0 * 0.003).round() as u32;
    lw.max(MIN_LINE_WIDTH)
}

/// Draws detections onto images in place
#[derive(Clone)]
pub struct Annotator {
    font: FontArc,
    /// Fixed stroke width; `None` derives it from image size
    line_width: Option<u32>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("line_width", &self.line_width)
            .finish_non_exhaustive()
    }
}

impl Annotator {
    /// Create an annotator using the embedded font
    pub fn new() -> Result<Self, InvalidFont> {
        Ok(Self {
            font: FontArc::try_from_slice(FONT_BYTES)?,
            line_width: None,
        })
    }

    pub fn with_line_width(mut self, line_width: u32) -> Self {
        self.line_width = Some(line_width.max(1));
        self
    }

    /// Draw every detection, in order, onto `image`
    ///
    /// An empty detection list leaves the image untouched.
    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
        if detections.is_empty() || image.width() == 0 || image.height() == 0 {
            return;
        }

        let line_width = self
            .line_width
            .unwrap_or_else(|| default_line_width(image.width(), image.height()));

        for detection in detections {
            self.box_label(image, detection, line_width);
        }

        debug!(
            "Annotated {} detections (line width {})",
            detections.len(),
            line_width
        );
    }

    fn box_label(&self, image: &mut RgbImage, detection: &Detection, line_width: u32) {
        let color = class_color(detection.class_index);
        let max_x = image.width() as i32 - 1;
        let max_y = image.height() as i32 - 1;

        // Truncate to pixel grid, then order and clamp corners
        let (ax, bx) = (detection.bbox.x1 as i32, detection.bbox.x2 as i32);
        let (ay, by) = (detection.bbox.y1 as i32, detection.bbox.y2 as i32);
        let x1 = ax.min(bx).clamp(0, max_x);
        let x2 = ax.max(bx).clamp(0, max_x);
        let y1 = ay.min(by).clamp(0, max_y);
        let y2 = ay.max(by).clamp(0, max_y);

        // Thick outline as nested hollow rects, shrinking inward
        for i in 0..line_width as i32 {
            let w = x2 - x1 + 1 - 2 * i;
            let h = y2 - y1 + 1 - 2 * i;
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                image,
                Rect::at(x1 + i, y1 + i).of_size(w as u32, h as u32),
                color,
            );
        }

        if detection.label.is_empty() {
            return;
        }

        let scale = PxScale::from(label_font_size(line_width));
        let (text_w, text_h) = text_size(scale, &self.font, &detection.label);
        if text_w == 0 || text_h == 0 {
            return;
        }

        // Label bar sits above the box, or inside it when there is no room
        let bar_h = text_h + LABEL_PADDING;
        let outside = y1 - bar_h as i32 >= 0;
        let bar_y = if outside { y1 - bar_h as i32 } else { y1 };

        draw_filled_rect_mut(
            image,
            Rect::at(x1, bar_y).of_size(text_w + LABEL_PADDING, bar_h),
            color,
        );
        draw_text_mut(
            image,
            text_color_for(color),
            x1 + 1,
            bar_y + 1,
            scale,
            &self.font,
            &detection.label,
        );
    }
}

/// Label font height for a stroke width
fn label_font_size(line_width: u32) -> f32 {
    (line_width as f32 * 7.0).max(12.0)
}
