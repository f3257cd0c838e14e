//! Rectangle annotation on fetched images.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::error::EnrichError;

/// Outline color drawn around the region of interest.
const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline stroke width in pixels.
const OUTLINE_STROKE: u32 = 3;

/// JPEG quality for the re-encoded image.
const JPEG_QUALITY: u8 = 95;

/// Draw a rectangle outline onto the image and re-encode it as JPEG.
///
/// The box is clamped against the decoded image dimensions before drawing.
/// Decode or encode failures surface as [`EnrichError::Image`]; callers
/// fall back to the original bytes.
pub fn draw_bounding_box(image_bytes: &[u8], bbox: BoundingBox) -> Result<Vec<u8>, EnrichError> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| EnrichError::Image(format!("decode failed: {}", e)))?;

    let mut canvas = decoded.to_rgb8();
    let (width, height) = canvas.dimensions();
    let rect = bbox.clamp_to(width, height);

    debug!(
        width = width,
        height = height,
        x1 = rect.x1,
        y1 = rect.y1,
        x2 = rect.x2,
        y2 = rect.y2,
        "Drawing rectangle"
    );

    draw_outline(&mut canvas, &rect);

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EnrichError::Image(format!("encode failed: {}", e)))?;

    Ok(buffer.into_inner())
}

fn draw_outline(canvas: &mut RgbImage, rect: &BoundingBox) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let x1 = (rect.x1.round().max(0.0) as u32).min(width - 1);
    let y1 = (rect.y1.round().max(0.0) as u32).min(height - 1);
    let x2 = (rect.x2.round().max(0.0) as u32).min(width - 1);
    let y2 = (rect.y2.round().max(0.0) as u32).min(height - 1);

    for t in 0..OUTLINE_STROKE {
        let top = (y1 + t).min(height - 1);
        let bottom = y2.saturating_sub(t);
        for x in x1..=x2 {
            canvas.put_pixel(x, top, OUTLINE_COLOR);
            canvas.put_pixel(x, bottom, OUTLINE_COLOR);
        }

        let left = (x1 + t).min(width - 1);
        let right = x2.saturating_sub(t);
        for y in y1..=y2 {
            canvas.put_pixel(left, y, OUTLINE_COLOR);
            canvas.put_pixel(right, y, OUTLINE_COLOR);
        }
    }
}
