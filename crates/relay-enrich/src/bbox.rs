//! Bounding-box annotation parsing and normalization.
//!
//! Annotations arrive as strings shaped like `BBOX (x1,y1,x2,y2)` inside a
//! record's `image_position` field. Anything that does not parse cleanly is
//! treated as "no annotation".

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Minimum extent enforced per axis after clamping.
const MIN_EXTENT: f32 = 10.0;

static BBOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)BBOX\s*\(([^)]+)\)").unwrap());

/// A rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Clamp into `[0, width] x [0, height]` and enforce the minimum extent.
    ///
    /// A clamped box with zero or negative extent on an axis is widened to
    /// `MIN_EXTENT` units on that axis.
    pub fn clamp_to(self, width: u32, height: u32) -> BoundingBox {
        let (width, height) = (width as f32, height as f32);

        let x1 = self.x1.clamp(0.0, width);
        let y1 = self.y1.clamp(0.0, height);
        let mut x2 = self.x2.clamp(0.0, width);
        let mut y2 = self.y2.clamp(0.0, height);

        if x2 <= x1 {
            x2 = x1 + MIN_EXTENT;
        }
        if y2 <= y1 {
            y2 = y1 + MIN_EXTENT;
        }

        BoundingBox { x1, y1, x2, y2 }
    }
}

/// Whether the annotation marker is present at all.
pub fn has_annotation(text: &str) -> bool {
    text.to_uppercase().contains("BBOX")
}

/// Parse a `BBOX (a,b,c,d)`-shaped string.
///
/// Returns `None` for malformed strings or wrong coordinate arity; callers
/// upload the original image unchanged in that case.
pub fn parse_bbox(text: &str) -> Option<BoundingBox> {
    let captures = match BBOX_RE.captures(text.trim()) {
        Some(captures) => captures,
        None => {
            warn!(text = %text, "Could not parse bounding-box string");
            return None;
        }
    };

    let coords: Vec<f32> = captures[1]
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;

    if coords.len() != 4 {
        warn!(
            expected = 4,
            got = coords.len(),
            text = %text,
            "Unexpected bounding-box coordinate count"
        );
        return None;
    }

    Some(BoundingBox {
        x1: coords[0],
        y1: coords[1],
        x2: coords[2],
        y2: coords[3],
    })
}
