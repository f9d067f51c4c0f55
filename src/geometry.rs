//! Bounding box encodings and the geometry shared by deduplication and export.
//!
//! Three encodings are used across the pipeline:
//! - [`CornerBox`]: `(x1, y1, x2, y2)`, as returned by detectors.
//! - [`CenterBox`]: `(x_center, y_center, width, height)` normalized to `[0, 1]`,
//!   the YOLO label format.
//! - [`PixelBox`]: `(x, y, width, height)` in pixels, the COCO `bbox` format.

use serde::{Deserialize, Serialize};

/// Added to the IoU denominator so degenerate boxes never divide by zero.
pub const IOU_EPSILON: f64 = 1e-6;

/// Rectangle in corner form. Always satisfies `x2 >= x1` and `y2 >= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CornerBox {
    /// Build a corner box from two opposite corners given in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Area of the overlap between two boxes, zero when they are disjoint.
    pub fn intersection(&self, other: &CornerBox) -> f64 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }
}

/// Rectangle in YOLO center-normalized form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl CenterBox {
    pub fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Corner form in the same normalized space, used for overlap tests.
    pub fn to_normalized_corners(&self) -> CornerBox {
        to_corners(self, 1.0, 1.0)
    }

    /// COCO-style `(x, y, width, height)` in pixels of a `img_w` x `img_h` image.
    pub fn to_pixel(&self, img_w: f64, img_h: f64) -> PixelBox {
        PixelBox {
            x: (self.x_center - self.width / 2.0) * img_w,
            y: (self.y_center - self.height / 2.0) * img_h,
            width: self.width * img_w,
            height: self.height * img_h,
        }
    }
}

/// Rectangle as top-left offset plus size, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// Convert a normalized center box to pixel corners of a `img_w` x `img_h` image.
pub fn to_corners(center: &CenterBox, img_w: f64, img_h: f64) -> CornerBox {
    let half_w = center.width / 2.0;
    let half_h = center.height / 2.0;
    CornerBox::new(
        (center.x_center - half_w) * img_w,
        (center.y_center - half_h) * img_h,
        (center.x_center + half_w) * img_w,
        (center.y_center + half_h) * img_h,
    )
}

/// Convert pixel corners to a normalized center box, clamping every component
/// to `[0, 1]` since detectors may report boxes past the image border.
pub fn to_center_normalized(corners: &CornerBox, img_w: f64, img_h: f64) -> CenterBox {
    let x_center = (corners.x1 + corners.x2) / 2.0 / img_w;
    let y_center = (corners.y1 + corners.y2) / 2.0 / img_h;
    let width = (corners.x2 - corners.x1) / img_w;
    let height = (corners.y2 - corners.y1) / img_h;

    CenterBox {
        x_center: x_center.clamp(0.0, 1.0),
        y_center: y_center.clamp(0.0, 1.0),
        width: width.clamp(0.0, 1.0),
        height: height.clamp(0.0, 1.0),
    }
}

/// Intersection over union of two corner boxes.
pub fn iou(a: &CornerBox, b: &CornerBox) -> f64 {
    let intersection = a.intersection(b);
    if intersection <= 0.0 {
        return 0.0;
    }
    intersection / (a.area() + b.area() - intersection + IOU_EPSILON)
}
