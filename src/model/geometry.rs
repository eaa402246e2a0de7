//! Page-space geometry.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in page units.
///
/// The origin is the top-left corner of the page and `y` grows downward, so
/// `y0` is the top edge and `y1` the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BoundingBox {
    /// Create a box from its edges, reordering swapped coordinates.
    ///
    /// Non-finite input is kept as given so that degenerate geometry stays
    /// detectable.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let raw = Self { x0, y0, x1, y1 };
        if !raw.is_finite() {
            return raw;
        }
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Convert a box expressed in PDF user space (bottom-left origin).
    pub fn from_pdf_space(x0: f32, y0: f32, x1: f32, y1: f32, page_height: f32) -> Self {
        Self::new(x0, page_height - y1, x1, page_height - y0)
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Whether every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Length of the vertical overlap with another box (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BoundingBox) -> f32 {
        (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0)
    }

    /// Whether the box straddles the vertical line `x`.
    pub fn crosses_x(&self, x: f32) -> bool {
        self.x0 < x && self.x1 > x
    }
}
