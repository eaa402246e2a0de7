//! Text runs: the atomic unit supplied by the geometric source.

use serde::{Deserialize, Serialize};

use super::BoundingBox;

/// Document-unique run identifier, assigned in ingestion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u32);

impl RunId {
    /// Position of the run in ingestion order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A positioned fragment of text on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Identifier (ingestion order)
    pub id: RunId,
    /// Page index (0-based)
    pub page: u32,
    /// Bounding box in page units
    pub bbox: BoundingBox,
    /// Text content (never empty)
    pub text: String,
    /// Font size in points
    pub font_size: f32,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
    /// Baseline y-coordinate
    pub baseline: f32,
}

impl TextRun {
    /// Whether the font name suggests a bold face.
    pub fn is_bold(&self) -> bool {
        let name = self.font_name.to_lowercase();
        name.contains("bold") || name.contains("black") || name.contains("heavy")
    }

    /// Whether the run carries usable geometry.
    pub fn has_valid_geometry(&self) -> bool {
        self.bbox.is_finite()
            && self.baseline.is_finite()
            && self.font_size.is_finite()
            && self.font_size > 0.0
    }
}
