//! Layout segmentation thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Numeric thresholds driving layout segmentation.
///
/// Distances are in page units (points for PDF sources). Ratios are relative
/// to the font size of the lines being compared unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Heading when font size >= page modal size times this ratio
    pub heading_ratio: f32,

    /// Minimum vertical gap after a heading line
    pub heading_min_gap: f32,

    /// Lines closer than this ratio of their font size share a paragraph
    pub paragraph_gap_ratio: f32,

    /// Maximum font size difference inside a paragraph
    pub font_size_tolerance: f32,

    /// Width of the vertical slices used to find gutters
    pub slice_width: f32,

    /// Minimum empty width between columns
    pub min_gutter_width: f32,

    /// Minimum width of a detected column
    pub min_column_width: f32,

    /// Runs at least this fraction of the content width are full-width
    pub full_width_ratio: f32,

    /// Vertical tolerance (fraction of font size) for grouping table rows
    pub row_tolerance: f32,

    /// Minimum horizontal gap separating table cells
    pub min_cell_gap: f32,

    /// Minimum number of cells for a table row
    pub min_table_columns: usize,

    /// Minimum number of consecutive aligned rows forming a table
    pub min_table_rows: usize,

    /// Segment pages in parallel
    pub parallel: bool,
}

impl LayoutConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading font-size ratio.
    pub fn with_heading_ratio(mut self, ratio: f32) -> Self {
        self.heading_ratio = ratio;
        self
    }

    /// Set the minimum gap following a heading.
    pub fn with_heading_min_gap(mut self, gap: f32) -> Self {
        self.heading_min_gap = gap;
        self
    }

    /// Set the paragraph gap ratio.
    pub fn with_paragraph_gap_ratio(mut self, ratio: f32) -> Self {
        self.paragraph_gap_ratio = ratio;
        self
    }

    /// Set the minimum gutter width.
    pub fn with_min_gutter_width(mut self, width: f32) -> Self {
        self.min_gutter_width = width;
        self
    }

    /// Set the minimum column width.
    pub fn with_min_column_width(mut self, width: f32) -> Self {
        self.min_column_width = width;
        self
    }

    /// Set the full-width ratio.
    pub fn with_full_width_ratio(mut self, ratio: f32) -> Self {
        self.full_width_ratio = ratio;
        self
    }

    /// Set the minimum table shape.
    pub fn with_table_shape(mut self, min_columns: usize, min_rows: usize) -> Self {
        self.min_table_columns = min_columns;
        self.min_table_rows = min_rows;
        self
    }

    /// Disable parallel page segmentation.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("heading_ratio", self.heading_ratio),
            ("paragraph_gap_ratio", self.paragraph_gap_ratio),
            ("slice_width", self.slice_width),
            ("min_gutter_width", self.min_gutter_width),
            ("min_column_width", self.min_column_width),
            ("full_width_ratio", self.full_width_ratio),
            ("row_tolerance", self.row_tolerance),
            ("min_cell_gap", self.min_cell_gap),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "layout.{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !self.heading_min_gap.is_finite() || self.heading_min_gap < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "layout.heading_min_gap must be non-negative, got {}",
                self.heading_min_gap
            )));
        }
        if self.min_table_columns < 2 || self.min_table_rows < 1 {
            return Err(Error::InvalidConfig(
                "layout tables need at least 2 columns and 1 row".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            heading_ratio: 1.2,
            heading_min_gap: 2.0,
            paragraph_gap_ratio: 0.8,
            font_size_tolerance: 1.0,
            slice_width: 3.0,
            min_gutter_width: 12.0,
            min_column_width: 80.0,
            full_width_ratio: 0.8,
            row_tolerance: 0.4,
            min_cell_gap: 15.0,
            min_table_columns: 3,
            min_table_rows: 2,
            parallel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LayoutConfig::default();
        assert_eq!(config.heading_ratio, 1.2);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = LayoutConfig::new()
            .with_heading_ratio(1.5)
            .with_table_shape(4, 3)
            .sequential();
        assert_eq!(config.heading_ratio, 1.5);
        assert_eq!(config.min_table_columns, 4);
        assert_eq!(config.min_table_rows, 3);
        assert!(!config.parallel);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(LayoutConfig::new().with_heading_ratio(0.0).validate().is_err());
        assert!(LayoutConfig::new()
            .with_min_gutter_width(f32::NAN)
            .validate()
            .is_err());
        assert!(LayoutConfig::new().with_table_shape(1, 2).validate().is_err());
    }
}
