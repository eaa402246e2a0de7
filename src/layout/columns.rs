//! Column detection by vertical-slice occupancy.
//!
//! The content width of a page is cut into thin vertical slices; runs mark
//! the slices they cover. Runs of empty slices in the middle of the page are
//! gutter candidates.

use crate::model::BoundingBox;

use super::LayoutConfig;

/// Upper bound on the number of occupancy slices for one page.
pub const MAX_SLICES: usize = 100_000;

/// Whether a content width can be sliced at `slice_width`.
pub fn sliceable(width: f32, slice_width: f32) -> bool {
    (width / slice_width) < MAX_SLICES as f32
}

/// A detected column in the page layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Left boundary X coordinate
    pub left: f32,
    /// Right boundary X coordinate
    pub right: f32,
    /// Column index (0 = leftmost)
    pub index: usize,
}

impl Column {
    /// Check if an X coordinate falls within this column.
    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }
}

/// A run of empty slices.
#[derive(Debug, Clone, Copy)]
struct Gap {
    start: usize,
    len: usize,
}

/// Index of the column whose range holds the center of `bbox`.
pub fn column_of(columns: &[Column], bbox: &BoundingBox) -> usize {
    let center = bbox.center_x();
    columns
        .iter()
        .position(|c| c.contains(center))
        .unwrap_or_else(|| {
            if columns.first().map(|c| center < c.left).unwrap_or(true) {
                0
            } else {
                columns.len().saturating_sub(1)
            }
        })
}

/// Boundaries between adjacent columns.
pub fn gutters(columns: &[Column]) -> Vec<f32> {
    columns.iter().skip(1).map(|c| c.left).collect()
}

/// Detect columns from the boxes of the page's flowing text.
///
/// `boxes` should exclude full-width elements, which would otherwise bridge
/// the gutters. Always returns at least one column spanning `[min_x, max_x]`.
pub fn detect_columns(boxes: &[BoundingBox], min_x: f32, max_x: f32, config: &LayoutConfig) -> Vec<Column> {
    let single = || {
        vec![Column {
            left: min_x - 10.0,
            right: max_x + 10.0,
            index: 0,
        }]
    };

    let page_width = max_x - min_x;
    if boxes.len() < 4 || page_width < config.min_column_width * 2.0 + config.min_gutter_width {
        return single();
    }

    let slice_width = config.slice_width;
    if !sliceable(page_width, slice_width) {
        log::debug!("Content width {} too large to slice, treating as single column", page_width);
        return single();
    }
    let num_slices = ((page_width / slice_width) as usize) + 1;
    let mut slice_occupancy = vec![0usize; num_slices];

    for bbox in boxes {
        let start_slice = ((bbox.x0 - min_x) / slice_width).max(0.0) as usize;
        let end_slice = ((bbox.x1 - min_x) / slice_width).max(0.0) as usize;

        for slot in slice_occupancy
            .iter_mut()
            .take(end_slice.min(num_slices - 1) + 1)
            .skip(start_slice)
        {
            *slot += 1;
        }
    }

    // Gutters are only searched in the middle 70% of the page.
    let search_start = num_slices * 15 / 100;
    let search_end = num_slices * 85 / 100;
    let min_gap_slices = (config.min_gutter_width / slice_width).ceil() as usize;

    let mut gaps: Vec<Gap> = Vec::new();
    let mut current: Option<Gap> = None;
    for (i, &occupancy) in slice_occupancy
        .iter()
        .enumerate()
        .take(search_end)
        .skip(search_start)
    {
        if occupancy == 0 {
            match current.as_mut() {
                Some(gap) => gap.len += 1,
                None => current = Some(Gap { start: i, len: 1 }),
            }
        } else if let Some(gap) = current.take() {
            // A gap touching the search window edge may be a margin, not a gutter.
            if gap.len >= min_gap_slices && gap.start > search_start {
                gaps.push(gap);
            }
        }
    }

    if gaps.is_empty() {
        log::debug!("No gutter found, treating as single column");
        return single();
    }

    let center_of = |gap: &Gap| min_x + (gap.start as f32 + gap.len as f32 / 2.0) * slice_width;

    // Try every gutter first, then only the best one: widest, closest to center.
    let page_center = num_slices as f32 / 2.0;
    let best = gaps
        .iter()
        .copied()
        .max_by(|a, b| {
            a.len.cmp(&b.len).then_with(|| {
                let da = (a.start as f32 + a.len as f32 / 2.0 - page_center).abs();
                let db = (b.start as f32 + b.len as f32 / 2.0 - page_center).abs();
                db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
            })
        })
        .map(|gap| center_of(&gap));

    let mut candidates: Vec<Vec<f32>> = vec![gaps.iter().map(center_of).collect()];
    if gaps.len() > 1 {
        candidates.extend(best.map(|b| vec![b]));
    }

    for boundaries in candidates {
        let columns = build_columns(&boundaries, min_x, max_x);
        if columns_are_valid(&columns, boxes, config) {
            log::debug!(
                "Detected {} columns with gutters at {:?}",
                columns.len(),
                boundaries
            );
            return columns;
        }
    }

    log::debug!("Column split rejected, treating as single column");
    single()
}

fn build_columns(boundaries: &[f32], min_x: f32, max_x: f32) -> Vec<Column> {
    let mut edges = Vec::with_capacity(boundaries.len() + 2);
    edges.push(min_x - 10.0);
    edges.extend_from_slice(boundaries);
    edges.push(max_x + 10.0);

    edges
        .windows(2)
        .enumerate()
        .map(|(index, w)| Column {
            left: w[0],
            right: w[1],
            index,
        })
        .collect()
}

fn columns_are_valid(columns: &[Column], boxes: &[BoundingBox], config: &LayoutConfig) -> bool {
    // Each column should have at least 10% of boxes, and never fewer than two.
    let min_boxes = (boxes.len() / 10).max(2);
    columns.iter().all(|column| {
        // Outer columns carry a 10pt margin on their page-side edge.
        let mut width = column.right - column.left;
        if column.index == 0 {
            width -= 10.0;
        }
        if column.index + 1 == columns.len() {
            width -= 10.0;
        }
        let count = boxes
            .iter()
            .filter(|b| column_of(columns, b) == column.index)
            .count();
        width >= config.min_column_width && count >= min_boxes
    })
}
