//! Layout segmentation: from raw runs to reading-ordered blocks.
//!
//! Each page is segmented independently:
//!
//! 1. table rows are pulled out of the run set,
//! 2. gutters are searched among the remaining flowing runs,
//! 3. elements crossing a gutter (full-width runs, wide table rows) cut the
//!    page into horizontal bands; each band is read column by column,
//! 4. each column (or full-width group) is grouped into lines and blocks.
//!
//! Pages are then merged in ascending order and numbered. Segmentation never
//! fails: pages with unusable geometry keep their runs in extraction order.

mod columns;
mod config;
mod flow;
mod stats;
mod table;

pub use columns::{detect_columns, Column};
pub use config::LayoutConfig;
pub use flow::BlockDraft;
pub use stats::FontStatistics;

use std::collections::BTreeMap;

use rayon::prelude::*;
use regex::Regex;

use crate::model::{Block, BlockId, BlockKind, TextRun};

use flow::{sort_reading, FlowGrouper, Item};

/// Segmentation result for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// Page index (0-based)
    pub page: u32,
    /// Blocks in reading order
    pub drafts: Vec<BlockDraft>,
    /// Set when geometry was unusable and extraction order was kept
    pub fallback: Option<String>,
}

impl PageLayout {
    /// Number of runs placed on the page.
    pub fn run_count(&self) -> usize {
        self.drafts.iter().map(BlockDraft::run_count).sum()
    }
}

/// Bullet glyphs and short enumerators at the start of a line.
pub(crate) fn list_marker_regex() -> Regex {
    Regex::new(r"^\s*(?:[•●▪◦▸►‣–]\s*\S|[-*]\s+\S|\(?(?:\d{1,3}|[a-z]|[ivxlc]{1,6})[.)]\s+\S)")
        .unwrap()
}

/// Groups runs into reading-ordered blocks.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: LayoutConfig,
    list_marker: Regex,
}

impl Segmenter {
    /// Create a segmenter.
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            list_marker: list_marker_regex(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Segment all runs of a document.
    ///
    /// Runs may come in any page order; pages are processed independently
    /// (in parallel when configured) and merged in ascending page order.
    pub fn segment(&self, runs: Vec<TextRun>) -> Vec<Block> {
        let mut by_page: BTreeMap<u32, Vec<TextRun>> = BTreeMap::new();
        for run in runs {
            by_page.entry(run.page).or_default().push(run);
        }
        let pages: Vec<(u32, Vec<TextRun>)> = by_page.into_iter().collect();

        let layouts: Vec<PageLayout> = if self.config.parallel {
            pages
                .into_par_iter()
                .map(|(page, runs)| self.segment_page(page, runs))
                .collect()
        } else {
            pages
                .into_iter()
                .map(|(page, runs)| self.segment_page(page, runs))
                .collect()
        };

        number_blocks(layouts)
    }

    /// Segment the runs of one page.
    pub fn segment_page(&self, page: u32, runs: Vec<TextRun>) -> PageLayout {
        if runs.is_empty() {
            return PageLayout {
                page,
                drafts: Vec::new(),
                fallback: None,
            };
        }

        if let Some(bad) = runs.iter().find(|r| !r.has_valid_geometry()) {
            let reason = format!("run {} has degenerate geometry", bad.id.0);
            log::warn!("Page {}: {}, keeping extraction order", page, reason);
            return fallback_layout(page, runs, reason);
        }

        let min_x = runs.iter().map(|r| r.bbox.x0).fold(f32::INFINITY, f32::min);
        let max_x = runs.iter().map(|r| r.bbox.x1).fold(f32::NEG_INFINITY, f32::max);
        if !columns::sliceable(max_x - min_x, self.config.slice_width) {
            let reason = format!("content width {} is out of range", max_x - min_x);
            log::warn!("Page {}: {}, keeping extraction order", page, reason);
            return fallback_layout(page, runs, reason);
        }

        let expected = runs.len();
        let layout = PageLayout {
            page,
            drafts: self.segment_geometric(runs.clone()),
            fallback: None,
        };
        if layout.run_count() != expected {
            let reason = format!(
                "segmentation placed {} of {} runs",
                layout.run_count(),
                expected
            );
            log::warn!("Page {}: {}, keeping extraction order", page, reason);
            return fallback_layout(page, runs, reason);
        }
        layout
    }

    fn segment_geometric(&self, runs: Vec<TextRun>) -> Vec<BlockDraft> {
        let body_size = FontStatistics::from_runs(&runs).modal_size();
        let min_x = runs.iter().map(|r| r.bbox.x0).fold(f32::INFINITY, f32::min);
        let max_x = runs.iter().map(|r| r.bbox.x1).fold(f32::NEG_INFINITY, f32::max);
        let content_width = max_x - min_x;

        let (table_rows, flowing) = table::detect_table_rows(runs, &self.config);

        let narrow: Vec<_> = flowing
            .iter()
            .filter(|r| r.bbox.width() < content_width * self.config.full_width_ratio)
            .map(|r| r.bbox)
            .collect();
        let columns = detect_columns(&narrow, min_x, max_x, &self.config);
        let gutters = columns::gutters(&columns);

        let mut items: Vec<Item> = flowing.into_iter().map(Item::Run).collect();
        items.extend(table_rows.into_iter().map(Item::Row));

        let grouper = FlowGrouper {
            config: &self.config,
            body_size,
            list_marker: &self.list_marker,
        };

        if columns.len() <= 1 {
            return grouper.group(items);
        }

        let mut drafts = Vec::new();
        for flow in split_into_flows(items, &columns, &gutters) {
            drafts.extend(grouper.group(flow));
        }
        drafts
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

/// Cut a multi-column page into reading flows.
///
/// Walking top to bottom, column items accumulate per column until an
/// element crossing a gutter appears; the band is then emitted column by
/// column, followed by the crossing elements as their own flow.
fn split_into_flows(mut items: Vec<Item>, columns: &[Column], gutters: &[f32]) -> Vec<Vec<Item>> {
    sort_reading(&mut items);

    let mut flows: Vec<Vec<Item>> = Vec::new();
    let mut band: Vec<Vec<Item>> = vec![Vec::new(); columns.len()];
    let mut spanning: Vec<Item> = Vec::new();

    for item in items {
        let bbox = item.bbox();
        let crosses = gutters
            .iter()
            .any(|&g| bbox.x0 < g - 1.0 && bbox.x1 > g + 1.0);
        if crosses {
            flush_band(&mut band, &mut flows);
            spanning.push(item);
        } else {
            if !spanning.is_empty() {
                flows.push(std::mem::take(&mut spanning));
            }
            band[columns::column_of(columns, &bbox)].push(item);
        }
    }
    flush_band(&mut band, &mut flows);
    if !spanning.is_empty() {
        flows.push(spanning);
    }
    flows
}

fn flush_band(band: &mut [Vec<Item>], flows: &mut Vec<Vec<Item>>) {
    for column in band.iter_mut() {
        if !column.is_empty() {
            flows.push(std::mem::take(column));
        }
    }
}

fn fallback_layout(page: u32, mut runs: Vec<TextRun>, reason: String) -> PageLayout {
    runs.sort_by_key(|r| r.id);
    PageLayout {
        page,
        drafts: vec![BlockDraft {
            kind: BlockKind::Other,
            lines: runs.into_iter().map(|r| vec![r]).collect(),
        }],
        fallback: Some(reason),
    }
}

/// Merge page layouts in ascending page order and assign reading-order ids.
pub fn number_blocks(mut layouts: Vec<PageLayout>) -> Vec<Block> {
    layouts.sort_by_key(|l| l.page);
    layouts
        .into_iter()
        .flat_map(|l| l.drafts)
        .enumerate()
        .map(|(i, draft)| Block::from_lines(BlockId(i as u32), draft.kind, draft.lines))
        .collect()
}
