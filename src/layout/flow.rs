//! Line building and block grouping inside one reading flow (a column, or a
//! group of full-width elements).

use std::cmp::Ordering;

use regex::Regex;

use crate::model::{BlockKind, BoundingBox, RunId, TextRun};

use super::LayoutConfig;

/// A block before reading-order numbering.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDraft {
    /// Block classification
    pub kind: BlockKind,
    /// Visual lines, each ordered left to right
    pub lines: Vec<Vec<TextRun>>,
}

impl BlockDraft {
    /// Number of runs in the draft.
    pub fn run_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }
}

/// A placeable element of a flow.
#[derive(Debug, Clone)]
pub(crate) enum Item {
    /// A single run
    Run(TextRun),
    /// A detected table row, runs ordered by x
    Row(Vec<TextRun>),
}

impl Item {
    pub(crate) fn bbox(&self) -> BoundingBox {
        match self {
            Item::Run(run) => run.bbox,
            Item::Row(runs) => runs
                .iter()
                .map(|r| r.bbox)
                .reduce(|a, b| a.union(&b))
                .unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0)),
        }
    }

    fn first_id(&self) -> RunId {
        match self {
            Item::Run(run) => run.id,
            Item::Row(runs) => runs.iter().map(|r| r.id).min().unwrap_or(RunId(0)),
        }
    }
}

/// Order items top to bottom; ties break by ascending x, then extraction order.
pub(crate) fn sort_reading(items: &mut [Item]) {
    items.sort_by(|a, b| {
        let (ba, bb) = (a.bbox(), b.bbox());
        ba.y0
            .partial_cmp(&bb.y0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| ba.x0.partial_cmp(&bb.x0).unwrap_or(Ordering::Equal))
            .then_with(|| a.first_id().cmp(&b.first_id()))
    });
}

/// A text line composed of runs sharing a vertical band.
#[derive(Debug, Clone)]
struct Line {
    runs: Vec<TextRun>,
    bbox: BoundingBox,
}

impl Line {
    fn new(run: TextRun) -> Self {
        Self {
            bbox: run.bbox,
            runs: vec![run],
        }
    }

    fn accepts(&self, run: &TextRun) -> bool {
        let min_height = self.bbox.height().min(run.bbox.height());
        if min_height <= 0.0 {
            return (run.bbox.y0 - self.bbox.y0).abs() < f32::EPSILON;
        }
        self.bbox.vertical_overlap(&run.bbox) >= min_height * 0.5
    }

    fn push(&mut self, run: TextRun) {
        self.bbox = self.bbox.union(&run.bbox);
        self.runs.push(run);
    }

    /// Dominant font size, weighted by text length.
    fn font_size(&self) -> f32 {
        let total_chars: usize = self.runs.iter().map(|r| r.text.chars().count()).sum();
        if total_chars == 0 {
            return self.runs[0].font_size;
        }
        let weighted: f32 = self
            .runs
            .iter()
            .map(|r| r.font_size * r.text.chars().count() as f32)
            .sum();
        weighted / total_chars as f32
    }

    fn text(&self) -> String {
        self.runs
            .iter()
            .map(|r| r.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

enum Unit {
    Line(Line),
    Row(Vec<TextRun>, BoundingBox),
}

impl Unit {
    fn top(&self) -> f32 {
        match self {
            Unit::Line(line) => line.bbox.y0,
            Unit::Row(_, bbox) => bbox.y0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    HeadingCandidate,
    ListItem,
    Paragraph,
}

struct Group {
    kind: GroupKind,
    lines: Vec<Line>,
}

/// Groups lines of one flow into blocks.
pub(crate) struct FlowGrouper<'a> {
    pub config: &'a LayoutConfig,
    pub body_size: f32,
    pub list_marker: &'a Regex,
}

impl FlowGrouper<'_> {
    /// Turn the items of one flow into block drafts in reading order.
    pub fn group(&self, mut items: Vec<Item>) -> Vec<BlockDraft> {
        sort_reading(&mut items);
        let units = build_units(items);

        let mut drafts = Vec::new();
        let mut current: Option<Group> = None;

        for unit in units {
            let next_top = unit.top();
            match unit {
                Unit::Row(runs, _) => {
                    if let Some(group) = current.take() {
                        drafts.push(self.finish(group, Some(next_top)));
                    }
                    drafts.push(BlockDraft {
                        kind: BlockKind::TableRow,
                        lines: vec![runs],
                    });
                }
                Unit::Line(line) => {
                    let heading_size = self.is_heading_size(&line);
                    let list_start = !heading_size && self.list_marker.is_match(&line.text());

                    if let Some(group) = current.as_mut() {
                        if self.continues(group, &line, heading_size, list_start) {
                            group.lines.push(line);
                            continue;
                        }
                    }
                    if let Some(group) = current.take() {
                        drafts.push(self.finish(group, Some(next_top)));
                    }
                    let kind = if heading_size {
                        GroupKind::HeadingCandidate
                    } else if list_start {
                        GroupKind::ListItem
                    } else {
                        GroupKind::Paragraph
                    };
                    current = Some(Group {
                        kind,
                        lines: vec![line],
                    });
                }
            }
        }

        if let Some(group) = current.take() {
            drafts.push(self.finish(group, None));
        }
        drafts
    }

    fn is_heading_size(&self, line: &Line) -> bool {
        line.font_size() >= self.body_size * self.config.heading_ratio
    }

    fn continues(&self, group: &Group, line: &Line, heading_size: bool, list_start: bool) -> bool {
        let Some(prev) = group.lines.last() else {
            return false;
        };
        let gap = line.bbox.y0 - prev.bbox.y1;
        let size = prev.font_size().max(line.font_size());
        let close = gap < size * self.config.paragraph_gap_ratio;
        let same_size = (prev.font_size() - line.font_size()).abs() <= self.config.font_size_tolerance;

        match group.kind {
            GroupKind::HeadingCandidate => heading_size && close && same_size,
            GroupKind::ListItem => {
                let bullet_x = group.lines[0].bbox.x0;
                !heading_size && !list_start && close && same_size && line.bbox.x0 > bullet_x + 1.0
            }
            GroupKind::Paragraph => !heading_size && !list_start && close && same_size,
        }
    }

    fn finish(&self, group: Group, next_top: Option<f32>) -> BlockDraft {
        let kind = match group.kind {
            GroupKind::HeadingCandidate => {
                let bottom = group.lines.last().map(|l| l.bbox.y1).unwrap_or(0.0);
                let gap_after = next_top.map(|top| top - bottom).unwrap_or(f32::INFINITY);
                if gap_after >= self.config.heading_min_gap {
                    BlockKind::Heading
                } else {
                    BlockKind::Paragraph
                }
            }
            GroupKind::ListItem => BlockKind::ListItem,
            GroupKind::Paragraph => BlockKind::Paragraph,
        };
        BlockDraft {
            kind,
            lines: group.lines.into_iter().map(|l| l.runs).collect(),
        }
    }
}

fn build_units(items: Vec<Item>) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    for item in items {
        let bbox = item.bbox();
        match item {
            Item::Row(runs) => units.push(Unit::Row(runs, bbox)),
            Item::Run(run) => match units.last_mut() {
                Some(Unit::Line(line)) if line.accepts(&run) => line.push(run),
                _ => units.push(Unit::Line(Line::new(run))),
            },
        }
    }

    for unit in &mut units {
        if let Unit::Line(line) = unit {
            line.runs.sort_by(|a, b| {
                a.bbox
                    .x0
                    .partial_cmp(&b.bbox.x0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
    }
    units
}
