//! Logical blocks produced by layout segmentation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{BoundingBox, TextRun};

/// Block identifier; equal to the block's reading-order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Position of the block in reading order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of logical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A regular paragraph
    Paragraph,
    /// A heading
    Heading,
    /// A bulleted or enumerated list item
    ListItem,
    /// A row of horizontally aligned cells
    TableRow,
    /// Unclassified content (including fallback-ordered pages)
    Other,
}

impl BlockKind {
    /// Whether the block is a heading.
    pub fn is_heading(self) -> bool {
        self == BlockKind::Heading
    }
}

/// A reading-order-contiguous group of runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Reading-order index
    pub id: BlockId,
    /// Block classification
    pub kind: BlockKind,
    /// Runs in reading order
    pub runs: Vec<TextRun>,
    /// Indices into `runs` where a new visual line begins (first entry is 0)
    pub line_starts: Vec<usize>,
}

impl Block {
    /// Create a block from runs laid out as visual lines.
    pub fn from_lines(id: BlockId, kind: BlockKind, lines: Vec<Vec<TextRun>>) -> Self {
        let mut runs = Vec::new();
        let mut line_starts = Vec::new();
        for line in lines.into_iter().filter(|l| !l.is_empty()) {
            line_starts.push(runs.len());
            runs.extend(line);
        }
        Self {
            id,
            kind,
            runs,
            line_starts,
        }
    }

    /// Iterate over visual lines as run slices.
    pub fn lines(&self) -> impl Iterator<Item = &[TextRun]> + '_ {
        self.line_starts.iter().enumerate().map(move |(i, &start)| {
            let end = self
                .line_starts
                .get(i + 1)
                .copied()
                .unwrap_or(self.runs.len());
            &self.runs[start..end]
        })
    }

    /// First and last page index covered by the block.
    pub fn page_span(&self) -> (u32, u32) {
        let first = self.runs.iter().map(|r| r.page).min().unwrap_or(0);
        let last = self.runs.iter().map(|r| r.page).max().unwrap_or(0);
        (first, last)
    }

    /// Union of the run boxes (runs of the first page only when the block spans pages).
    pub fn bbox(&self) -> Option<BoundingBox> {
        let (first, _) = self.page_span();
        self.runs
            .iter()
            .filter(|r| r.page == first)
            .map(|r| r.bbox)
            .reduce(|a, b| a.union(&b))
    }

    /// Raw text: runs joined by spaces, lines by newlines.
    pub fn text(&self) -> String {
        self.lines()
            .map(|line| {
                line.iter()
                    .map(|r| r.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the block holds no runs.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
