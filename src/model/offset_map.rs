//! Offset map between compiled text and source geometry.

use serde::Serialize;

use super::{BlockId, BoundingBox, RunId, Span};

/// Where a range of compiled characters came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Provenance {
    /// Characters contributed by a text run.
    Run {
        /// Owning block
        block: BlockId,
        /// Contributing run
        run: RunId,
        /// Page of the run
        page: u32,
        /// Box of the run
        bbox: BoundingBox,
    },
    /// A space or newline inserted between runs of one block.
    IntraBlockSeparator {
        /// Owning block
        block: BlockId,
    },
    /// A separator inserted between two blocks; it has no geometry.
    BlockSeparator {
        /// Block before the separator
        before: BlockId,
        /// Block after the separator
        after: BlockId,
    },
}

impl Provenance {
    /// Block owning the characters, if any.
    pub fn block(&self) -> Option<BlockId> {
        match self {
            Provenance::Run { block, .. } | Provenance::IntraBlockSeparator { block } => {
                Some(*block)
            }
            Provenance::BlockSeparator { .. } => None,
        }
    }

    /// Whether the range is a block boundary.
    pub fn is_block_separator(&self) -> bool {
        matches!(self, Provenance::BlockSeparator { .. })
    }
}

/// A compiled-text range and its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffsetMapEntry {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
    /// Origin of the characters
    pub provenance: Provenance,
}

impl OffsetMapEntry {
    /// The entry's range as a span.
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Immutable, sorted array of non-overlapping ranges with binary-search lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OffsetMap {
    entries: Vec<OffsetMapEntry>,
    #[serde(skip)]
    by_run: Vec<(RunId, Span)>,
}

impl OffsetMap {
    /// Build a map from entries sorted by start offset.
    pub fn from_entries(entries: Vec<OffsetMapEntry>) -> Self {
        let mut by_run: Vec<(RunId, Span)> = entries
            .iter()
            .filter_map(|e| match e.provenance {
                Provenance::Run { run, .. } => Some((run, e.span())),
                _ => None,
            })
            .collect();
        by_run.sort_by_key(|(run, _)| *run);
        Self { entries, by_run }
    }

    /// All entries in text order.
    pub fn entries(&self) -> &[OffsetMapEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total text length covered.
    pub fn text_len(&self) -> usize {
        self.entries.last().map(|e| e.end).unwrap_or(0)
    }

    /// Entry containing `offset`.
    pub fn entry_at(&self, offset: usize) -> Option<&OffsetMapEntry> {
        let idx = self.entries.partition_point(|e| e.end <= offset);
        self.entries.get(idx).filter(|e| e.start <= offset)
    }

    /// Entries overlapping `span`, in text order.
    pub fn overlapping(&self, span: Span) -> &[OffsetMapEntry] {
        if span.is_empty() {
            return &[];
        }
        let first = self.entries.partition_point(|e| e.end <= span.start);
        let last = self.entries.partition_point(|e| e.start < span.end);
        if first >= last {
            return &[];
        }
        &self.entries[first..last]
    }

    /// Compiled range contributed by `run` (absent when the run normalized to nothing).
    pub fn span_of_run(&self, run: RunId) -> Option<Span> {
        self.by_run
            .binary_search_by_key(&run, |(id, _)| *id)
            .ok()
            .map(|idx| self.by_run[idx].1)
    }

    /// Check that the entries exactly cover `[0, text_len)`.
    pub fn check_coverage(&self, text_len: usize) -> std::result::Result<(), String> {
        let mut cursor = 0;
        for entry in &self.entries {
            if entry.start != cursor {
                return Err(format!(
                    "offset map gap or overlap at {} (entry starts at {})",
                    cursor, entry.start
                ));
            }
            if entry.end <= entry.start {
                return Err(format!("empty offset map entry at {}", entry.start));
            }
            cursor = entry.end;
        }
        if cursor != text_len {
            return Err(format!(
                "offset map covers {} bytes but text has {}",
                cursor, text_len
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_entry(start: usize, end: usize, block: u32, run: u32) -> OffsetMapEntry {
        OffsetMapEntry {
            start,
            end,
            provenance: Provenance::Run {
                block: BlockId(block),
                run: RunId(run),
                page: 0,
                bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            },
        }
    }

    fn sample() -> OffsetMap {
        OffsetMap::from_entries(vec![
            run_entry(0, 5, 0, 0),
            OffsetMapEntry {
                start: 5,
                end: 6,
                provenance: Provenance::IntraBlockSeparator { block: BlockId(0) },
            },
            run_entry(6, 11, 0, 1),
            OffsetMapEntry {
                start: 11,
                end: 13,
                provenance: Provenance::BlockSeparator {
                    before: BlockId(0),
                    after: BlockId(1),
                },
            },
            run_entry(13, 20, 1, 2),
        ])
    }

    #[test]
    fn test_entry_at() {
        let map = sample();
        assert_eq!(map.entry_at(0).map(|e| e.start), Some(0));
        assert_eq!(map.entry_at(5).map(|e| e.start), Some(5));
        assert_eq!(map.entry_at(12).map(|e| e.start), Some(11));
        assert_eq!(map.entry_at(19).map(|e| e.start), Some(13));
        assert!(map.entry_at(20).is_none());
    }

    #[test]
    fn test_overlapping() {
        let map = sample();
        let hits = map.overlapping(Span::new(3, 8));
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].start, 0);
        assert_eq!(hits[2].start, 6);

        let hits = map.overlapping(Span::new(11, 13));
        assert_eq!(hits.len(), 1);
        assert!(hits[0].provenance.is_block_separator());

        assert!(map.overlapping(Span::new(4, 4)).is_empty());
    }

    #[test]
    fn test_span_of_run() {
        let map = sample();
        assert_eq!(map.span_of_run(RunId(1)), Some(Span::new(6, 11)));
        assert_eq!(map.span_of_run(RunId(9)), None);
    }

    #[test]
    fn test_coverage() {
        let map = sample();
        assert!(map.check_coverage(20).is_ok());
        assert!(map.check_coverage(21).is_err());

        let gapped = OffsetMap::from_entries(vec![run_entry(0, 5, 0, 0), run_entry(6, 8, 0, 1)]);
        assert!(gapped.check_coverage(8).is_err());
    }
}
