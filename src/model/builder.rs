//! Assembly and validation of [`StructuredDocument`].

use std::collections::HashSet;

use crate::error::{Error, Result};

use super::{
    AnchoredEntity, Block, DocumentMetadata, Entity, NormalizationWarning, OffsetMap, PageReport,
    Provenance, StructuredDocument,
};

/// Collects stage outputs and builds a validated [`StructuredDocument`].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    source_id: String,
    page_count: u32,
    engine: String,
    pages: Vec<PageReport>,
    blocks: Vec<Block>,
    text: String,
    offset_map: OffsetMap,
    entities: Vec<AnchoredEntity>,
    unanchored: Vec<Entity>,
    warnings: Vec<NormalizationWarning>,
    expected_runs: Option<usize>,
}

impl DocumentBuilder {
    /// Start a document for `source_id` with `page_count` pages.
    pub fn new(source_id: impl Into<String>, page_count: u32) -> Self {
        Self {
            source_id: source_id.into(),
            page_count,
            ..Default::default()
        }
    }

    /// Record the engine name.
    pub fn engine(mut self, name: impl Into<String>) -> Self {
        self.engine = name.into();
        self
    }

    /// Set the page reports.
    pub fn pages(mut self, pages: Vec<PageReport>) -> Self {
        self.pages = pages;
        self
    }

    /// Set the segmented blocks.
    pub fn blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    /// Set the compiled text and its offset map.
    pub fn compiled(mut self, text: String, offset_map: OffsetMap) -> Self {
        self.text = text;
        self.offset_map = offset_map;
        self
    }

    /// Set anchored and unanchored entities.
    pub fn entities(mut self, anchored: Vec<AnchoredEntity>, unanchored: Vec<Entity>) -> Self {
        self.entities = anchored;
        self.unanchored = unanchored;
        self
    }

    /// Set normalization warnings.
    pub fn warnings(mut self, warnings: Vec<NormalizationWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Require the blocks to hold exactly `count` runs.
    pub fn expected_runs(mut self, count: usize) -> Self {
        self.expected_runs = Some(count);
        self
    }

    /// Validate invariants and build the document.
    pub fn build(self) -> Result<StructuredDocument> {
        if let Err(reason) = self.validate() {
            log::error!(
                "Document '{}' failed validation: {}",
                self.source_id,
                reason
            );
            return Err(Error::StructureValidation {
                document: self.source_id,
                reason,
            });
        }

        Ok(StructuredDocument {
            metadata: DocumentMetadata {
                source_id: self.source_id,
                page_count: self.page_count,
                engine: self.engine,
            },
            pages: self.pages,
            blocks: self.blocks,
            text: self.text,
            offset_map: self.offset_map,
            entities: self.entities,
            unanchored: self.unanchored,
            warnings: self.warnings,
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        self.validate_blocks()?;
        self.offset_map.check_coverage(self.text.len())?;
        self.validate_map_provenance()?;
        self.validate_entities()
    }

    fn validate_blocks(&self) -> std::result::Result<(), String> {
        let mut seen_runs = HashSet::new();
        let mut last_page = 0;

        for (position, block) in self.blocks.iter().enumerate() {
            if block.id.index() != position {
                return Err(format!(
                    "block {} at position {}: reading-order indices not strictly increasing",
                    block.id, position
                ));
            }
            if block.is_empty() {
                return Err(format!("block {} has no runs", block.id));
            }
            let (first, last) = block.page_span();
            if first < last_page {
                return Err(format!(
                    "block {} starts on page {} after page {}",
                    block.id, first, last_page
                ));
            }
            if last >= self.page_count {
                return Err(format!(
                    "block {} references page {} of {}",
                    block.id, last, self.page_count
                ));
            }
            last_page = last;

            for run in &block.runs {
                if !seen_runs.insert(run.id) {
                    return Err(format!("run {} appears in more than one block", run.id.0));
                }
            }
        }
        if let Some(expected) = self.expected_runs {
            if seen_runs.len() != expected {
                return Err(format!(
                    "blocks hold {} runs but {} were read",
                    seen_runs.len(),
                    expected
                ));
            }
        }
        Ok(())
    }

    fn validate_map_provenance(&self) -> std::result::Result<(), String> {
        for entry in self.offset_map.entries() {
            if let Provenance::Run { block, run, .. } = entry.provenance {
                let owner = self
                    .blocks
                    .get(block.index())
                    .ok_or_else(|| format!("offset map references unknown block {}", block))?;
                if !owner.runs.iter().any(|r| r.id == run) {
                    return Err(format!(
                        "offset map attributes run {} to block {} which does not hold it",
                        run.0, block
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_entities(&self) -> std::result::Result<(), String> {
        let len = self.text.len();
        for anchored in &self.entities {
            let span = anchored.entity.span;
            if span.end > len || span.is_empty() {
                return Err(format!("entity span {} outside text of length {}", span, len));
            }
            if anchored.anchors.is_empty() {
                return Err(format!("anchored entity at {} has no anchors", span));
            }
            for anchor in &anchored.anchors {
                if anchor.page >= self.page_count {
                    return Err(format!(
                        "entity at {} anchored on page {} of {}",
                        span, anchor.page, self.page_count
                    ));
                }
            }
        }
        for entity in &self.unanchored {
            if entity.span.end > len {
                return Err(format!(
                    "unanchored entity span {} outside text of length {}",
                    entity.span, len
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Anchor, BlockId, BlockKind, BoundingBox, EntityKind, OffsetMapEntry, PageStatus, RunId,
        Span, TextRun,
    };

    fn run(id: u32, page: u32, text: &str) -> TextRun {
        TextRun {
            id: RunId(id),
            page,
            bbox: BoundingBox::new(10.0, 10.0, 60.0, 20.0),
            text: text.to_string(),
            font_size: 10.0,
            font_name: "Helvetica".to_string(),
            baseline: 20.0,
        }
    }

    fn block(id: u32, runs: Vec<TextRun>) -> Block {
        Block::from_lines(BlockId(id), BlockKind::Paragraph, vec![runs])
    }

    fn map_for(blocks: &[Block]) -> (String, OffsetMap) {
        let mut text = String::new();
        let mut entries = Vec::new();
        let mut previous: Option<BlockId> = None;
        // Blocks without text are skipped, as compilation does.
        for b in blocks.iter().filter(|b| b.runs.iter().any(|r| !r.text.is_empty())) {
            if let Some(before) = previous {
                let start = text.len();
                text.push_str("\n\n");
                entries.push(OffsetMapEntry {
                    start,
                    end: text.len(),
                    provenance: Provenance::BlockSeparator { before, after: b.id },
                });
            }
            previous = Some(b.id);
            for r in b.runs.iter().filter(|r| !r.text.is_empty()) {
                let start = text.len();
                text.push_str(&r.text);
                entries.push(OffsetMapEntry {
                    start,
                    end: text.len(),
                    provenance: Provenance::Run {
                        block: b.id,
                        run: r.id,
                        page: r.page,
                        bbox: r.bbox,
                    },
                });
            }
        }
        (text, OffsetMap::from_entries(entries))
    }

    fn anchored(span: Span, page: u32) -> AnchoredEntity {
        AnchoredEntity {
            entity: Entity {
                span,
                kind: EntityKind::Date,
                text: "x".to_string(),
                normalized: None,
                confidence: None,
            },
            anchors: vec![Anchor {
                page,
                bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                run: RunId(0),
                block: BlockId(0),
            }],
            block: BlockId(0),
            split: false,
            original_span: None,
        }
    }

    #[test]
    fn test_build_valid_document() {
        let blocks = vec![block(0, vec![run(0, 0, "Invoice")]), block(1, vec![run(1, 1, "Total")])];
        let (text, map) = map_for(&blocks);
        let doc = DocumentBuilder::new("doc-1", 2)
            .engine("pattern")
            .pages(vec![PageReport {
                page: 0,
                run_count: 1,
                status: PageStatus::Ok,
            }])
            .blocks(blocks)
            .compiled(text, map)
            .entities(vec![anchored(Span::new(0, 7), 0)], vec![])
            .build()
            .unwrap();

        assert_eq!(doc.source_id(), "doc-1");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.text(), "Invoice\n\nTotal");
        assert_eq!(doc.block_text(BlockId(1)), Some("Total"));
        assert_eq!(doc.entities().len(), 1);
        assert_eq!(doc.metadata().engine, "pattern");
    }

    #[test]
    fn test_rejects_non_increasing_block_ids() {
        let blocks = vec![block(1, vec![run(0, 0, "a")]), block(0, vec![run(1, 0, "b")])];
        let (text, map) = map_for(&blocks);
        let err = DocumentBuilder::new("doc", 1)
            .blocks(blocks)
            .compiled(text, map)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::StructureValidation { .. }));
    }

    #[test]
    fn test_rejects_anchor_outside_page_count() {
        let blocks = vec![block(0, vec![run(0, 0, "March 2023")])];
        let (text, map) = map_for(&blocks);
        let err = DocumentBuilder::new("doc", 1)
            .blocks(blocks)
            .compiled(text, map)
            .entities(vec![anchored(Span::new(0, 10), 4)], vec![])
            .build()
            .unwrap_err();
        match err {
            Error::StructureValidation { document, reason } => {
                assert_eq!(document, "doc");
                assert!(reason.contains("page 4"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_duplicate_runs() {
        let blocks = vec![block(0, vec![run(0, 0, "a")]), block(1, vec![run(0, 0, "a")])];
        let (text, map) = map_for(&blocks);
        let result = DocumentBuilder::new("doc", 1)
            .blocks(blocks)
            .compiled(text, map)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_uncovered_text() {
        let blocks = vec![block(0, vec![run(0, 0, "abc")])];
        let (mut text, map) = map_for(&blocks);
        text.push('!');
        let result = DocumentBuilder::new("doc", 1)
            .blocks(blocks)
            .compiled(text, map)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_header_blocks_stop_at_table_row() {
        let mut rows = vec![
            block(0, vec![run(0, 0, "Statement")]),
            block(1, vec![run(1, 0, "Account 1234")]),
            block(2, vec![run(2, 0, "01/02/2023")]),
        ];
        rows[2].kind = BlockKind::TableRow;
        let (text, map) = map_for(&rows);
        let doc = DocumentBuilder::new("doc", 1)
            .blocks(rows)
            .compiled(text, map)
            .build()
            .unwrap();
        assert_eq!(doc.header_blocks().len(), 2);
        assert_eq!(doc.header_text(), "Statement\n\nAccount 1234");
    }

    #[test]
    fn test_header_text_skips_textless_last_block() {
        let mut rows = vec![
            block(0, vec![run(0, 0, "Statement")]),
            block(1, vec![run(1, 0, "")]),
            block(2, vec![run(2, 0, "01/02/2023")]),
        ];
        rows[2].kind = BlockKind::TableRow;
        let (text, map) = map_for(&rows);
        assert_eq!(text, "Statement\n\n01/02/2023");
        let doc = DocumentBuilder::new("doc", 1)
            .blocks(rows)
            .compiled(text, map)
            .build()
            .unwrap();
        assert_eq!(doc.header_blocks().len(), 2);
        assert_eq!(doc.header_text(), "Statement");
    }

    #[test]
    fn test_rejects_lost_runs() {
        let blocks = vec![block(0, vec![run(0, 0, "a")])];
        let (text, map) = map_for(&blocks);
        let result = DocumentBuilder::new("doc", 1)
            .blocks(blocks)
            .compiled(text, map)
            .expected_runs(2)
            .build();
        assert!(matches!(result, Err(Error::StructureValidation { .. })));
    }
}
