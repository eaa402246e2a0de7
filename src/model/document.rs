//! The structured document handed to callers.

use serde::Serialize;

use super::{
    AnchoredEntity, Block, BlockId, BlockKind, Entity, EntityKind, NormalizationWarning, OffsetMap,
};

/// Outcome of reading and segmenting one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    /// Runs were read and segmented geometrically
    Ok,
    /// The page carried no runs
    Empty,
    /// Geometry was unusable; runs kept in raw extraction order
    FallbackOrder {
        /// Why geometric ordering was abandoned
        reason: String,
    },
    /// The source failed to supply the page
    Degraded {
        /// Source-provided description
        reason: String,
    },
}

/// Per-page processing report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    /// Page index (0-based)
    pub page: u32,
    /// Number of runs read
    pub run_count: usize,
    /// Processing status
    pub status: PageStatus,
}

impl PageReport {
    /// Whether the page lost content or ordering quality.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.status,
            PageStatus::Degraded { .. } | PageStatus::FallbackOrder { .. }
        )
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    /// Caller-supplied source identifier
    pub source_id: String,
    /// Number of pages reported by the source
    pub page_count: u32,
    /// Name of the NLP engine that annotated the text
    pub engine: String,
}

/// Immutable result of processing one document.
///
/// Built only through [`DocumentBuilder`](super::DocumentBuilder), which
/// validates ordering and coverage invariants before handing it out.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredDocument {
    pub(super) metadata: DocumentMetadata,
    pub(super) pages: Vec<PageReport>,
    pub(super) blocks: Vec<Block>,
    pub(super) text: String,
    pub(super) offset_map: OffsetMap,
    pub(super) entities: Vec<AnchoredEntity>,
    pub(super) unanchored: Vec<Entity>,
    pub(super) warnings: Vec<NormalizationWarning>,
}

impl StructuredDocument {
    /// Document metadata.
    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Source identifier.
    pub fn source_id(&self) -> &str {
        &self.metadata.source_id
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.metadata.page_count
    }

    /// Per-page reports, ascending.
    pub fn pages(&self) -> &[PageReport] {
        &self.pages
    }

    /// Pages whose content or ordering was degraded.
    pub fn degraded_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| p.is_degraded())
            .map(|p| p.page)
            .collect()
    }

    /// Blocks in reading order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block by id.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index()).filter(|b| b.id == id)
    }

    /// Compiled text the entities refer to.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Offset map of the compiled text.
    pub fn offset_map(&self) -> &OffsetMap {
        &self.offset_map
    }

    /// Anchored entities, by ascending start offset.
    pub fn entities(&self) -> &[AnchoredEntity] {
        &self.entities
    }

    /// Anchored entities of one kind.
    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &AnchoredEntity> {
        self.entities.iter().filter(move |e| e.entity.kind == kind)
    }

    /// Entities whose span covers no run characters.
    pub fn unanchored(&self) -> &[Entity] {
        &self.unanchored
    }

    /// Normalization failures.
    pub fn warnings(&self) -> &[NormalizationWarning] {
        &self.warnings
    }

    /// Compiled text of one block.
    pub fn block_text(&self, id: BlockId) -> Option<&str> {
        let mut range: Option<(usize, usize)> = None;
        for entry in self.offset_map.entries() {
            if entry.provenance.block() == Some(id) {
                range = Some(match range {
                    Some((start, _)) => (start, entry.end),
                    None => (entry.start, entry.end),
                });
            }
        }
        range.map(|(start, end)| &self.text[start..end])
    }

    /// Compiled text under an entity span.
    pub fn entity_text(&self, entity: &AnchoredEntity) -> &str {
        &self.text[entity.entity.span.start..entity.entity.span.end]
    }

    /// Blocks preceding the first table row (the document header region).
    ///
    /// Returns every block when the document has no table rows.
    pub fn header_blocks(&self) -> &[Block] {
        let end = self
            .blocks
            .iter()
            .position(|b| b.kind == BlockKind::TableRow)
            .unwrap_or(self.blocks.len());
        &self.blocks[..end]
    }

    /// Compiled text of the header region.
    ///
    /// Ends at the last character of any header block, so header blocks that
    /// compiled to no text are skipped.
    pub fn header_text(&self) -> &str {
        // Block ids equal block positions, so header ids are `0..header_len`.
        let header_len = self.header_blocks().len();
        let end = self
            .offset_map
            .entries()
            .iter()
            .rev()
            .find(|e| e.provenance.block().is_some_and(|b| b.index() < header_len))
            .map(|e| e.end)
            .unwrap_or(0);
        &self.text[..end]
    }
}
