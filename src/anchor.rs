//! Coordinate back-projection: from compiled-text spans to page boxes.

use crate::model::{Anchor, AnchoredEntity, BlockId, Entity, OffsetMap, Provenance, Span};

/// Result of projecting the entities of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Entities with page anchors, ordered by span
    pub anchored: Vec<AnchoredEntity>,
    /// Entities covering no run text (only inserted separators)
    pub unanchored: Vec<Entity>,
}

/// A run-backed piece of a span inside one block.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    block: BlockId,
    span: Span,
    anchors: Vec<Anchor>,
}

/// Resolves spans of compiled text through its offset map.
#[derive(Debug, Clone, Copy)]
pub struct BackProjector<'a> {
    text: &'a str,
    map: &'a OffsetMap,
}

impl<'a> BackProjector<'a> {
    /// Create a projector over compiled `text` and its `map`.
    pub fn new(text: &'a str, map: &'a OffsetMap) -> Self {
        Self { text, map }
    }

    /// Anchors of every run contributing to `span`, in text order.
    pub fn anchors(&self, span: Span) -> Vec<Anchor> {
        self.segments(span)
            .into_iter()
            .flat_map(|s| s.anchors)
            .collect()
    }

    /// Project one entity.
    ///
    /// Returns `None` when the span covers no run text. An entity crossing
    /// block boundaries yields one split piece per block.
    pub fn project_entity(&self, entity: &Entity) -> Option<Vec<AnchoredEntity>> {
        let segments = self.segments(entity.span);
        match segments.len() {
            0 => None,
            1 => {
                let segment = segments.into_iter().next()?;
                // Separator characters at either end belong to no run of the block.
                let trimmed = segment.span != entity.span;
                Some(vec![AnchoredEntity {
                    entity: Entity {
                        span: segment.span,
                        text: self.text[segment.span.start..segment.span.end].to_string(),
                        ..entity.clone()
                    },
                    anchors: segment.anchors,
                    block: segment.block,
                    split: false,
                    original_span: trimmed.then_some(entity.span),
                }])
            }
            pieces => {
                log::debug!(
                    "{} entity at {} crosses block boundaries, split into {} pieces",
                    entity.kind,
                    entity.span,
                    pieces
                );
                Some(
                    segments
                        .into_iter()
                        .map(|segment| AnchoredEntity {
                            entity: Entity {
                                span: segment.span,
                                text: self.text[segment.span.start..segment.span.end].to_string(),
                                ..entity.clone()
                            },
                            anchors: segment.anchors,
                            block: segment.block,
                            split: true,
                            original_span: Some(entity.span),
                        })
                        .collect(),
                )
            }
        }
    }

    /// Project all entities of a document.
    pub fn project(&self, entities: Vec<Entity>) -> Projection {
        let mut projection = Projection::default();
        for entity in entities {
            match self.project_entity(&entity) {
                Some(pieces) => projection.anchored.extend(pieces),
                None => {
                    log::warn!(
                        "{} entity '{}' at {} covers no run text",
                        entity.kind,
                        entity.text.escape_debug(),
                        entity.span
                    );
                    projection.unanchored.push(entity);
                }
            }
        }
        // Split pieces may land after later-starting entities.
        projection.anchored.sort_by(|a, b| {
            let (sa, sb) = (a.entity.span, b.entity.span);
            sa.start
                .cmp(&sb.start)
                .then_with(|| sb.len().cmp(&sa.len()))
                .then_with(|| a.entity.kind.cmp(&b.entity.kind))
        });
        projection.anchored.dedup_by(|later, earlier| {
            later.entity.span == earlier.entity.span && later.entity.kind == earlier.entity.kind
        });
        projection
    }

    /// Cut `span` at block separators and trim each piece to run-backed text.
    fn segments(&self, span: Span) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut current: Option<Segment> = None;

        for entry in self.map.overlapping(span) {
            match entry.provenance {
                Provenance::BlockSeparator { .. } => {
                    segments.extend(current.take());
                }
                Provenance::IntraBlockSeparator { .. } => {}
                Provenance::Run {
                    block,
                    run,
                    page,
                    bbox,
                } => {
                    let clipped = Span::new(entry.start.max(span.start), entry.end.min(span.end));
                    let anchor = Anchor {
                        page,
                        bbox,
                        run,
                        block,
                    };
                    match current.as_mut() {
                        Some(segment) if segment.block == block => {
                            segment.span.end = clipped.end;
                            segment.anchors.push(anchor);
                        }
                        _ => {
                            segments.extend(current.take());
                            current = Some(Segment {
                                block,
                                span: clipped,
                                anchors: vec![anchor],
                            });
                        }
                    }
                }
            }
        }
        segments.extend(current);
        segments
    }
}

/// Project `entities` through `map` of compiled `text`.
pub fn project(text: &str, map: &OffsetMap, entities: Vec<Entity>) -> Projection {
    BackProjector::new(text, map).project(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile, CompileOptions, CompiledText};
    use crate::model::{Block, BlockKind, BoundingBox, EntityKind, NormalizedValue, PartialDate, RunId, TextRun};

    fn run(id: u32, page: u32, text: &str, y: f32) -> TextRun {
        TextRun {
            id: RunId(id),
            page,
            bbox: BoundingBox::new(72.0, y, 72.0 + text.len() as f32 * 5.0, y + 10.0),
            text: text.to_string(),
            font_size: 10.0,
            font_name: "Helvetica".to_string(),
            baseline: y + 10.0,
        }
    }

    fn entity(text: &str, compiled: &str, kind: EntityKind) -> Entity {
        let start = compiled.find(text).unwrap();
        Entity {
            span: Span::new(start, start + text.len()),
            kind,
            text: text.to_string(),
            normalized: None,
            confidence: None,
        }
    }

    /// "Statement date 5" / "March 2023 closing" on two pages.
    fn two_blocks() -> CompiledText {
        let blocks = vec![
            Block::from_lines(
                BlockId(0),
                BlockKind::Paragraph,
                vec![vec![run(0, 0, "Statement", 700.0), run(1, 0, "date 5", 700.0)]],
            ),
            Block::from_lines(
                BlockId(1),
                BlockKind::Paragraph,
                vec![vec![run(2, 1, "March 2023", 72.0)], vec![run(3, 1, "closing", 84.0)]],
            ),
        ];
        compile(&blocks, &CompileOptions::default())
    }

    #[test]
    fn test_entity_within_one_run() {
        let compiled = two_blocks();
        let date = entity("March 2023", &compiled.text, EntityKind::Date);
        let pieces = BackProjector::new(&compiled.text, &compiled.map)
            .project_entity(&date)
            .unwrap();
        assert_eq!(pieces.len(), 1);
        assert!(!pieces[0].split);
        assert_eq!(pieces[0].block, BlockId(1));
        assert_eq!(pieces[0].anchors.len(), 1);
        assert_eq!(pieces[0].anchors[0].run, RunId(2));
        assert_eq!(pieces[0].anchors[0].page, 1);
    }

    #[test]
    fn test_entity_across_runs_of_a_block() {
        let compiled = two_blocks();
        let org = entity("2023\nclosing", &compiled.text, EntityKind::Organization);
        let projection = project(&compiled.text, &compiled.map, vec![org]);
        assert_eq!(projection.anchored.len(), 1);
        let runs: Vec<_> = projection.anchored[0].anchors.iter().map(|a| a.run).collect();
        assert_eq!(runs, vec![RunId(2), RunId(3)]);
        assert_eq!(projection.anchored[0].page_boxes().len(), 1);
    }

    #[test]
    fn test_entity_across_block_boundary_is_split() {
        let compiled = two_blocks();
        assert_eq!(compiled.text, "Statement date 5\n\nMarch 2023\nclosing");
        let mut date = entity("5\n\nMarch 2023", &compiled.text, EntityKind::Date);
        date.normalized = Some(NormalizedValue::Date(PartialDate::ymd(2023, 3, 5)));

        let projection = project(&compiled.text, &compiled.map, vec![date.clone()]);
        assert!(projection.unanchored.is_empty());
        let pieces = &projection.anchored;
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.split));
        assert!(pieces.iter().all(|p| p.original_span == Some(date.span)));
        assert!(pieces.iter().all(|p| p.entity.normalized == date.normalized));
        assert_eq!(pieces[0].entity.text, "5");
        assert_eq!(pieces[0].block, BlockId(0));
        assert_eq!(pieces[0].pages(), vec![0]);
        assert_eq!(pieces[1].entity.text, "March 2023");
        assert_eq!(pieces[1].block, BlockId(1));
        assert_eq!(pieces[1].pages(), vec![1]);
    }

    #[test]
    fn test_separator_only_entity_is_unanchored() {
        let compiled = two_blocks();
        let start = compiled.text.find("\n\n").unwrap();
        let ghost = Entity {
            span: Span::new(start, start + 2),
            kind: EntityKind::Location,
            text: "\n\n".to_string(),
            normalized: None,
            confidence: None,
        };
        let projection = project(&compiled.text, &compiled.map, vec![ghost.clone()]);
        assert!(projection.anchored.is_empty());
        assert_eq!(projection.unanchored, vec![ghost]);
    }

    #[test]
    fn test_separator_edges_are_trimmed() {
        let compiled = two_blocks();
        let start = compiled.text.find("\n\nMarch").unwrap();
        let padded = Entity {
            span: Span::new(start, start + "\n\nMarch 2023\n".len()),
            kind: EntityKind::Date,
            text: "\n\nMarch 2023\n".to_string(),
            normalized: None,
            confidence: None,
        };
        let plain = entity("March 2023", &compiled.text, EntityKind::Date);

        let projection = project(&compiled.text, &compiled.map, vec![padded.clone(), plain.clone()]);
        assert_eq!(projection.anchored.len(), 1);
        let anchored = &projection.anchored[0];
        assert!(!anchored.split);
        assert_eq!(anchored.entity.span, plain.span);
        assert_eq!(anchored.entity.text, "March 2023");
        assert_eq!(anchored.original_span, Some(padded.span));
        assert!(anchored.anchors.iter().all(|a| a.block == anchored.block));
    }

    #[test]
    fn test_partial_run_overlap_is_anchored_to_the_run() {
        let compiled = two_blocks();
        let span = Span::new(15, 16);
        let anchors = BackProjector::new(&compiled.text, &compiled.map).anchors(span);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].run, RunId(1));
    }
}
