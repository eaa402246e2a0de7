//! Document model types.
//!
//! These are plain immutable value records: runs and blocks produced by
//! layout segmentation, the offset map produced by compilation, entities and
//! their anchors, and the [`StructuredDocument`] that aggregates them.

mod block;
mod builder;
mod document;
mod entity;
mod geometry;
mod offset_map;
mod run;

pub use block::{Block, BlockId, BlockKind};
pub use builder::DocumentBuilder;
pub use document::{DocumentMetadata, PageReport, PageStatus, StructuredDocument};
pub use entity::{
    Anchor, AnchoredEntity, Entity, EntityKind, NormalizationWarning, NormalizedValue,
    PartialDate, Span,
};
pub use geometry::BoundingBox;
pub use offset_map::{OffsetMap, OffsetMapEntry, Provenance};
pub use run::{RunId, TextRun};
