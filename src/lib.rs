//! # pdfanchor
//!
//! Layout-aware entity extraction with page coordinates.
//!
//! This library turns the positioned text runs of a PDF page (text, box,
//! font) into reading-ordered blocks, compiles them into one string, runs a
//! named-entity engine over it and maps every entity back to the page boxes
//! it came from.
//!
//! ## Quick Start
//!
//! ```
//! use pdfanchor::{extract, BoundingBox, MemorySource, RunRecord};
//!
//! fn main() -> pdfanchor::Result<()> {
//!     let source = MemorySource::new("invoice").with_page(vec![
//!         RunRecord::new("Invoice", BoundingBox::new(72.0, 72.0, 135.0, 93.6), 18.0, "Helvetica-Bold"),
//!         RunRecord::new("Date:", BoundingBox::new(72.0, 110.0, 97.0, 122.0), 10.0, "Helvetica"),
//!         RunRecord::new("March 2023", BoundingBox::new(72.0, 124.0, 122.0, 136.0), 10.0, "Helvetica"),
//!     ]);
//!
//!     let doc = extract(&source)?;
//!     for anchored in doc.entities() {
//!         for (page, bbox) in anchored.page_boxes() {
//!             println!("{} '{}' on page {} at {:?}", anchored.entity.kind, anchored.entity.text, page, bbox);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Reading order**: multi-column pages, full-width sections, headings,
//!   list items and table rows
//! - **Offset map**: every character of the compiled text traced to a run
//!   or to an inserted separator
//! - **Pluggable NLP**: any [`NlpEngine`]; a rule-based [`PatternEngine`] ships
//!   with the crate
//! - **Normalization**: partial dates, monetary amounts, account numbers
//! - **Parallel processing**: uses Rayon for pages and document batches

pub mod anchor;
pub mod batch;
pub mod compile;
pub mod error;
pub mod export;
pub mod layout;
pub mod model;
pub mod nlp;
pub mod pipeline;
pub mod source;

// Re-export commonly used types
pub use anchor::{BackProjector, Projection};
pub use batch::{extract_batch, BatchReport, BatchSummary, DocumentOutcome};
pub use compile::{compile, CompileOptions, CompiledText, NormalizeMode};
pub use error::{EngineError, Error, Result, Stage};
pub use export::{training_example, JsonFormat, TrainingExample};
pub use layout::{LayoutConfig, Segmenter};
pub use model::{
    Anchor, AnchoredEntity, Block, BlockId, BlockKind, BoundingBox, Entity, EntityKind,
    NormalizationWarning, NormalizedValue, OffsetMap, OffsetMapEntry, PageReport, PageStatus,
    PartialDate, Provenance, RunId, Span, StructuredDocument, TextRun,
};
pub use nlp::{Annotator, EngineRequest, EntityConfig, LabelMap, NlpEngine, PatternEngine, RawEntity};
pub use pipeline::{CancellationToken, ExtractOptions, Extractor};
pub use source::{MemorySource, RunRecord, SourceError, TextSource};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Extract a document with the built-in [`PatternEngine`] and default options.
///
/// # Example
///
/// ```
/// use pdfanchor::{extract, MemorySource};
///
/// let doc = extract(&MemorySource::new("empty")).unwrap();
/// assert!(doc.text().is_empty());
/// ```
pub fn extract(source: &dyn TextSource) -> Result<StructuredDocument> {
    Extractor::new(Arc::new(PatternEngine::new())).extract(source)
}

/// Extract a document with a custom engine and options.
pub fn extract_with(
    source: &dyn TextSource,
    engine: Arc<dyn NlpEngine>,
    options: ExtractOptions,
) -> Result<StructuredDocument> {
    Extractor::with_options(engine, options)?.extract(source)
}

/// Load a JSON run file (see [`MemorySource`]) and extract it.
///
/// # Example
///
/// ```no_run
/// use pdfanchor::extract_file;
///
/// let doc = extract_file("statement.json").unwrap();
/// println!("{}", doc.text());
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<StructuredDocument> {
    let source = MemorySource::from_path(path)?;
    extract(&source)
}

/// Load a JSON run file and return the structured document as JSON.
pub fn to_json<P: AsRef<Path>>(path: P, format: JsonFormat) -> Result<String> {
    let doc = extract_file(path)?;
    export::to_json(&doc, format)
}

/// Builder for configuring and running extractions.
///
/// # Example
///
/// ```
/// use pdfanchor::{EntityKind, MemorySource, PdfAnchor};
/// use std::time::Duration;
///
/// let doc = PdfAnchor::new()
///     .with_kinds([EntityKind::Date, EntityKind::MonetaryAmount])
///     .with_engine_timeout(Duration::from_secs(10))
///     .sequential()
///     .extract(&MemorySource::new("empty"))?;
/// assert_eq!(doc.page_count(), 0);
/// # Ok::<(), pdfanchor::Error>(())
/// ```
pub struct PdfAnchor {
    engine: Arc<dyn NlpEngine>,
    options: ExtractOptions,
}

impl PdfAnchor {
    /// Create a builder using the [`PatternEngine`].
    pub fn new() -> Self {
        Self {
            engine: Arc::new(PatternEngine::new()),
            options: ExtractOptions::default(),
        }
    }

    /// Use a different NLP engine.
    pub fn with_engine(mut self, engine: Arc<dyn NlpEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace all options.
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Extract exactly these entity kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.options.entities = self.options.entities.with_kinds(kinds);
        self
    }

    /// Set day/month order for numeric dates.
    pub fn with_day_first(mut self, day_first: bool) -> Self {
        self.options.entities = self.options.entities.with_day_first(day_first);
        self
    }

    /// Set layout thresholds.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.options = self.options.with_layout(layout);
        self
    }

    /// Bound the engine call.
    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_engine_timeout(timeout);
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Build the configured [`Extractor`].
    pub fn build(self) -> Result<Extractor> {
        Extractor::with_options(self.engine, self.options)
    }

    /// Extract one document.
    pub fn extract(self, source: &dyn TextSource) -> Result<StructuredDocument> {
        self.build()?.extract(source)
    }

    /// Load a JSON run file and extract it.
    pub fn extract_file<P: AsRef<Path>>(self, path: P) -> Result<StructuredDocument> {
        let source = MemorySource::from_path(path)?;
        self.extract(&source)
    }
}

impl Default for PdfAnchor {
    fn default() -> Self {
        Self::new()
    }
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
