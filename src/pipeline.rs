//! End-to-end extraction: source → layout → compile → annotate → anchor → document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::anchor::BackProjector;
use crate::compile::{compile, CompileOptions};
use crate::error::{Error, Result, Stage};
use crate::layout::{number_blocks, LayoutConfig, PageLayout, Segmenter};
use crate::model::{DocumentBuilder, PageReport, PageStatus, RunId, StructuredDocument, TextRun};
use crate::nlp::{Annotator, EntityConfig, NlpEngine};
use crate::source::{RunRecord, SourceError, TextSource};

/// Options for document extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Layout segmentation thresholds
    pub layout: LayoutConfig,

    /// Text compilation separators and normalization
    pub compile: CompileOptions,

    /// Entity kinds and label translation
    pub entities: EntityConfig,

    /// Read and segment pages in parallel
    pub parallel: bool,

    /// Upper bound on the engine call (`None` = wait indefinitely)
    pub engine_timeout: Option<Duration>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            compile: CompileOptions::default(),
            entities: EntityConfig::default(),
            parallel: true,
            engine_timeout: None,
        }
    }
}

impl ExtractOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set layout thresholds.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Set compile options.
    pub fn with_compile(mut self, compile: CompileOptions) -> Self {
        self.compile = compile;
        self
    }

    /// Set entity configuration.
    pub fn with_entities(mut self, entities: EntityConfig) -> Self {
        self.entities = entities;
        self
    }

    /// Enable or disable parallel page processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self.layout.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(self) -> Self {
        self.with_parallel(false)
    }

    /// Bound the engine call.
    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = Some(timeout);
        self
    }

    /// Validate all nested options.
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        self.compile.validate()?;
        self.entities.validate()?;
        if self.engine_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "engine_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared flag used to abort an extraction in progress.
///
/// Checked between pages and between stages; a cancelled extraction returns
/// [`Error::Cancelled`] and no partial document.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of reading one page from the source.
enum PageRead {
    Runs(Vec<RunRecord>),
    Failed(SourceError),
    Skipped,
}

/// Turns [`TextSource`]s into [`StructuredDocument`]s.
///
/// An extractor holds no per-document state and may be shared across
/// threads.
#[derive(Debug, Clone)]
pub struct Extractor {
    options: ExtractOptions,
    segmenter: Segmenter,
    annotator: Annotator,
}

impl Extractor {
    /// Create an extractor with default options.
    pub fn new(engine: Arc<dyn NlpEngine>) -> Self {
        let options = ExtractOptions::default();
        Self {
            segmenter: Segmenter::new(options.layout.clone()),
            annotator: Annotator::new(engine, options.entities.clone()),
            options,
        }
    }

    /// Create an extractor with custom options.
    pub fn with_options(engine: Arc<dyn NlpEngine>, options: ExtractOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            segmenter: Segmenter::new(options.layout.clone()),
            annotator: Annotator::new(engine, options.entities.clone())
                .with_timeout(options.engine_timeout),
            options,
        })
    }

    /// Options in use.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Name of the NLP engine.
    pub fn engine_name(&self) -> &str {
        self.annotator.engine_name()
    }

    /// Extract a structured document from `source`.
    pub fn extract(&self, source: &dyn TextSource) -> Result<StructuredDocument> {
        self.extract_with_cancel(source, &CancellationToken::new())
    }

    /// Extract a structured document, aborting when `token` is cancelled.
    pub fn extract_with_cancel(
        &self,
        source: &dyn TextSource,
        token: &CancellationToken,
    ) -> Result<StructuredDocument> {
        let document = source.source_id().to_string();
        let page_count = source.page_count();
        let checkpoint = |stage: Stage| -> Result<()> {
            if token.is_cancelled() {
                log::info!("Extraction of '{}' cancelled during {}", document, stage);
                Err(Error::Cancelled {
                    document: document.clone(),
                    stage,
                })
            } else {
                Ok(())
            }
        };

        checkpoint(Stage::Source)?;
        let reads = self.read_pages(source, token);
        checkpoint(Stage::Source)?;

        let (page_runs, mut reports) = ingest(reads)?;
        let run_count: usize = page_runs.iter().map(|(_, runs)| runs.len()).sum();

        checkpoint(Stage::Segmentation)?;
        let layouts = self.segment_pages(page_runs, token);
        checkpoint(Stage::Segmentation)?;
        for layout in &layouts {
            if let Some(reason) = &layout.fallback {
                if let Some(report) = reports.get_mut(layout.page as usize) {
                    report.status = PageStatus::FallbackOrder {
                        reason: reason.clone(),
                    };
                }
            }
        }
        let blocks = number_blocks(layouts);

        checkpoint(Stage::Compilation)?;
        let compiled = compile(&blocks, &self.options.compile);

        checkpoint(Stage::Annotation)?;
        let annotation = self
            .annotator
            .annotate(&compiled.text)
            .map_err(|source| {
                log::error!("NLP engine failed on '{}': {}", document, source);
                Error::NlpEngine {
                    document: document.clone(),
                    source,
                }
            })?;

        checkpoint(Stage::Projection)?;
        let projection = BackProjector::new(&compiled.text, &compiled.map).project(annotation.entities);

        checkpoint(Stage::Assembly)?;
        log::info!(
            "Extracted '{}': {} pages, {} blocks, {} entities ({} unanchored, {} warnings)",
            document,
            page_count,
            blocks.len(),
            projection.anchored.len(),
            projection.unanchored.len(),
            annotation.warnings.len()
        );

        DocumentBuilder::new(document.clone(), page_count)
            .engine(self.annotator.engine_name())
            .pages(reports)
            .blocks(blocks)
            .compiled(compiled.text, compiled.map)
            .entities(projection.anchored, projection.unanchored)
            .warnings(annotation.warnings)
            .expected_runs(run_count)
            .build()
    }

    fn read_pages(&self, source: &dyn TextSource, token: &CancellationToken) -> Vec<(u32, PageRead)> {
        let read = |page: u32| {
            if token.is_cancelled() {
                return (page, PageRead::Skipped);
            }
            match source.page_runs(page) {
                Ok(runs) => (page, PageRead::Runs(runs)),
                Err(err) => (page, PageRead::Failed(err)),
            }
        };
        let pages = 0..source.page_count();
        if self.options.parallel {
            pages.into_par_iter().map(read).collect()
        } else {
            pages.map(read).collect()
        }
    }

    fn segment_pages(&self, pages: Vec<(u32, Vec<TextRun>)>, token: &CancellationToken) -> Vec<PageLayout> {
        let segment = |(page, runs): (u32, Vec<TextRun>)| {
            if token.is_cancelled() {
                return PageLayout {
                    page,
                    drafts: Vec::new(),
                    fallback: None,
                };
            }
            self.segmenter.segment_page(page, runs)
        };
        if self.options.parallel {
            pages.into_par_iter().map(segment).collect()
        } else {
            pages.into_iter().map(segment).collect()
        }
    }
}

/// Assign run ids in page-major ingestion order and build page reports.
///
/// Failed pages become degraded reports; the document fails only when every
/// page failed.
fn ingest(reads: Vec<(u32, PageRead)>) -> Result<(Vec<(u32, Vec<TextRun>)>, Vec<PageReport>)> {
    let page_count = reads.len();
    let mut next_id = 0u32;
    let mut pages = Vec::with_capacity(page_count);
    let mut reports = Vec::with_capacity(page_count);
    let mut first_failure: Option<(u32, String)> = None;
    let mut failures = 0;

    for (page, read) in reads {
        match read {
            PageRead::Runs(records) => {
                let runs: Vec<TextRun> = records
                    .into_iter()
                    .filter(|r| !r.text.is_empty())
                    .map(|record| {
                        let run = record.into_run(RunId(next_id), page);
                        next_id += 1;
                        run
                    })
                    .collect();
                let status = if runs.is_empty() {
                    PageStatus::Empty
                } else {
                    PageStatus::Ok
                };
                reports.push(PageReport {
                    page,
                    run_count: runs.len(),
                    status,
                });
                pages.push((page, runs));
            }
            PageRead::Failed(err) => {
                log::warn!("Page {} could not be read: {}", page, err);
                failures += 1;
                first_failure.get_or_insert((page, err.message.clone()));
                reports.push(PageReport {
                    page,
                    run_count: 0,
                    status: PageStatus::Degraded { reason: err.message },
                });
            }
            PageRead::Skipped => {}
        }
    }

    if page_count > 0 && failures == page_count {
        if let Some((page, message)) = first_failure {
            return Err(Error::SourceRead { page, message });
        }
    }
    Ok((pages, reports))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::EngineError;
    use crate::model::{BoundingBox, EntityKind};
    use crate::nlp::{EngineRequest, PatternEngine, RawEntity};
    use crate::source::MemorySource;

    fn record(text: &str, x: f32, y: f32, size: f32) -> RunRecord {
        let width = text.chars().count() as f32 * size * 0.5;
        RunRecord::new(text, BoundingBox::new(x, y, x + width, y + size * 1.2), size, "Helvetica")
    }

    fn invoice() -> MemorySource {
        MemorySource::new("invoice").with_page(vec![
            record("Invoice", 72.0, 72.0, 18.0),
            record("Date:", 72.0, 110.0, 10.0),
            record("March 2023", 72.0, 124.0, 10.0),
        ])
    }

    fn extractor() -> Extractor {
        Extractor::new(Arc::new(PatternEngine::new()))
    }

    #[test]
    fn test_extract_options_builder() {
        let options = ExtractOptions::new()
            .with_entities(EntityConfig::all())
            .with_engine_timeout(Duration::from_secs(2))
            .sequential();
        assert!(!options.parallel);
        assert!(!options.layout.parallel);
        assert_eq!(options.engine_timeout, Some(Duration::from_secs(2)));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let options = ExtractOptions::new().with_engine_timeout(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));
        assert!(Extractor::with_options(Arc::new(PatternEngine::new()), options).is_err());
    }

    #[test]
    fn test_extract_invoice() {
        let doc = extractor().extract(&invoice()).unwrap();
        assert_eq!(doc.text(), "Invoice\n\nDate:\nMarch 2023");
        assert_eq!(doc.entities().len(), 1);
        assert_eq!(doc.entities()[0].entity.kind, EntityKind::Date);
        assert_eq!(doc.pages()[0].status, PageStatus::Ok);
        assert_eq!(doc.metadata().engine, "pattern");
    }

    #[test]
    fn test_failed_page_is_degraded() {
        let source = invoice().with_failed_page("corrupt content stream");
        let doc = extractor().extract(&source).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.degraded_pages(), vec![1]);
        assert_eq!(
            doc.pages()[1].status,
            PageStatus::Degraded {
                reason: "corrupt content stream".to_string()
            }
        );
    }

    #[test]
    fn test_all_pages_failing_is_an_error() {
        let source = MemorySource::new("broken")
            .with_failed_page("bad xref")
            .with_failed_page("bad xref");
        match extractor().extract(&source) {
            Err(Error::SourceRead { page, message }) => {
                assert_eq!(page, 0);
                assert_eq!(message, "bad xref");
            }
            other => panic!("unexpected result: {:?}", other.map(|d| d.text().to_string())),
        }
    }

    #[test]
    fn test_empty_source() {
        let doc = extractor().extract(&MemorySource::new("empty")).unwrap();
        assert_eq!(doc.page_count(), 0);
        assert!(doc.text().is_empty());
        assert!(doc.blocks().is_empty());
    }

    #[test]
    fn test_empty_page_report() {
        let source = invoice().with_page(vec![]);
        let doc = extractor().extract(&source).unwrap();
        assert_eq!(doc.pages()[1].status, PageStatus::Empty);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let err = extractor().extract_with_cancel(&invoice(), &token).unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                stage: Stage::Source,
                ..
            }
        ));
    }

    /// Source that cancels the extraction while reading page 1.
    struct CancellingSource {
        inner: MemorySource,
        token: CancellationToken,
        reads: AtomicUsize,
    }

    impl TextSource for CancellingSource {
        fn source_id(&self) -> &str {
            self.inner.source_id()
        }

        fn page_count(&self) -> u32 {
            self.inner.page_count()
        }

        fn page_runs(&self, page: u32) -> std::result::Result<Vec<RunRecord>, SourceError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if page == 1 {
                self.token.cancel();
            }
            self.inner.page_runs(page)
        }
    }

    /// Engine that cancels the extraction it is serving.
    struct CancellingEngine {
        token: CancellationToken,
    }

    impl NlpEngine for CancellingEngine {
        fn name(&self) -> &str {
            "cancelling"
        }

        fn annotate(&self, text: &str, _request: &EngineRequest) -> std::result::Result<Vec<RawEntity>, EngineError> {
            self.token.cancel();
            Ok(vec![RawEntity::new(0, text.len(), "DATE", text)])
        }
    }

    #[test]
    fn test_cancelled_while_reading_pages() {
        let token = CancellationToken::new();
        let mut inner = MemorySource::new("long");
        for i in 0..4 {
            inner = inner.with_page(vec![record(&format!("Page {}", i), 72.0, 72.0, 10.0)]);
        }
        let source = CancellingSource {
            inner,
            token: token.clone(),
            reads: AtomicUsize::new(0),
        };
        let extractor =
            Extractor::with_options(Arc::new(PatternEngine::new()), ExtractOptions::new().sequential()).unwrap();

        let result = extractor.extract_with_cancel(&source, &token);
        assert!(matches!(
            result,
            Err(Error::Cancelled {
                stage: Stage::Source,
                ..
            })
        ));
        // Pages after the cancelling read are skipped.
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancelled_during_annotation() {
        let token = CancellationToken::new();
        let extractor = Extractor::new(Arc::new(CancellingEngine { token: token.clone() }));
        let result = extractor.extract_with_cancel(&invoice(), &token);
        match result {
            Err(Error::Cancelled { document, stage }) => {
                assert_eq!(document, "invoice");
                assert_eq!(stage, Stage::Projection);
            }
            other => panic!("unexpected result: {:?}", other.map(|d| d.entities().len())),
        }
    }

    #[test]
    fn test_cancelled_segmentation_places_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let runs: Vec<TextRun> = invoice().pages[0]
            .runs
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, r)| r.into_run(RunId(i as u32), 0))
            .collect();
        let sequential =
            Extractor::with_options(Arc::new(PatternEngine::new()), ExtractOptions::new().sequential()).unwrap();
        for extractor in [extractor(), sequential] {
            let layouts = extractor.segment_pages(vec![(0, runs.clone()), (1, runs.clone())], &token);
            assert_eq!(layouts.len(), 2);
            assert!(layouts.iter().all(|l| l.drafts.is_empty() && l.fallback.is_none()));
        }
    }

    #[test]
    fn test_run_ids_are_page_major() {
        let source = invoice().with_page(vec![record("Second page", 72.0, 72.0, 10.0)]);
        let doc = extractor().extract(&source).unwrap();
        let last = doc.blocks().last().unwrap();
        assert_eq!(last.runs[0].id, RunId(3));
        assert_eq!(last.runs[0].page, 1);
    }
}
