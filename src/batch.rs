//! Parallel processing of many documents.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Result, Stage};
use crate::model::StructuredDocument;
use crate::pipeline::{CancellationToken, Extractor};
use crate::source::TextSource;

/// Result of processing one document in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    /// Source identifier
    pub source_id: String,
    /// The document, when extraction succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<StructuredDocument>,
    /// Error message, when extraction failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stage that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl DocumentOutcome {
    /// Build an outcome from an extraction result.
    pub fn from_result(source_id: impl Into<String>, result: Result<StructuredDocument>) -> Self {
        let source_id = source_id.into();
        match result {
            Ok(document) => Self {
                source_id,
                document: Some(document),
                error: None,
                stage: None,
            },
            Err(err) => Self {
                source_id,
                document: None,
                stage: err.stage(),
                error: Some(err.to_string()),
            },
        }
    }

    /// An outcome for a source that could not even be opened.
    pub fn failed(source_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            document: None,
            error: Some(error.into()),
            stage: Some(Stage::Source),
        }
    }

    /// Whether extraction succeeded.
    pub fn is_success(&self) -> bool {
        self.document.is_some()
    }

    /// Number of anchored entities (zero on failure).
    pub fn entity_count(&self) -> usize {
        self.document.as_ref().map(|d| d.entities().len()).unwrap_or(0)
    }
}

/// Aggregate counts over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Documents attempted
    pub total_documents: usize,
    /// Documents extracted
    pub successful: usize,
    /// Documents that failed
    pub failed: usize,
    /// Anchored entities across successful documents
    pub total_entities: usize,
}

impl BatchSummary {
    /// Summarize a list of outcomes.
    pub fn from_outcomes(outcomes: &[DocumentOutcome]) -> Self {
        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            total_documents: outcomes.len(),
            successful,
            failed: outcomes.len() - successful,
            total_entities: outcomes.iter().map(DocumentOutcome::entity_count).sum(),
        }
    }
}

/// Outcomes of a batch, in input order, with their summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// One outcome per source, in input order
    pub outcomes: Vec<DocumentOutcome>,
    /// Aggregate counts
    pub summary: BatchSummary,
    /// Wall-clock processing time
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BatchReport {
    /// Assemble a report from outcomes.
    pub fn from_outcomes(outcomes: Vec<DocumentOutcome>, elapsed: Duration) -> Self {
        let summary = BatchSummary::from_outcomes(&outcomes);
        Self {
            outcomes,
            summary,
            elapsed,
        }
    }

    /// Successfully extracted documents.
    pub fn documents(&self) -> impl Iterator<Item = &StructuredDocument> {
        self.outcomes.iter().filter_map(|o| o.document.as_ref())
    }

    /// Failed outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Extract every source in parallel.
///
/// A failing document never affects the others; its error is recorded on
/// its outcome.
pub fn extract_batch<S: TextSource>(extractor: &Extractor, sources: &[S]) -> BatchReport {
    extract_batch_with(extractor, sources, &CancellationToken::new(), |_| {})
}

/// Extract every source in parallel, reporting each finished outcome to
/// `on_done` and honoring `token`.
pub fn extract_batch_with<S, F>(
    extractor: &Extractor,
    sources: &[S],
    token: &CancellationToken,
    on_done: F,
) -> BatchReport
where
    S: TextSource,
    F: Fn(&DocumentOutcome) + Sync,
{
    let start = Instant::now();
    log::info!("Processing batch of {} documents", sources.len());

    let outcomes: Vec<DocumentOutcome> = sources
        .par_iter()
        .map(|source| {
            let result = extractor.extract_with_cancel(source, token);
            if let Err(err) = &result {
                log::warn!("Document '{}' failed: {}", source.source_id(), err);
            }
            let outcome = DocumentOutcome::from_result(source.source_id(), result);
            on_done(&outcome);
            outcome
        })
        .collect();

    let report = BatchReport::from_outcomes(outcomes, start.elapsed());
    log::info!(
        "Batch finished in {:?}: {} successful, {} failed, {} entities",
        report.elapsed,
        report.summary.successful,
        report.summary.failed,
        report.summary.total_entities
    );
    report
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::model::BoundingBox;
    use crate::nlp::PatternEngine;
    use crate::source::{MemorySource, RunRecord};

    fn source(id: &str, text: &str) -> MemorySource {
        MemorySource::new(id).with_page(vec![RunRecord::new(
            text,
            BoundingBox::new(72.0, 72.0, 300.0, 84.0),
            10.0,
            "Helvetica",
        )])
    }

    #[test]
    fn test_batch_summary() {
        let sources = vec![
            source("a", "Paid on 2023-03-05"),
            MemorySource::new("b").with_failed_page("unreadable"),
            source("c", "Opened March 2023, closed 01/04/2023"),
        ];
        let extractor = Extractor::new(Arc::new(PatternEngine::new()));
        let report = extract_batch(&extractor, &sources);

        assert_eq!(
            report.summary,
            BatchSummary {
                total_documents: 3,
                successful: 2,
                failed: 1,
                total_entities: 3,
            }
        );
        let ids: Vec<_> = report.outcomes.iter().map(|o| o.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.stage, Some(Stage::Source));
        assert!(failure.error.as_deref().unwrap().contains("unreadable"));
        assert_eq!(report.documents().count(), 2);
    }

    #[test]
    fn test_progress_callback() {
        let sources: Vec<_> = (0..5).map(|i| source(&format!("doc{}", i), "2023-01-01")).collect();
        let extractor = Extractor::new(Arc::new(PatternEngine::new()));
        let done = AtomicUsize::new(0);
        let report = extract_batch_with(&extractor, &sources, &CancellationToken::new(), |_| {
            done.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(done.load(Ordering::Relaxed), 5);
        assert_eq!(report.summary.successful, 5);
    }

    #[test]
    fn test_cancelled_batch() {
        let sources = vec![source("a", "2023-01-01"), source("b", "2023-01-02")];
        let extractor = Extractor::new(Arc::new(PatternEngine::new()));
        let token = CancellationToken::new();
        token.cancel();
        let report = extract_batch_with(&extractor, &sources, &token, |_| {});
        assert_eq!(report.summary.failed, 2);
        assert!(report.outcomes.iter().all(|o| o.stage == Some(Stage::Source)));
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = DocumentOutcome::failed("missing.json", "No such file");
        assert!(!outcome.is_success());
        assert_eq!(outcome.entity_count(), 0);
    }
}
