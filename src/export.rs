//! JSON export of documents, batches and NER training data.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::batch::BatchReport;
use crate::error::Result;
use crate::model::{EntityKind, Span, StructuredDocument};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

fn serialize<T: Serialize + ?Sized>(value: &T, format: JsonFormat) -> Result<String> {
    let json = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value)?,
        JsonFormat::Compact => serde_json::to_string(value)?,
    };
    Ok(json)
}

/// Convert a document to JSON.
pub fn to_json(doc: &StructuredDocument, format: JsonFormat) -> Result<String> {
    serialize(doc, format)
}

/// Convert a batch report (outcomes and summary) to JSON.
pub fn batch_to_json(report: &BatchReport, format: JsonFormat) -> Result<String> {
    serialize(report, format)
}

/// One text with its entity spans, in the `[start, end, LABEL]` layout used
/// by spaCy-style NER training sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingExample {
    /// Compiled document text
    pub text: String,
    /// `(start, end, label)` triples, character (not byte) offsets into `text`
    pub entities: Vec<(usize, usize, String)>,
}

/// Conventional NER label for an entity kind.
pub fn ner_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Date => "DATE",
        EntityKind::Person => "PERSON",
        EntityKind::Organization => "ORG",
        EntityKind::MonetaryAmount => "MONEY",
        EntityKind::AccountNumber => "ACC_NO",
        EntityKind::Location => "GPE",
    }
}

/// Build a training example from a document.
///
/// Split pieces are folded back into their original span, trimmed entities
/// keep their run-backed span, and unanchored
/// entities are included since they still label the text. Offsets count
/// Unicode scalar values, as Python string indices do.
pub fn training_example(doc: &StructuredDocument) -> TrainingExample {
    let mut spans: Vec<(Span, EntityKind)> = doc
        .entities()
        .iter()
        .map(|e| match (e.split, e.original_span) {
            (true, Some(original)) => (original, e.entity.kind),
            _ => (e.entity.span, e.entity.kind),
        })
        .chain(doc.unanchored().iter().map(|e| (e.span, e.kind)))
        .collect();
    spans.sort();
    spans.dedup();

    let text = doc.text();
    TrainingExample {
        text: text.to_string(),
        entities: spans
            .into_iter()
            .map(|(span, kind)| {
                let start = char_offset(text, span.start);
                let end = start + char_offset(&text[span.start..], span.len());
                (start, end, ner_label(kind).to_string())
            })
            .collect(),
    }
}

/// Number of chars in `text[..byte]`.
fn char_offset(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or(0, |prefix| prefix.chars().count())
}

/// Training examples for every successful document of a batch, as JSON.
pub fn training_data_to_json(report: &BatchReport, format: JsonFormat) -> Result<String> {
    let examples: Vec<TrainingExample> = report.documents().map(training_example).collect();
    serialize(&examples, format)
}

/// Write `json` to `path`, creating parent directories.
pub fn write_json<P: AsRef<Path>>(path: P, json: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    Ok(())
}
