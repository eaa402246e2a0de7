//! Geometric text sources.
//!
//! A [`TextSource`] supplies, per page, the text runs a PDF content-model
//! library extracted, in a stable extraction order. The order need not be the
//! reading order; layout segmentation reconstructs that.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::model::{BoundingBox, RunId, TextRun};

/// Failure to read one page from a source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SourceError {
    /// Description of the failure
    pub message: String,
}

impl SourceError {
    /// Create a source error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A run as supplied by a source, before identifiers are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Text content
    pub text: String,
    /// Bounding box (top-left origin)
    pub bbox: BoundingBox,
    /// Font size in points
    pub font_size: f32,
    /// Font name
    #[serde(default)]
    pub font_name: String,
    /// Baseline y-coordinate; the box bottom when absent
    #[serde(default)]
    pub baseline: Option<f32>,
}

impl RunRecord {
    /// Create a record.
    pub fn new(
        text: impl Into<String>,
        bbox: BoundingBox,
        font_size: f32,
        font_name: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            bbox,
            font_size,
            font_name: font_name.into(),
            baseline: None,
        }
    }

    /// Set the baseline.
    pub fn with_baseline(mut self, baseline: f32) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Convert into a run on `page` with identifier `id`.
    pub fn into_run(self, id: RunId, page: u32) -> TextRun {
        let baseline = self.baseline.unwrap_or(self.bbox.y1);
        TextRun {
            id,
            page,
            bbox: self.bbox,
            text: self.text,
            font_size: self.font_size,
            font_name: self.font_name,
            baseline,
        }
    }
}

/// Supplier of positioned text runs for one document.
pub trait TextSource: Sync {
    /// Identifier used in reports and errors.
    fn source_id(&self) -> &str;

    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Runs of `page` (0-based) in extraction order.
    fn page_runs(&self, page: u32) -> std::result::Result<Vec<RunRecord>, SourceError>;
}

/// One page of a [`MemorySource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPage {
    /// Runs in extraction order
    #[serde(default)]
    pub runs: Vec<RunRecord>,
    /// Simulated read failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An in-memory source, loadable from JSON.
///
/// ```
/// use pdfanchor::source::{MemorySource, TextSource};
///
/// let json = r#"{
///     "source_id": "invoice",
///     "pages": [{ "runs": [
///         { "text": "Invoice", "bbox": { "x0": 72, "y0": 72, "x1": 160, "y1": 90 }, "font_size": 18 }
///     ]}]
/// }"#;
/// let source = MemorySource::from_json(json).unwrap();
/// assert_eq!(source.page_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySource {
    /// Source identifier
    #[serde(default)]
    pub source_id: String,
    /// Pages in order
    #[serde(default)]
    pub pages: Vec<MemoryPage>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            pages: Vec::new(),
        }
    }

    /// Append a page of runs.
    pub fn with_page(mut self, runs: Vec<RunRecord>) -> Self {
        self.pages.push(MemoryPage { runs, error: None });
        self
    }

    /// Append a page that fails to read.
    pub fn with_failed_page(mut self, message: impl Into<String>) -> Self {
        self.pages.push(MemoryPage {
            runs: Vec::new(),
            error: Some(message.into()),
        });
        self
    }

    /// Parse a source from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a source from a JSON file; the file stem becomes the id when none is set.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let mut source = Self::from_json(&data)?;
        if source.source_id.is_empty() {
            source.source_id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(source)
    }
}

impl TextSource for MemorySource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_runs(&self, page: u32) -> std::result::Result<Vec<RunRecord>, SourceError> {
        let entry = self
            .pages
            .get(page as usize)
            .ok_or_else(|| SourceError::new(format!("page {} does not exist", page)))?;
        match &entry.error {
            Some(message) => Err(SourceError::new(message.clone())),
            None => Ok(entry.runs.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_pages() {
        let source = MemorySource::new("doc")
            .with_page(vec![RunRecord::new(
                "Hello",
                BoundingBox::new(0.0, 0.0, 30.0, 10.0),
                10.0,
                "Helvetica",
            )])
            .with_failed_page("corrupt content stream");

        assert_eq!(source.page_count(), 2);
        assert_eq!(source.page_runs(0).unwrap().len(), 1);
        assert_eq!(
            source.page_runs(1).unwrap_err().message,
            "corrupt content stream"
        );
        assert!(source.page_runs(2).is_err());
    }

    #[test]
    fn test_from_json_defaults() {
        let json = r#"{
            "source_id": "s",
            "pages": [
                { "runs": [ { "text": "A", "bbox": { "x0": 1, "y0": 2, "x1": 3, "y1": 4 }, "font_size": 9 } ] },
                { "error": "unreadable" }
            ]
        }"#;
        let source = MemorySource::from_json(json).unwrap();
        let runs = source.page_runs(0).unwrap();
        assert_eq!(runs[0].font_name, "");
        assert_eq!(runs[0].baseline, None);
        assert!(source.page_runs(1).is_err());
    }

    #[test]
    fn test_into_run_baseline_default() {
        let record = RunRecord::new("A", BoundingBox::new(0.0, 5.0, 10.0, 17.0), 12.0, "Times");
        let run = record.clone().into_run(RunId(4), 2);
        assert_eq!(run.baseline, 17.0);
        assert_eq!(run.page, 2);
        assert_eq!(run.id, RunId(4));

        let run = record.with_baseline(15.0).into_run(RunId(0), 0);
        assert_eq!(run.baseline, 15.0);
    }

    #[test]
    fn test_from_path_uses_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.json");
        std::fs::write(&path, r#"{ "source_id": "", "pages": [] }"#).unwrap();
        let source = MemorySource::from_path(&path).unwrap();
        assert_eq!(source.source_id, "statement");
    }
}
