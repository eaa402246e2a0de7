//! The NLP engine boundary.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What the annotator asks of the engine for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRequest {
    /// Engine labels of interest; engines may return others, which are dropped
    pub labels: Vec<String>,
}

impl EngineRequest {
    /// Whether `label` was requested.
    pub fn wants(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

/// An entity as reported by an engine, before translation and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Start offset (bytes) into the annotated text, if the engine reports positions
    pub start: Option<usize>,
    /// End offset (bytes, exclusive)
    pub end: Option<usize>,
    /// Engine label, e.g. `DATE`
    pub label: String,
    /// Surface text as the engine saw it
    pub text: String,
    /// Confidence in [0, 1]
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl RawEntity {
    /// A positioned entity.
    pub fn new(start: usize, end: usize, label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            label: label.into(),
            text: text.into(),
            confidence: None,
        }
    }

    /// An entity without offsets; the annotator locates it by its text.
    pub fn unpositioned(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            start: None,
            end: None,
            label: label.into(),
            text: text.into(),
            confidence: None,
        }
    }

    /// Attach a confidence score.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A named-entity recognizer.
///
/// Offsets of returned entities index into exactly the `text` passed in.
/// Implementations must be shareable across threads; the annotator may run
/// them on a worker thread to enforce a time limit.
pub trait NlpEngine: Send + Sync {
    /// Engine name, recorded on the document.
    fn name(&self) -> &str;

    /// Recognize entities in `text`.
    fn annotate(&self, text: &str, request: &EngineRequest) -> Result<Vec<RawEntity>, EngineError>;
}
