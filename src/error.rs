//! Error types for the pdfanchor pipeline.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for pdfanchor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage, reported with per-document failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading runs from the geometric source
    Source,
    /// Layout segmentation
    Segmentation,
    /// Block-to-text compilation
    Compilation,
    /// NLP annotation
    Annotation,
    /// Coordinate back-projection
    Projection,
    /// Document model assembly and validation
    Assembly,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Source => "source",
            Stage::Segmentation => "segmentation",
            Stage::Compilation => "compilation",
            Stage::Annotation => "annotation",
            Stage::Projection => "projection",
            Stage::Assembly => "assembly",
        };
        f.write_str(name)
    }
}

/// Failure reported by an NLP engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine did not answer in time.
    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    /// The engine failed to annotate the text.
    #[error("engine failure: {0}")]
    Failed(String),

    /// The engine returned a span that does not address the input text.
    #[error("invalid span {start}..{end} for text of length {len}")]
    InvalidSpan {
        /// Span start offset
        start: usize,
        /// Span end offset
        end: usize,
        /// Length of the annotated text
        len: usize,
    },

    /// The engine returned a confidence that is not a number in [0, 1].
    #[error("confidence {0} is outside [0, 1]")]
    InvalidConfidence(f32),
}

/// Error types that can occur while processing a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The geometric source could not supply runs for a page.
    #[error("source read error on page {page}: {message}")]
    SourceRead {
        /// Page index (0-based)
        page: u32,
        /// Source-provided description
        message: String,
    },

    /// The NLP engine call failed; no entities are returned for the document.
    #[error("NLP engine error for document '{document}': {source}")]
    NlpEngine {
        /// Source identifier of the document
        document: String,
        /// Underlying engine failure
        #[source]
        source: EngineError,
    },

    /// An internal invariant was violated while assembling the document.
    #[error("structure validation failed for document '{document}': {reason}")]
    StructureValidation {
        /// Source identifier of the document
        document: String,
        /// Violated invariant
        reason: String,
    },

    /// Processing was cancelled by the caller.
    #[error("processing of document '{document}' cancelled during {stage}")]
    Cancelled {
        /// Source identifier of the document
        document: String,
        /// Stage that observed the cancellation
        stage: Stage,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Pipeline stage the error belongs to, when it is document scoped.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::SourceRead { .. } => Some(Stage::Source),
            Error::NlpEngine { .. } => Some(Stage::Annotation),
            Error::StructureValidation { .. } => Some(Stage::Assembly),
            Error::Cancelled { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the error is an engine timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::NlpEngine {
                source: EngineError::Timeout(_),
                ..
            }
        )
    }
}
