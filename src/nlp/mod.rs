//! NLP annotation over compiled text.
//!
//! The [`Annotator`] wraps an external [`NlpEngine`]: it translates the
//! enabled entity kinds into engine labels, calls the engine once per
//! document, validates and maps the answer back to [`Entity`] values and
//! normalizes dates, amounts and identifiers.

mod engine;
mod labels;
mod normalize;
mod pattern;

pub use engine::{EngineRequest, NlpEngine, RawEntity};
pub use labels::{EntityConfig, LabelMap};
pub use normalize::{identifier, Normalizer};
pub use pattern::PatternEngine;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::error::EngineError;
use crate::model::{Entity, NormalizationWarning, Span};

/// Entities of one document and the normalization failures met on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    /// Entities sorted by start, longest first, then kind
    pub entities: Vec<Entity>,
    /// Entities kept without a canonical value
    pub warnings: Vec<NormalizationWarning>,
}

/// Runs an engine over compiled text and post-processes its answer.
#[derive(Clone)]
pub struct Annotator {
    engine: Arc<dyn NlpEngine>,
    config: EntityConfig,
    normalizer: Normalizer,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("engine", &self.engine.name())
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Annotator {
    /// Create an annotator.
    pub fn new(engine: Arc<dyn NlpEngine>, config: EntityConfig) -> Self {
        let normalizer = Normalizer::new(config.day_first);
        Self {
            engine,
            config,
            normalizer,
            timeout: None,
        }
    }

    /// Bound the engine call; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the wrapped engine.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Entity configuration in use.
    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    /// Annotate `text`.
    ///
    /// Engine failures, timeouts, spans that do not address `text` and
    /// confidences outside [0, 1] are errors; a value that cannot be
    /// normalized is not.
    pub fn annotate(&self, text: &str) -> Result<Annotation, EngineError> {
        let request = EngineRequest {
            labels: self.config.engine_labels(),
        };
        if request.labels.is_empty() {
            log::debug!("No entity kinds enabled, skipping engine call");
            return Ok(Annotation::default());
        }

        let raw = self.call_engine(text, request)?;
        log::debug!("Engine '{}' returned {} entities", self.engine.name(), raw.len());

        let mut annotation = Annotation::default();
        let mut relocation_cursor: HashMap<String, usize> = HashMap::new();

        for raw in raw {
            let Some(kind) = self.config.labels.kind_of(&raw.label) else {
                log::warn!("Dropping entity with unknown label '{}'", raw.label);
                continue;
            };
            if !self.config.is_enabled(kind) {
                continue;
            }
            if let Some(confidence) = raw.confidence {
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(EngineError::InvalidConfidence(confidence));
                }
            }
            if let (Some(min), Some(confidence)) = (self.config.min_confidence, raw.confidence) {
                if confidence < min {
                    continue;
                }
            }

            let span = match (raw.start, raw.end) {
                (Some(start), Some(end)) => validate_span(text, start, end)?,
                _ => match relocate(text, &raw.text, &mut relocation_cursor) {
                    Some(span) => span,
                    None => {
                        log::warn!(
                            "Dropping {} entity '{}': surface text not found",
                            kind,
                            raw.text
                        );
                        continue;
                    }
                },
            };
            let surface = text[span.start..span.end].to_string();

            let normalized = match self.normalizer.normalize(kind, &surface) {
                Ok(value) => value,
                Err(reason) => {
                    log::warn!("Could not normalize {} '{}': {}", kind, surface, reason);
                    annotation.warnings.push(NormalizationWarning {
                        span,
                        kind,
                        text: surface.clone(),
                        reason,
                    });
                    None
                }
            };

            annotation.entities.push(Entity {
                span,
                kind,
                text: surface,
                normalized,
                confidence: raw.confidence,
            });
        }

        annotation.entities.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then_with(|| b.span.len().cmp(&a.span.len()))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        annotation
            .entities
            .dedup_by(|later, earlier| later.span == earlier.span && later.kind == earlier.kind);
        annotation
            .warnings
            .sort_by(|a, b| a.span.cmp(&b.span).then_with(|| a.kind.cmp(&b.kind)));
        annotation
            .warnings
            .dedup_by(|later, earlier| later.span == earlier.span && later.kind == earlier.kind);

        Ok(annotation)
    }

    fn call_engine(&self, text: &str, request: EngineRequest) -> Result<Vec<RawEntity>, EngineError> {
        let Some(limit) = self.timeout else {
            return self.engine.annotate(text, &request);
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let engine = Arc::clone(&self.engine);
        let owned = text.to_string();
        thread::Builder::new()
            .name("nlp-engine".to_string())
            .spawn(move || {
                // The receiver is gone when the call already timed out.
                let _ = tx.send(engine.annotate(&owned, &request));
            })
            .map_err(|e| EngineError::Failed(format!("failed to start engine worker: {}", e)))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Engine '{}' timed out after {:?}", self.engine.name(), limit);
                Err(EngineError::Timeout(limit))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(EngineError::Failed("engine worker terminated without a result".to_string()))
            }
        }
    }
}

fn validate_span(text: &str, start: usize, end: usize) -> Result<Span, EngineError> {
    let valid = start < end
        && end <= text.len()
        && text.is_char_boundary(start)
        && text.is_char_boundary(end);
    if valid {
        Ok(Span::new(start, end))
    } else {
        Err(EngineError::InvalidSpan {
            start,
            end,
            len: text.len(),
        })
    }
}

/// Find `surface` in `text`, continuing after the previous hit of the same
/// surface text so repeated mentions land on successive occurrences.
fn relocate(text: &str, surface: &str, cursor: &mut HashMap<String, usize>) -> Option<Span> {
    let surface = surface.trim();
    if surface.is_empty() {
        return None;
    }
    let from = cursor.get(surface).copied().unwrap_or(0);
    let start = text[from..]
        .find(surface)
        .map(|i| from + i)
        .or_else(|| text.find(surface))?;
    let end = start + surface.len();
    cursor.insert(surface.to_string(), end);
    Some(Span::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, NormalizedValue, PartialDate};

    /// Engine returning a fixed answer, optionally after a delay.
    struct FixedEngine {
        entities: Vec<RawEntity>,
        delay: Option<Duration>,
    }

    impl FixedEngine {
        fn new(entities: Vec<RawEntity>) -> Arc<dyn NlpEngine> {
            Arc::new(Self {
                entities,
                delay: None,
            })
        }
    }

    impl NlpEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        fn annotate(&self, _text: &str, _request: &EngineRequest) -> Result<Vec<RawEntity>, EngineError> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            Ok(self.entities.clone())
        }
    }

    const TEXT: &str = "Invoice\n\nDate:\nMarch 2023";

    #[test]
    fn test_scenario_invoice_date() {
        let annotator = Annotator::new(Arc::new(PatternEngine::new()), EntityConfig::default());
        let annotation = annotator.annotate(TEXT).unwrap();
        assert_eq!(annotation.entities.len(), 1);
        let date = &annotation.entities[0];
        assert_eq!(date.kind, EntityKind::Date);
        assert_eq!(date.text, "March 2023");
        assert_eq!(date.span, Span::new(15, 25));
        assert_eq!(
            date.normalized,
            Some(NormalizedValue::Date(PartialDate::year_month(2023, 3)))
        );
        assert!(annotation.warnings.is_empty());
    }

    #[test]
    fn test_disabled_and_unknown_labels_dropped() {
        let engine = FixedEngine::new(vec![
            RawEntity::new(0, 7, "ORG", "Invoice"),
            RawEntity::new(0, 7, "PRODUCT", "Invoice"),
            RawEntity::new(15, 25, "DATE", "March 2023"),
        ]);
        let config = EntityConfig::default().with_kinds([EntityKind::Date]);
        let annotation = Annotator::new(engine, config).annotate(TEXT).unwrap();
        assert_eq!(annotation.entities.len(), 1);
        assert_eq!(annotation.entities[0].kind, EntityKind::Date);
    }

    #[test]
    fn test_out_of_bounds_span_is_fatal() {
        let engine = FixedEngine::new(vec![RawEntity::new(20, 99, "DATE", "x")]);
        let err = Annotator::new(engine, EntityConfig::default())
            .annotate(TEXT)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidSpan {
                start: 20,
                end: 99,
                len: TEXT.len()
            }
        );
    }

    #[test]
    fn test_span_off_char_boundary_is_fatal() {
        let engine = FixedEngine::new(vec![RawEntity::new(1, 2, "ORG", "é")]);
        let result = Annotator::new(engine, EntityConfig::default()).annotate("Café Ltd");
        assert!(result.is_ok());
        let engine = FixedEngine::new(vec![RawEntity::new(4, 5, "ORG", "é")]);
        let result = Annotator::new(engine, EntityConfig::default()).annotate("Café Ltd");
        assert!(matches!(result, Err(EngineError::InvalidSpan { .. })));
    }

    #[test]
    fn test_unpositioned_entities_are_relocated() {
        let text = "Paid 01/03/2023, refunded 01/03/2023";
        let engine = FixedEngine::new(vec![
            RawEntity::unpositioned("DATE", "01/03/2023"),
            RawEntity::unpositioned("DATE", "01/03/2023"),
            RawEntity::unpositioned("DATE", "not in text"),
        ]);
        let annotation = Annotator::new(engine, EntityConfig::default())
            .annotate(text)
            .unwrap();
        let spans: Vec<_> = annotation.entities.iter().map(|e| e.span).collect();
        assert_eq!(spans, vec![Span::new(5, 15), Span::new(26, 36)]);
        assert_eq!(
            annotation.entities[0].normalized,
            Some(NormalizedValue::Date(PartialDate::ymd(2023, 3, 1)))
        );
    }

    #[test]
    fn test_normalization_failure_keeps_entity() {
        let text = "Due 31/02/2023";
        let engine = FixedEngine::new(vec![RawEntity::new(4, 14, "DATE", "31/02/2023")]);
        let annotation = Annotator::new(engine, EntityConfig::default())
            .annotate(text)
            .unwrap();
        assert_eq!(annotation.entities.len(), 1);
        assert!(annotation.entities[0].normalized.is_none());
        assert_eq!(annotation.warnings.len(), 1);
        assert_eq!(annotation.warnings[0].span, Span::new(4, 14));
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let text = "Acme Bank Ltd on 2023-03-05";
        let engine = FixedEngine::new(vec![
            RawEntity::new(17, 27, "DATE", "2023-03-05"),
            RawEntity::new(0, 13, "ORG", "Acme Bank Ltd"),
            RawEntity::new(0, 9, "ORG", "Acme Bank"),
            RawEntity::new(17, 27, "DATE", "2023-03-05"),
        ]);
        let annotation = Annotator::new(engine, EntityConfig::default())
            .annotate(text)
            .unwrap();
        let texts: Vec<_> = annotation.entities.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Acme Bank Ltd", "Acme Bank", "2023-03-05"]);
    }

    #[test]
    fn test_min_confidence() {
        let engine = FixedEngine::new(vec![
            RawEntity::new(0, 7, "ORG", "Invoice").with_confidence(0.2),
            RawEntity::new(15, 25, "DATE", "March 2023").with_confidence(0.9),
        ]);
        let config = EntityConfig::default().with_min_confidence(0.5);
        let annotation = Annotator::new(engine, config).annotate(TEXT).unwrap();
        assert_eq!(annotation.entities.len(), 1);
        assert_eq!(annotation.entities[0].confidence, Some(0.9));
    }

    #[test]
    fn test_confidence_out_of_range() {
        for bad in [7.5, -0.1, f32::NAN] {
            let engine = FixedEngine::new(vec![
                RawEntity::new(15, 25, "DATE", "March 2023").with_confidence(bad),
            ]);
            let result = Annotator::new(engine, EntityConfig::default()).annotate(TEXT);
            assert!(matches!(result, Err(EngineError::InvalidConfidence(_))));
        }

        let engine = FixedEngine::new(vec![
            RawEntity::new(15, 25, "DATE", "March 2023").with_confidence(1.0),
        ]);
        let annotation = Annotator::new(engine, EntityConfig::default()).annotate(TEXT).unwrap();
        assert_eq!(annotation.entities[0].confidence, Some(1.0));
    }

    #[test]
    fn test_timeout() {
        let engine: Arc<dyn NlpEngine> = Arc::new(FixedEngine {
            entities: vec![],
            delay: Some(Duration::from_millis(500)),
        });
        let annotator = Annotator::new(engine, EntityConfig::default())
            .with_timeout(Some(Duration::from_millis(20)));
        assert_eq!(
            annotator.annotate(TEXT),
            Err(EngineError::Timeout(Duration::from_millis(20)))
        );
    }

    #[test]
    fn test_answer_within_timeout() {
        let annotator = Annotator::new(Arc::new(PatternEngine::new()), EntityConfig::default())
            .with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(annotator.annotate(TEXT).unwrap().entities.len(), 1);
    }
}
