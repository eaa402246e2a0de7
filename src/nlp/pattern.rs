//! Rule-based entity recognizer.
//!
//! A small set of regular expressions and literal gazetteer terms, enough to
//! run the pipeline without a statistical model. Rules are grouped by engine
//! label; a rule with a capture group reports only the group.

use regex::Regex;

use crate::error::{EngineError, Error, Result};

use super::engine::{EngineRequest, NlpEngine, RawEntity};

const MONTH: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)";

/// A single recognition rule.
#[derive(Debug, Clone)]
struct PatternRule {
    label: String,
    regex: Regex,
}

impl PatternRule {
    fn find_all(&self, text: &str, out: &mut Vec<RawEntity>) {
        for caps in self.regex.captures_iter(text) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            if m.start() < m.end() {
                out.push(RawEntity::new(m.start(), m.end(), &self.label, m.as_str()));
            }
        }
    }
}

/// Regex and gazetteer based [`NlpEngine`].
#[derive(Debug, Clone)]
pub struct PatternEngine {
    name: String,
    rules: Vec<PatternRule>,
}

impl PatternEngine {
    /// Engine with the built-in rules for dates, amounts, account numbers,
    /// organizations and titled person names.
    pub fn new() -> Self {
        let day = r"\d{1,2}(?:st|nd|rd|th)?";
        let builtin = [
            (
                "DATE",
                format!(r"\b(?:{day}(?:\s+of)?\s+)?{MONTH}\.?(?:\s+{day})?,?\s+\d{{4}}\b"),
            ),
            ("DATE", r"\b\d{4}-\d{2}(?:-\d{2})?\b".to_string()),
            ("DATE", r"\b\d{1,2}[/.-]\d{1,2}[/.-](?:\d{4}|\d{2})\b".to_string()),
            (
                "MONEY",
                r"(?:[$€£₹]|\b(?:Rs\.?|INR|USD|EUR|GBP)[ \t]?)[ \t]?\d[\d,]*(?:\.\d{1,2})?\b".to_string(),
            ),
            (
                "MONEY",
                r"\b\d[\d,]*(?:\.\d{1,2})?[ \t]?(?:USD|EUR|GBP|INR)\b".to_string(),
            ),
            (
                "ACC_NO",
                r"(?i)\b(?:a/c|acct|account)\.?[ \t]*(?:no\.?|number|#)?[ \t]*:?[ \t]*(\d[\d \-]{4,}\d)\b"
                    .to_string(),
            ),
            (
                "ORG",
                r"\b(?:[A-Z][\w&'-]*[ \t]+){1,4}(?:Inc|Ltd|LLC|LLP|Corp|Corporation|Company|Bank|GmbH|PLC|Plc|Limited|AG)\b\.?"
                    .to_string(),
            ),
            (
                "PERSON",
                r"\b(?:Mr|Mrs|Ms|Miss|Dr|Prof)\.?[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){0,2})\b".to_string(),
            ),
        ];

        let rules = builtin
            .into_iter()
            .map(|(label, pattern)| PatternRule {
                label: label.to_string(),
                regex: Regex::new(&pattern).unwrap(),
            })
            .collect();

        Self {
            name: "pattern".to_string(),
            rules,
        }
    }

    /// Engine without any rules.
    pub fn empty() -> Self {
        Self {
            name: "pattern".to_string(),
            rules: Vec::new(),
        }
    }

    /// Rename the engine.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a regex rule for `label`.
    pub fn with_rule(mut self, label: impl Into<String>, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::InvalidConfig(format!("invalid pattern '{}': {}", pattern, e)))?;
        self.rules.push(PatternRule {
            label: label.into(),
            regex,
        });
        Ok(self)
    }

    /// Add a literal gazetteer term for `label`, matched on word boundaries.
    pub fn with_term(mut self, label: impl Into<String>, term: &str) -> Self {
        let pattern = format!(r"\b{}\b", regex::escape(term));
        // Escaped literals always form a valid pattern.
        let regex = Regex::new(&pattern).unwrap();
        self.rules.push(PatternRule {
            label: label.into(),
            regex,
        });
        self
    }

    /// Number of rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NlpEngine for PatternEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotate(&self, text: &str, request: &EngineRequest) -> std::result::Result<Vec<RawEntity>, EngineError> {
        let mut found = Vec::new();
        for rule in self
            .rules
            .iter()
            .filter(|r| request.labels.is_empty() || request.wants(&r.label))
        {
            rule.find_all(text, &mut found);
        }
        Ok(found)
    }
}
