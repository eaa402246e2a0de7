//! Entity type selection and engine label translation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::EntityKind;

/// Bidirectional mapping between engine labels and entity kinds.
///
/// Labels are matched case-insensitively and stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap {
    labels: BTreeMap<String, EntityKind>,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::empty()
            .with_label("DATE", EntityKind::Date)
            .with_label("PERSON", EntityKind::Person)
            .with_label("PER", EntityKind::Person)
            .with_label("ORG", EntityKind::Organization)
            .with_label("MONEY", EntityKind::MonetaryAmount)
            .with_label("GPE", EntityKind::Location)
            .with_label("LOC", EntityKind::Location)
            .with_label("ACC_NO", EntityKind::AccountNumber)
    }
}

impl LabelMap {
    /// A map without labels.
    pub fn empty() -> Self {
        Self {
            labels: BTreeMap::new(),
        }
    }

    /// Map an engine label to a kind, replacing any previous mapping.
    pub fn with_label(mut self, label: impl AsRef<str>, kind: EntityKind) -> Self {
        self.labels.insert(label.as_ref().to_ascii_uppercase(), kind);
        self
    }

    /// Kind for an engine label.
    pub fn kind_of(&self, label: &str) -> Option<EntityKind> {
        self.labels.get(&label.to_ascii_uppercase()).copied()
    }

    /// Engine labels mapped to `kind`, sorted.
    pub fn labels_for(&self, kind: EntityKind) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, &k)| k == kind)
            .map(|(label, _)| label.as_str())
            .collect()
    }
}

/// Which entity kinds to extract and how to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Kinds kept in the output
    pub enabled: BTreeSet<EntityKind>,
    /// Read ambiguous numeric dates as day/month (otherwise month/day)
    pub day_first: bool,
    /// Entities below this engine confidence are dropped
    pub min_confidence: Option<f32>,
    /// Engine label translation
    pub labels: LabelMap,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            enabled: [
                EntityKind::Date,
                EntityKind::Person,
                EntityKind::Organization,
                EntityKind::AccountNumber,
            ]
            .into_iter()
            .collect(),
            day_first: true,
            min_confidence: None,
            labels: LabelMap::default(),
        }
    }
}

impl EntityConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable every kind.
    pub fn all() -> Self {
        Self {
            enabled: EntityKind::ALL.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Enable exactly the given kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.enabled = kinds.into_iter().collect();
        self
    }

    /// Enable one more kind.
    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.enabled.insert(kind);
        self
    }

    /// Disable a kind.
    pub fn without_kind(mut self, kind: EntityKind) -> Self {
        self.enabled.remove(&kind);
        self
    }

    /// Set day/month order for numeric dates.
    pub fn with_day_first(mut self, day_first: bool) -> Self {
        self.day_first = day_first;
        self
    }

    /// Drop entities below `confidence`.
    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    /// Replace the label map.
    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    /// Whether `kind` is enabled.
    pub fn is_enabled(&self, kind: EntityKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Engine labels for every enabled kind.
    pub fn engine_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .enabled
            .iter()
            .flat_map(|&kind| self.labels.labels_for(kind))
            .map(str::to_string)
            .collect();
        labels.sort();
        labels
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(confidence) = self.min_confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(Error::InvalidConfig(format!(
                    "min_confidence must be within [0, 1], got {}",
                    confidence
                )));
            }
        }
        if let Some(kind) = self
            .enabled
            .iter()
            .find(|&&kind| self.labels.labels_for(kind).is_empty())
        {
            return Err(Error::InvalidConfig(format!(
                "entity kind '{}' is enabled but has no engine label",
                kind
            )));
        }
        Ok(())
    }
}
