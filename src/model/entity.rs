//! Entities recognized in compiled text and their page anchors.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{BlockId, BoundingBox, RunId};

/// Half-open byte range `[start, end)` in the compiled text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
}

impl Span {
    /// Create a span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether two spans share at least one offset.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Recognized entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Calendar dates, full or partial
    Date,
    /// Person names
    Person,
    /// Organizations
    Organization,
    /// Monetary amounts
    MonetaryAmount,
    /// Bank or customer account numbers
    AccountNumber,
    /// Places
    Location,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Date,
        EntityKind::Person,
        EntityKind::Organization,
        EntityKind::MonetaryAmount,
        EntityKind::AccountNumber,
        EntityKind::Location,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Date => "date",
            EntityKind::Person => "person",
            EntityKind::Organization => "organization",
            EntityKind::MonetaryAmount => "monetary_amount",
            EntityKind::AccountNumber => "account_number",
            EntityKind::Location => "location",
        };
        f.write_str(name)
    }
}

/// A calendar date where month and day may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartialDate {
    /// Year
    pub year: i32,
    /// Month (1-12)
    pub month: Option<u32>,
    /// Day of month (only present together with `month`)
    pub day: Option<u32>,
}

impl PartialDate {
    /// A year-only date.
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// A year-month date.
    pub fn year_month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    /// A complete date.
    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    /// Convert to a calendar date when all components are known.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month?, self.day?)
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
            if let Some(day) = self.day {
                write!(f, "-{:02}", day)?;
            }
        }
        Ok(())
    }
}

/// Type-dependent canonical value of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedValue {
    /// A (possibly partial) calendar date
    Date(PartialDate),
    /// A monetary amount
    Amount {
        /// Numeric value
        value: f64,
        /// ISO currency code when recognizable
        currency: Option<String>,
    },
    /// An identifier with separators removed
    Identifier {
        /// Canonical identifier text
        value: String,
    },
}

impl NormalizedValue {
    /// The date payload, if this is a date.
    pub fn as_date(&self) -> Option<&PartialDate> {
        match self {
            NormalizedValue::Date(date) => Some(date),
            _ => None,
        }
    }
}

/// A typed span recognized by the NLP stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Offsets in the compiled text
    pub span: Span,
    /// Entity type
    pub kind: EntityKind,
    /// Raw surface text
    pub text: String,
    /// Canonical value, absent when normalization failed or does not apply
    pub normalized: Option<NormalizedValue>,
    /// Engine confidence in [0, 1], if supplied
    pub confidence: Option<f32>,
}

/// One physical location contributing to an anchored entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Page index (0-based)
    pub page: u32,
    /// Bounding box of the contributing run
    pub bbox: BoundingBox,
    /// Contributing run
    pub run: RunId,
    /// Block containing the run
    pub block: BlockId,
}

/// An entity resolved to page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchoredEntity {
    /// The entity (or the piece of it that lies within one block)
    pub entity: Entity,
    /// One anchor per contributing run, in text order
    pub anchors: Vec<Anchor>,
    /// Block the entity lies in
    pub block: BlockId,
    /// Whether the engine span crossed a block boundary and was cut
    pub split: bool,
    /// Span reported by the engine, when it was split or trimmed to run text
    pub original_span: Option<Span>,
}

impl AnchoredEntity {
    /// One box per page: the union of the anchors on that page, pages ascending.
    pub fn page_boxes(&self) -> Vec<(u32, BoundingBox)> {
        let mut boxes: Vec<(u32, BoundingBox)> = Vec::new();
        for anchor in &self.anchors {
            match boxes.iter_mut().find(|(page, _)| *page == anchor.page) {
                Some((_, bbox)) => *bbox = bbox.union(&anchor.bbox),
                None => boxes.push((anchor.page, anchor.bbox)),
            }
        }
        boxes.sort_by_key(|(page, _)| *page);
        boxes
    }

    /// Pages touched by the entity.
    pub fn pages(&self) -> Vec<u32> {
        self.page_boxes().into_iter().map(|(page, _)| page).collect()
    }
}

/// A non-fatal normalization failure; the entity is kept without a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationWarning {
    /// Span of the affected entity
    pub span: Span,
    /// Entity type
    pub kind: EntityKind,
    /// Surface text that failed to normalize
    pub text: String,
    /// Why normalization failed
    pub reason: String,
}
