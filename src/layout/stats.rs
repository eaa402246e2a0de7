//! Font size statistics for heading detection.

use std::collections::BTreeMap;

use crate::model::TextRun;

/// Font size histogram of one page.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Observed sizes (tenths of a point) with frequency
    size_histogram: BTreeMap<i32, usize>,
}

impl FontStatistics {
    /// Collect statistics from runs, weighting each run by its character count.
    pub fn from_runs(runs: &[TextRun]) -> Self {
        let mut stats = Self::default();
        for run in runs {
            let weight = run.text.chars().filter(|c| !c.is_whitespace()).count().max(1);
            stats.add_size(run.font_size, weight);
        }
        stats
    }

    /// Add a font size observation.
    pub fn add_size(&mut self, size: f32, weight: usize) {
        let key = (size * 10.0).round() as i32; // Round to 0.1 precision
        *self.size_histogram.entry(key).or_insert(0) += weight;
    }

    /// Most common font size; ties resolve to the smaller size.
    pub fn modal_size(&self) -> f32 {
        let mut best: Option<(i32, usize)> = None;
        for (&key, &count) in &self.size_histogram {
            // Keys ascend, so only a strictly larger count replaces the best.
            if best.map(|(_, c)| count > c).unwrap_or(true) {
                best = Some((key, count));
            }
        }
        best.map(|(key, _)| key as f32 / 10.0).unwrap_or(12.0)
    }

    /// Whether no sizes were observed.
    pub fn is_empty(&self) -> bool {
        self.size_histogram.is_empty()
    }
}
