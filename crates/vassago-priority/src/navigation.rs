//! Page transition table

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Observed page transitions and their per-page probabilities
///
/// Every `from` row sums to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationTable {
    counts: HashMap<String, HashMap<String, u64>>,
    probabilities: HashMap<String, HashMap<String, f64>>,
}

impl NavigationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a transition and renormalize the `from` row
    pub fn record(&mut self, from: &str, to: &str) {
        let row = self.counts.entry(from.to_string()).or_default();
        *row.entry(to.to_string()).or_insert(0) += 1;

        let total: u64 = row.values().sum();
        let normalized = row
            .iter()
            .map(|(page, &count)| (page.clone(), count as f64 / total as f64))
            .collect();
        self.probabilities.insert(from.to_string(), normalized);
    }

    /// Probability of moving from `from` to `to`
    pub fn probability(&self, from: &str, to: &str) -> f64 {
        self.probabilities
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Outgoing probabilities of a page
    pub fn transitions(&self, from: &str) -> Option<&HashMap<String, f64>> {
        self.probabilities.get(from)
    }

    /// Times `from -> to` was observed
    pub fn count(&self, from: &str, to: &str) -> u64 {
        self.counts
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0)
    }

    /// The `n` most likely next pages, most likely first
    pub fn predict_next(&self, from: &str, n: usize) -> Vec<(String, f64)> {
        let Some(row) = self.probabilities.get(from) else {
            return Vec::new();
        };

        let mut next: Vec<(String, f64)> = row.iter().map(|(p, &prob)| (p.clone(), prob)).collect();
        next.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        next.truncate(n);
        next
    }

    /// Pages with at least one outgoing transition
    pub fn page_count(&self) -> usize {
        self.probabilities.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Forget all transitions
    pub fn clear(&mut self) {
        self.counts.clear();
        self.probabilities.clear();
    }
}
