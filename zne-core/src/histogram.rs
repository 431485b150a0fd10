//! Measurement histograms

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bitstring -> count map produced by one execution
///
/// Bitstrings have one character per classical bit, with bit 0 rightmost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram {
    counts: BTreeMap<String, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any iterator of `(bitstring, count)` pairs, summing duplicates
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut histogram = Self::new();
        for (bitstring, count) in counts {
            histogram.record(bitstring, count);
        }
        histogram
    }

    /// Add `count` observations of `bitstring`
    pub fn record(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.counts.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Count of `bitstring`, zero when absent
    pub fn count(&self, bitstring: &str) -> u64 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }

    /// Total number of shots
    pub fn shots(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shots() == 0
    }

    /// Relative frequency of `bitstring`
    pub fn probability(&self, bitstring: &str) -> f64 {
        let shots = self.shots();
        if shots == 0 {
            0.0
        } else {
            self.count(bitstring) as f64 / shots as f64
        }
    }

    /// Most frequent outcome
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.counts
            .iter()
            .max_by_key(|(_, &count)| count)
            .map(|(bitstring, &count)| (bitstring.as_str(), count))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(b, &c)| (b.as_str(), c))
    }

    pub fn into_counts(self) -> BTreeMap<String, u64> {
        self.counts
    }
}
