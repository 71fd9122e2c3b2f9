// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-section statistics for one watch window.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counter map where absent keys read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram<K: Ord> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord> Default for Histogram<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord> Histogram<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `key`, inserting it at zero first if absent.
    pub fn increment(&mut self, key: K) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Count for `key` (0 if never seen).
    pub fn get<Q>(&self, key: &Q) -> u64
    where
        K: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    /// Key with the highest count; ties go to the smallest key.
    pub fn most_common(&self) -> Option<(&K, u64)> {
        self.iter()
            .fold(None, |best: Option<(&K, u64)>, (k, v)| match best {
                Some((_, best_v)) if best_v >= v => best,
                _ => Some((k, v)),
            })
    }
}

/// Smallest and largest response size seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: u64,
    pub max: u64,
}

/// Statistics accumulated for one section during one watch window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionStats {
    section: String,
    hits: u64,
    status: Histogram<u16>,
    hosts: Histogram<String>,
    total_size: u64,
    /// `None` until the first hit.
    size_range: Option<SizeRange>,
}

impl SectionStats {
    /// Create an empty accumulator for `section`.
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            hits: 0,
            status: Histogram::new(),
            hosts: Histogram::new(),
            total_size: 0,
            size_range: None,
        }
    }

    /// Record one hit.
    pub fn add_hit(&mut self, host: &str, status: u16, size: u64) {
        self.hits += 1;
        self.total_size = self.total_size.saturating_add(size);

        self.size_range = Some(match self.size_range {
            Some(range) => SizeRange {
                min: range.min.min(size),
                max: range.max.max(size),
            },
            None => SizeRange {
                min: size,
                max: size,
            },
        });

        self.status.increment(status);
        // Avoid allocating for hosts already counted.
        if let Some(count) = self.hosts.counts.get_mut(host) {
            *count += 1;
        } else {
            self.hosts.increment(host.to_string());
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn is_empty(&self) -> bool {
        self.hits == 0
    }

    pub fn status(&self) -> &Histogram<u16> {
        &self.status
    }

    pub fn hosts(&self) -> &Histogram<String> {
        &self.hosts
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn min_size(&self) -> Option<u64> {
        self.size_range.map(|r| r.min)
    }

    pub fn max_size(&self) -> Option<u64> {
        self.size_range.map(|r| r.max)
    }

    pub fn size_range(&self) -> Option<SizeRange> {
        self.size_range
    }

    /// Mean response size, `None` without hits.
    pub fn average_size(&self) -> Option<f64> {
        if self.hits == 0 {
            return None;
        }
        Some(self.total_size as f64 / self.hits as f64)
    }

    /// Number of hits with status >= 400.
    pub fn error_count(&self) -> u64 {
        self.status
            .iter()
            .filter(|(status, _)| **status >= 400)
            .map(|(_, count)| count)
            .sum()
    }

    /// Percentage (0-100) of hits with status >= 400, `None` without hits.
    pub fn error_rate(&self) -> Option<f64> {
        if self.hits == 0 {
            return None;
        }
        Some(self.error_count() as f64 * 100.0 / self.hits as f64)
    }
}
