//! Job result types.
//!
//! Shot memory comes back from the service as one hex string per shot, e.g.
//! `"0x3"` for slots 0 and 1 both reading `1`. [`Counts`] keys are those
//! strings as returned; [`Counts::to_binary`] renders them as bitstrings with
//! the lowest memory slot rightmost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tergite_compile::qobj::ExperimentHeader;

/// Occurrences of each measured outcome, ordered by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    counts: BTreeMap<String, u64>,
}

impl Counts {
    /// Create empty counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create counts from (outcome, count) pairs, summing duplicates.
    pub fn from_pairs(iter: impl IntoIterator<Item = (impl Into<String>, u64)>) -> Self {
        let mut counts = Self::new();
        for (k, v) in iter {
            counts.insert(k, v);
        }
        counts
    }

    /// Tally raw shot memory.
    pub fn from_memory(memory: &[String]) -> Self {
        let mut counts = Self::new();
        for shot in memory {
            counts.insert(shot.as_str(), 1);
        }
        counts
    }

    /// Add `count` occurrences of `outcome`.
    pub fn insert(&mut self, outcome: impl Into<String>, count: u64) {
        *self.counts.entry(outcome.into()).or_default() += count;
    }

    /// Occurrences of `outcome`.
    pub fn get(&self, outcome: &str) -> u64 {
        self.counts.get(outcome).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.counts.iter()
    }

    /// Sum of all counts.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// The outcome seen most often. Ties go to the smallest outcome.
    pub fn most_frequent(&self) -> Option<(&String, &u64)> {
        self.counts
            .iter()
            .rev()
            .max_by_key(|&(_, count)| count)
    }

    /// Relative frequency of each outcome.
    #[allow(clippy::cast_precision_loss)]
    pub fn probabilities(&self) -> BTreeMap<String, f64> {
        let total = self.total_shots() as f64;
        if total == 0.0 {
            return BTreeMap::new();
        }
        self.counts
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total))
            .collect()
    }

    /// Outcomes by count, descending.
    pub fn sorted(&self) -> Vec<(&String, &u64)> {
        let mut items: Vec<_> = self.counts.iter().collect();
        items.sort_by(|a, b| b.1.cmp(a.1));
        items
    }

    /// Re-key hex outcomes as `width`-bit binary strings.
    ///
    /// Keys that are not hex are kept unchanged.
    pub fn to_binary(&self, width: usize) -> Counts {
        self.counts
            .iter()
            .map(|(k, &v)| {
                let key = k
                    .strip_prefix("0x")
                    .and_then(|hex| u128::from_str_radix(hex, 16).ok())
                    .map_or_else(|| k.clone(), |n| format!("{n:0width$b}"));
                (key, v)
            })
            .collect()
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (key, value) in iter {
            counts.insert(key, value);
        }
        counts
    }
}

/// Observed data of one experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentData {
    pub counts: Counts,
    /// One entry per shot.
    pub memory: Vec<String>,
}

/// Result of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Header of the submitted experiment.
    pub header: ExperimentHeader,
    /// Shots requested for the job.
    pub shots: u32,
    pub success: bool,
    pub data: ExperimentData,
}

impl ExperimentResult {
    /// Build a result from raw shot memory.
    pub fn from_memory(
        header: ExperimentHeader,
        shots: u32,
        success: bool,
        memory: Vec<String>,
    ) -> Self {
        Self {
            header,
            shots,
            success,
            data: ExperimentData {
                counts: Counts::from_memory(&memory),
                memory,
            },
        }
    }
}

/// Result of a whole job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub backend_name: String,
    pub backend_version: String,
    /// Id of the submitted payload, when known.
    pub qobj_id: Option<String>,
    pub job_id: String,
    pub success: bool,
    /// One entry per returned experiment, in submission order.
    pub results: Vec<ExperimentResult>,
}

impl JobResult {
    /// Counts of experiment `index`.
    pub fn counts(&self, index: usize) -> Option<&Counts> {
        self.results.get(index).map(|r| &r.data.counts)
    }

    /// Counts of the experiment named `name`.
    pub fn counts_by_name(&self, name: &str) -> Option<&Counts> {
        self.results
            .iter()
            .find(|r| r.header.name == name)
            .map(|r| &r.data.counts)
    }
}
