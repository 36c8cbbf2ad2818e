//! Qubit connectivity of a device.
//!
//! Backends publish their coupling list verbatim, including `[q, q]` entries
//! for qubits without a coupler. Those self-loops are not couplings and are
//! dropped from [`CouplingMap::coupled_pairs`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Directed coupling list of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingMap {
    /// Directed pairs in the order the device lists them, self-loops removed.
    edges: Vec<(u32, u32)>,
    /// Number of distinct qubits mentioned, self-loops included.
    num_qubits: u32,
}

impl CouplingMap {
    /// Build from the raw pair list of a backend config.
    pub fn from_pairs(pairs: &[(u32, u32)]) -> Self {
        let num_qubits = pairs
            .iter()
            .map(|&(a, b)| a.max(b) + 1)
            .max()
            .unwrap_or(0);
        let mut edges = Vec::with_capacity(pairs.len());
        for &(a, b) in pairs {
            if a != b && !edges.contains(&(a, b)) {
                edges.push((a, b));
            }
        }
        Self { edges, num_qubits }
    }

    /// Coupled pairs, excluding self-loops.
    pub fn coupled_pairs(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Whether `(a, b)` is a listed coupling.
    pub fn contains(&self, a: u32, b: u32) -> bool {
        self.edges.contains(&(a, b))
    }

    /// Qubits coupled to `qubit` in either direction.
    pub fn neighbors(&self, qubit: u32) -> impl Iterator<Item = u32> + '_ {
        self.edges.iter().filter_map(move |&(a, b)| {
            if a == qubit {
                Some(b)
            } else if b == qubit {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Smallest qubit count covering every index in the list.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Whether the device has no couplings.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Lookup from a qubit pair to the coupler (control channel) between them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CouplerTable {
    couplers: FxHashMap<(u32, u32), u32>,
}

impl CouplerTable {
    /// Build from `((qubit_a, qubit_b), coupler)` entries.
    pub fn from_entries(entries: &[((u32, u32), u32)]) -> Self {
        Self {
            couplers: entries.iter().copied().collect(),
        }
    }

    /// Coupler serving `(control, target)`.
    pub fn coupler(&self, control: u32, target: u32) -> CompileResult<u32> {
        self.couplers
            .get(&(control, target))
            .copied()
            .ok_or(CompileError::CouplingNotFound { control, target })
    }

    /// Number of known pairs.
    pub fn len(&self) -> usize {
        self.couplers.len()
    }

    /// Whether no pairs are known.
    pub fn is_empty(&self) -> bool {
        self.couplers.is_empty()
    }
}
