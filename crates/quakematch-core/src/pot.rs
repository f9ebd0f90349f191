//! # Pick-Offset Table
//!
//! The POT encodes the geometric signature of a template event across its
//! stations: for arrivals a1..an (in insertion order) it stores the
//! symmetric matrix of pairwise absolute pick-time offsets
//! `d[i][j] = |a_i.pick.time - a_j.pick.time|`, indexed by waveform stream
//! id, with a per-entry enable bit.
//!
//! During linking, a candidate POT built from an in-progress event's
//! arrivals is validated against the reference POT built from the template
//! geometry; entries already present in the event are transiently disabled
//! in the reference so only newly introduced pairs are checked.

use std::collections::HashSet;

use crate::types::{Arrival, WaveformStreamId};

/// Pairwise pick-offset matrix over a set of arrivals.
#[derive(Debug, Clone, Default)]
pub struct PickOffsetTable {
    stream_ids: Vec<WaveformStreamId>,
    enabled: Vec<bool>,
    /// Row-major `n x n` matrix of absolute offsets in seconds.
    offsets: Vec<f64>,
}

impl PickOffsetTable {
    /// Build the table from arrivals, in insertion order.
    pub fn from_arrivals(arrivals: &[Arrival]) -> Self {
        let n = arrivals.len();
        let mut offsets = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                offsets[i * n + j] =
                    (arrivals[i].pick.time - arrivals[j].pick.time).abs();
            }
        }
        Self {
            stream_ids: arrivals.iter().map(|a| a.pick.stream_id.clone()).collect(),
            enabled: vec![true; n],
            offsets,
        }
    }

    /// Number of arrivals in the table.
    pub fn len(&self) -> usize {
        self.stream_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream_ids.is_empty()
    }

    /// Absolute offset between entries `i` and `j`, in seconds.
    pub fn offset(&self, i: usize, j: usize) -> f64 {
        self.offsets[i * self.len() + j]
    }

    /// The maximum offset over all pairs of enabled entries. `None` when
    /// fewer than two entries are enabled.
    pub fn pick_offset(&self) -> Option<f64> {
        let n = self.len();
        let mut max: Option<f64> = None;
        for i in 0..n {
            if !self.enabled[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !self.enabled[j] {
                    continue;
                }
                let d = self.offset(i, j);
                max = Some(match max {
                    Some(m) if m >= d => m,
                    _ => d,
                });
            }
        }
        max
    }

    /// Re-enable every entry. Must be called after any transient
    /// [`disable`](Self::disable) before the table is used again.
    pub fn enable_all(&mut self) {
        self.enabled.fill(true);
    }

    /// Transiently disable all entries whose stream id is in `ids`.
    pub fn disable(&mut self, ids: &HashSet<WaveformStreamId>) {
        for (entry, id) in self.enabled.iter_mut().zip(&self.stream_ids) {
            if ids.contains(id) {
                *entry = false;
            }
        }
    }

    pub fn is_enabled(&self, i: usize) -> bool {
        self.enabled[i]
    }

    pub fn all_enabled(&self) -> bool {
        self.enabled.iter().all(|&e| e)
    }

    pub fn stream_ids(&self) -> &[WaveformStreamId] {
        &self.stream_ids
    }

    fn index_of(&self, id: &WaveformStreamId) -> Option<usize> {
        self.stream_ids.iter().position(|s| s == id)
    }
}

/// Compare a candidate POT against the reference POT.
///
/// For every pair of stream ids present in both tables and enabled in the
/// reference, the absolute difference of the two offsets must not exceed
/// `threshold` seconds. A negative threshold disables validation.
pub fn validate_pick_offsets(
    reference: &PickOffsetTable,
    candidate: &PickOffsetTable,
    threshold: f64,
) -> bool {
    if threshold < 0.0 {
        return true;
    }
    let n = candidate.len();
    for i in 0..n {
        let Some(ri) = reference.index_of(&candidate.stream_ids[i]) else {
            continue;
        };
        if !reference.is_enabled(ri) {
            continue;
        }
        for j in (i + 1)..n {
            let Some(rj) = reference.index_of(&candidate.stream_ids[j]) else {
                continue;
            };
            if !reference.is_enabled(rj) {
                continue;
            }
            if (candidate.offset(i, j) - reference.offset(ri, rj)).abs() > threshold {
                return false;
            }
        }
    }
    true
}
