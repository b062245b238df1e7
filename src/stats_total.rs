//! Genome-wide aggregation of per-locus statistics.
//!
//! The original's `genealogy_stats_total` is a set of global mutable arrays
//! updated by whichever thread finishes a locus; this crate makes that
//! sharing explicit with a `parking_lot::Mutex` (grounded in
//! `MaelLefeuvre-grups-rs`'s use of `parking_lot` for its shared state)
//! instead of a bare global.

use parking_lot::Mutex;

use crate::stats::GenealogyStats;

struct Totals {
    coal_stats: Vec<f64>,
    num_coals: Vec<u32>,
    mig_stats: Vec<f64>,
    num_migs: Vec<u32>,
}

/// Thread-safe running sum of every locus's [`GenealogyStats`].
pub struct GenealogyStatsTotal {
    totals: Mutex<Totals>,
}

impl GenealogyStatsTotal {
    pub fn new(num_pops: usize, num_bands: usize) -> Self {
        Self {
            totals: Mutex::new(Totals {
                coal_stats: vec![0.0; num_pops],
                num_coals: vec![0; num_pops],
                mig_stats: vec![0.0; num_bands],
                num_migs: vec![0; num_bands],
            }),
        }
    }

    /// Adds one locus's statistics into the running total.
    pub fn add(&self, delta: &GenealogyStats) {
        let mut totals = self.totals.lock();
        for (t, d) in totals.coal_stats.iter_mut().zip(&delta.coal_stats) {
            *t += d;
        }
        for (t, d) in totals.num_coals.iter_mut().zip(&delta.num_coals) {
            *t += d;
        }
        for (t, d) in totals.mig_stats.iter_mut().zip(&delta.mig_stats) {
            *t += d;
        }
        for (t, d) in totals.num_migs.iter_mut().zip(&delta.num_migs) {
            *t += d;
        }
    }

    /// Removes one locus's previously-added statistics, e.g. before
    /// re-adding an updated version of the same locus.
    pub fn subtract(&self, delta: &GenealogyStats) {
        let mut totals = self.totals.lock();
        for (t, d) in totals.coal_stats.iter_mut().zip(&delta.coal_stats) {
            *t -= d;
        }
        for (t, d) in totals.num_coals.iter_mut().zip(&delta.num_coals) {
            *t -= d;
        }
        for (t, d) in totals.mig_stats.iter_mut().zip(&delta.mig_stats) {
            *t -= d;
        }
        for (t, d) in totals.num_migs.iter_mut().zip(&delta.num_migs) {
            *t -= d;
        }
    }

    /// Snapshot of the current totals as a standalone `GenealogyStats`.
    pub fn snapshot(&self) -> GenealogyStats {
        let totals = self.totals.lock();
        GenealogyStats {
            coal_stats: totals.coal_stats.clone(),
            num_coals: totals.num_coals.clone(),
            mig_stats: totals.mig_stats.clone(),
            num_migs: totals.num_migs.clone(),
        }
    }
}
