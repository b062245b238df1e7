//! Per-target-population stratification of the time axis into bands with a
//! constant set of live migration bands.
//!
//! Grounded on `examples/original_source/src/PopulationTree.cpp`'s
//! `initializeLivingMigBands`/`constructLivingMigBands` (breakpoint collection
//! and pairing) and `getLiveMigBands` (the right-closed, left-open lookup
//! convention fixed by this crate's Open Question decision in SPEC_FULL.md §9).

use crate::ids::{MigBandId, PopulationId};
use crate::population_tree::MigrationBand;

/// A maximal time interval `(start, end]` over which the set of migration
/// bands incoming to a population does not change.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBand {
    pub start: f64,
    pub end: f64,
    pub live_bands: Vec<MigBandId>,
}

impl TimeBand {
    /// `(start, end]`: left-open, right-closed.
    pub fn contains(&self, age: f64) -> bool {
        age > self.start && age <= self.end
    }
}

/// `timelines[target.index()]` holds `target`'s incoming bands, sorted by
/// ascending `start`.
#[derive(Debug, Clone)]
pub struct MigBandTimeline {
    timelines: Vec<Vec<TimeBand>>,
}

impl MigBandTimeline {
    pub fn empty(num_pops: usize) -> Self {
        Self {
            timelines: vec![Vec::new(); num_pops],
        }
    }

    /// Rebuilds every population's timeline from scratch given the current
    /// migration bands. Bands already collapsed to a degenerate point
    /// contribute no breakpoints and are simply absent from every band.
    pub fn build(num_pops: usize, mig_bands: &[MigrationBand]) -> Self {
        let mut timelines = vec![Vec::new(); num_pops];

        for target_idx in 0..num_pops {
            let target = PopulationId(target_idx);
            let incoming: Vec<&MigrationBand> = mig_bands
                .iter()
                .filter(|b| b.target == target && !b.is_degenerate())
                .collect();
            if incoming.is_empty() {
                continue;
            }

            let mut breakpoints: Vec<f64> = incoming
                .iter()
                .flat_map(|b| [b.start_time, b.end_time])
                .collect();
            breakpoints.sort_by(|a, b| a.partial_cmp(b).unwrap());
            breakpoints.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

            let mut bands = Vec::with_capacity(breakpoints.len().saturating_sub(1));
            for pair in breakpoints.windows(2) {
                let (start, end) = (pair[0], pair[1]);
                let live_bands: Vec<MigBandId> = incoming
                    .iter()
                    .filter(|b| b.start_time <= start && end <= b.end_time)
                    .map(|b| b.id)
                    .collect();
                bands.push(TimeBand {
                    start,
                    end,
                    live_bands,
                });
            }
            timelines[target_idx] = bands;
        }

        Self { timelines }
    }

    pub fn live_bands(&self, target: PopulationId, age: f64) -> Option<&TimeBand> {
        self.timelines[target.index()]
            .iter()
            .find(|band| band.contains(age))
    }

    pub fn bands_for(&self, target: PopulationId) -> &[TimeBand] {
        &self.timelines[target.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(id: usize, source: usize, target: usize, start: f64, end: f64) -> MigrationBand {
        MigrationBand {
            id: MigBandId(id),
            source: PopulationId(source),
            target: PopulationId(target),
            mig_rate: 0.1,
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn single_band_yields_one_time_band() {
        let bands = vec![band(0, 1, 0, 0.0, 5.0)];
        let timeline = MigBandTimeline::build(2, &bands);
        let tb = timeline.live_bands(PopulationId(0), 2.5).unwrap();
        assert_eq!(tb.start, 0.0);
        assert_eq!(tb.end, 5.0);
        assert_eq!(tb.live_bands, vec![MigBandId(0)]);
    }

    #[test]
    fn overlapping_bands_split_into_distinct_time_bands() {
        let bands = vec![band(0, 1, 0, 0.0, 5.0), band(1, 2, 0, 2.0, 8.0)];
        let timeline = MigBandTimeline::build(3, &bands);
        let pop0 = timeline.bands_for(PopulationId(0));
        assert_eq!(pop0.len(), 3);
        assert_eq!(pop0[0].live_bands, vec![MigBandId(0)]);
        assert_eq!(pop0[1].live_bands, vec![MigBandId(0), MigBandId(1)]);
        assert_eq!(pop0[2].live_bands, vec![MigBandId(1)]);
    }

    #[test]
    fn boundary_age_is_right_closed() {
        let bands = vec![band(0, 1, 0, 0.0, 5.0)];
        let timeline = MigBandTimeline::build(2, &bands);
        assert!(timeline.live_bands(PopulationId(0), 5.0).is_some());
        assert!(timeline.live_bands(PopulationId(0), 0.0).is_none());
    }
}
