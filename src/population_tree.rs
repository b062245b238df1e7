//! Population tree: populations, migration bands and their derived timeline.
//!
//! Grounded on `examples/original_source/src/PopulationTree.cpp`
//! (`computeMigrationBandTimes`, `updateMigrationBandTimes`,
//! `initializeLivingMigBands`, `constructLivingMigBands`, `getMigBandByPops`),
//! reshaped as owned arenas indexed by [`PopulationId`]/[`MigBandId`] per the
//! teacher crate's row-indexed table idiom.

use std::fmt::Write as _;

use crate::ids::{MigBandId, PopulationId};
use crate::mig_band_timeline::{MigBandTimeline, TimeBand};

/// A single population in the tree. Immutable over the course of one MCMC step.
#[derive(Debug, Clone)]
pub struct Population {
    pub id: PopulationId,
    pub name: String,
    /// Divergence time toward the present.
    pub age: f64,
    /// Age of the oldest sample in this population, for ancient leaves.
    pub sample_age: f64,
    pub father: Option<PopulationId>,
    pub sons: Option<[PopulationId; 2]>,
    pub num_samples: u32,
    /// Scaled effective population size.
    pub theta: f64,
    pub in_mig_bands: Vec<MigBandId>,
    pub out_mig_bands: Vec<MigBandId>,
}

impl Population {
    pub fn is_leaf(&self) -> bool {
        self.sons.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.father.is_none()
    }
}

/// A directed migration band from `source` into `target`.
#[derive(Debug, Clone)]
pub struct MigrationBand {
    pub id: MigBandId,
    pub source: PopulationId,
    pub target: PopulationId,
    pub mig_rate: f64,
    pub start_time: f64,
    pub end_time: f64,
}

impl MigrationBand {
    /// A band collapses to a point when its span is non-positive (spec §3).
    pub fn is_degenerate(&self) -> bool {
        self.start_time >= self.end_time
    }
}

/// Immutable-per-step description of populations, their ancestry and bands.
pub struct PopulationTree {
    populations: Vec<Population>,
    mig_bands: Vec<MigrationBand>,
    /// Flat `numPops x numPops` ancestry bitmap, row-major, matching the
    /// original's `isAncestralArray`.
    ancestral: Vec<bool>,
    timeline: MigBandTimeline,
    root: PopulationId,
    num_cur_pops: usize,
}

impl PopulationTree {
    /// Builds a tree from populations (root-last or root-first, either is
    /// fine; ancestry and root are derived) and bands, then computes band
    /// times and the migration-band timeline.
    pub fn new(
        populations: Vec<Population>,
        mig_bands: Vec<MigrationBand>,
        num_cur_pops: usize,
    ) -> Self {
        let n = populations.len();
        let root = populations
            .iter()
            .find(|p| p.is_root())
            .map(|p| p.id)
            .expect("population tree must have exactly one root");

        let mut tree = Self {
            populations,
            mig_bands,
            ancestral: vec![false; n * n],
            timeline: MigBandTimeline::empty(n),
            root,
            num_cur_pops,
        };
        tree.fill_ancestry();
        tree.recompute_band_times();
        tree
    }

    pub fn num_pops(&self) -> usize {
        self.populations.len()
    }

    pub fn num_cur_pops(&self) -> usize {
        self.num_cur_pops
    }

    pub fn root(&self) -> PopulationId {
        self.root
    }

    pub fn population(&self, pop: PopulationId) -> &Population {
        &self.populations[pop.index()]
    }

    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    pub fn mig_band(&self, id: MigBandId) -> &MigrationBand {
        &self.mig_bands[id.index()]
    }

    pub fn mig_bands(&self) -> &[MigrationBand] {
        &self.mig_bands
    }

    /// Returns the band with the given source and target, if any.
    pub fn find_mig_band(&self, source: PopulationId, target: PopulationId) -> Option<MigBandId> {
        self.mig_bands
            .iter()
            .find(|b| b.source == source && b.target == target)
            .map(|b| b.id)
    }

    pub fn is_ancestral(&self, a: PopulationId, b: PopulationId) -> bool {
        self.ancestral[a.index() * self.num_pops() + b.index()]
    }

    /// The `TimeBand` live at `age` in `target`'s incoming timeline, if any.
    pub fn live_bands(&self, target: PopulationId, age: f64) -> Option<&TimeBand> {
        self.timeline.live_bands(target, age)
    }

    pub fn timeline(&self) -> &MigBandTimeline {
        &self.timeline
    }

    /// Populations in post-order (sons before father), root last.
    pub fn post_order(&self) -> Vec<PopulationId> {
        let mut order = Vec::with_capacity(self.num_pops());
        self.post_order_from(self.root, &mut order);
        order
    }

    fn post_order_from(&self, pop: PopulationId, out: &mut Vec<PopulationId>) {
        if let Some(sons) = self.population(pop).sons {
            self.post_order_from(sons[0], out);
            self.post_order_from(sons[1], out);
        }
        out.push(pop);
    }

    fn fill_ancestry(&mut self) {
        // Root-to-leaf traversal: a population is ancestral to itself and to
        // every population reachable by repeatedly following `sons`.
        let n = self.num_pops();
        for pop_idx in 0..n {
            let pop = PopulationId(pop_idx);
            self.mark_ancestral(pop, pop);
        }
    }

    fn mark_ancestral(&mut self, ancestor: PopulationId, pop: PopulationId) {
        let n = self.num_pops();
        self.ancestral[ancestor.index() * n + pop.index()] = true;
        if let Some(sons) = self.population(pop).sons {
            self.mark_ancestral(ancestor, sons[0]);
            self.mark_ancestral(ancestor, sons[1]);
        }
    }

    /// Recomputes every migration band's `[start, end]` span from its
    /// source/target ages, collapses degenerate bands to a point, and
    /// rebuilds the migration-band timeline. Returns the ids of bands that
    /// collapsed this call (informational `DegenerateBand`, never fatal).
    pub fn recompute_band_times(&mut self) -> Vec<MigBandId> {
        let mut degenerate = Vec::new();
        for band in &mut self.mig_bands {
            let source = &self.populations[band.source.index()];
            let target = &self.populations[band.target.index()];
            let start = source.age.max(target.age);
            let source_father_age = source
                .father
                .map(|f| self.populations[f.index()].age)
                .unwrap_or(f64::INFINITY);
            let target_father_age = target
                .father
                .map(|f| self.populations[f.index()].age)
                .unwrap_or(f64::INFINITY);
            let end = source_father_age.min(target_father_age);
            band.start_time = start;
            band.end_time = end;
            if band.is_degenerate() {
                let pinned = self.populations[band.target.index()].age;
                band.start_time = pinned;
                band.end_time = pinned;
                degenerate.push(band.id);
                log::debug!(
                    "migration band {} ({:?} -> {:?}) collapsed to a point at {}",
                    band.id,
                    band.source,
                    band.target,
                    pinned
                );
            }
        }
        self.timeline = MigBandTimeline::build(self.num_pops(), &self.mig_bands);
        degenerate
    }

    /// Human-readable dump mirroring `printPopulationTree`; used only from
    /// fatal-error paths and tests, never from normal control flow.
    pub fn dump(&self, w: &mut impl std::fmt::Write) -> std::fmt::Result {
        writeln!(w, "populations:")?;
        for pop in &self.populations {
            write!(
                w,
                "  pop {} ({}), age {}, theta {}, ",
                pop.id, pop.name, pop.age, pop.theta
            )?;
            match pop.father {
                Some(f) => write!(w, "father {}, ", f)?,
                None => write!(w, "ROOT, ")?,
            }
            match pop.sons {
                Some([a, b]) => write!(w, "sons ({}, {})", a, b)?,
                None => write!(w, "leaf")?,
            }
            writeln!(w)?;
        }
        if !self.mig_bands.is_empty() {
            writeln!(w, "migration bands:")?;
            for band in &self.mig_bands {
                let mut line = String::new();
                write!(
                    line,
                    "  band {} [{} -> {}] rate {} times [{}, {}]",
                    band.id,
                    band.source,
                    band.target,
                    band.mig_rate,
                    band.start_time,
                    band.end_time
                )
                .unwrap();
                writeln!(w, "{line}")?;
            }
        }
        Ok(())
    }
}
