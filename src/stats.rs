//! Sufficient statistics for one locus: coalescence counts and
//! lineage-time integrals per population, migration counts and
//! lineage-time integrals per migration band, and log-likelihood.
//!
//! Grounded on `examples/original_source/src/LocusPopIntervals.h`'s
//! `computeGenetreeStats`/`recalcStats`/`computeStatsDelta`/
//! `computeLogLikelihood`, and on spec.md §4's walk of a population's chain.

use crate::error::GenealogyError;
use crate::genealogy_tree::{GenealogyTree, TreeNode};
use crate::ids::{IntervalId, MigBandId, NodeId, PopulationId};
use crate::interval_chains::IntervalChains;
use crate::pop_interval::IntervalType;
use crate::population_tree::{MigrationBand, PopulationTree};

/// One locus's contribution to the genome-wide sufficient statistics.
#[derive(Debug, Clone)]
pub struct GenealogyStats {
    pub coal_stats: Vec<f64>,
    pub num_coals: Vec<u32>,
    pub mig_stats: Vec<f64>,
    pub num_migs: Vec<u32>,
}

impl GenealogyStats {
    pub fn new(num_pops: usize, num_bands: usize) -> Self {
        Self {
            coal_stats: vec![0.0; num_pops],
            num_coals: vec![0; num_pops],
            mig_stats: vec![0.0; num_bands],
            num_migs: vec![0; num_bands],
        }
    }

    /// Component-wise absolute difference against another statistics set,
    /// used by the debug shadow check. Returns the largest discrepancy found
    /// and a short label for it.
    fn max_diff(&self, other: &GenealogyStats) -> (f64, &'static str) {
        let mut worst = (0.0_f64, "coal_stats");

        for (a, b) in self.coal_stats.iter().zip(&other.coal_stats) {
            let diff = (a - b).abs();
            if diff > worst.0 {
                worst = (diff, "coal_stats");
            }
        }
        for (a, b) in self.mig_stats.iter().zip(&other.mig_stats) {
            let diff = (a - b).abs();
            if diff > worst.0 {
                worst = (diff, "mig_stats");
            }
        }
        for (a, b) in self.num_coals.iter().zip(&other.num_coals) {
            let diff = (*a as f64 - *b as f64).abs();
            if diff > worst.0 {
                worst = (diff, "num_coals");
            }
        }
        for (a, b) in self.num_migs.iter().zip(&other.num_migs) {
            let diff = (*a as f64 - *b as f64).abs();
            if diff > worst.0 {
                worst = (diff, "num_migs");
            }
        }
        worst
    }
}

const SHADOW_TOLERANCE: f64 = 1e-10;

/// Drives statistics computation over an [`IntervalChains`], given the
/// population tree it was built against.
pub struct StatsEngine<'a> {
    pop_tree: &'a PopulationTree,
}

impl<'a> StatsEngine<'a> {
    pub fn new(pop_tree: &'a PopulationTree) -> Self {
        Self { pop_tree }
    }

    /// Full recompute: walk populations in post-order, seed each POP_START's
    /// lineage count from its sons' POP_END counts (0 for leaves), then
    /// `recalc` each population's chain. Mirrors `computeGenetreeStats`.
    pub fn compute_genetree_stats(
        &self,
        chains: &mut IntervalChains,
        genealogy: &GenealogyTree,
        num_samples_per_pop: &[u32],
    ) -> Result<GenealogyStats, GenealogyError> {
        let mut stats =
            GenealogyStats::new(self.pop_tree.num_pops(), self.pop_tree.mig_bands().len());
        for pop in self.pop_tree.post_order() {
            let seed = match self.pop_tree.population(pop).sons {
                None => 0,
                Some([l, r]) => {
                    let l_end = chains.pop_end(l).expect("start/end intervals not created");
                    let r_end = chains.pop_end(r).expect("start/end intervals not created");
                    chains.interval(l_end).num_lineages + chains.interval(r_end).num_lineages
                }
            };
            let start = chains
                .pop_start(pop)
                .expect("start/end intervals not created");
            chains.interval_mut(start).num_lineages = seed;
            self.recalc_stats(
                chains,
                genealogy,
                &mut stats,
                pop,
                num_samples_per_pop[pop.index()],
            )?;
        }

        // Lineage-count closure: every sampled lineage must have coalesced
        // into a single ancestor by the time it reaches the global root's
        // POP_END.
        let root = self.pop_tree.root();
        let root_end = chains
            .pop_end(root)
            .expect("start/end intervals not created");
        let surviving = chains.interval(root_end).num_lineages;
        if surviving != 1 {
            return Err(GenealogyError::InconsistentTree {
                reason: format!(
                    "genealogy does not fully coalesce: {surviving} lineage(s) remain at the root's POP_END"
                ),
            });
        }
        Ok(stats)
    }

    /// Independent cross-check for the debug shadow comparison (spec §9):
    /// recomputes the same sufficient statistics directly from the
    /// genealogy tree's branch events, bypassing `IntervalChains` entirely
    /// (no `PopInterval`, no pool, no cursor walk over a pre-linked chain).
    /// Each tree node contributes a `(age, event)` entry to its own
    /// population's event list; those lists are sorted and swept
    /// independently of however `construct_genealogy_and_intervals` wired
    /// the chains, so a splicing or linking bug there need not reproduce
    /// here. A real discrepancy between the two surfaces as
    /// `GenealogyError::StatsMismatch` in `compute_log_likelihood`.
    pub fn compute_genetree_stats_shadow(
        &self,
        genealogy: &GenealogyTree,
        num_samples_per_pop: &[u32],
    ) -> Result<GenealogyStats, GenealogyError> {
        #[derive(Clone, Copy)]
        enum Event {
            SamplesStart,
            Coal,
            InMig,
            OutMig(MigBandId),
        }

        let num_pops = self.pop_tree.num_pops();
        let mut stats =
            GenealogyStats::new(num_pops, self.pop_tree.mig_bands().len());
        let mut events: Vec<Vec<(f64, Event)>> = vec![Vec::new(); num_pops];
        let mut samples_seeded = vec![false; num_pops];

        for idx in 0..genealogy.len() {
            match genealogy.node(NodeId::from(idx)) {
                TreeNode::Leaf { pop, age, .. } => {
                    if !samples_seeded[pop.index()] {
                        events[pop.index()].push((*age, Event::SamplesStart));
                        samples_seeded[pop.index()] = true;
                    }
                }
                TreeNode::Coal { pop, age, .. } => {
                    events[pop.index()].push((*age, Event::Coal));
                }
                TreeNode::Mig {
                    source,
                    target,
                    age,
                    mig_band,
                    ..
                } => {
                    events[source.index()].push((*age, Event::OutMig(*mig_band)));
                    events[target.index()].push((*age, Event::InMig));
                }
            }
        }
        for list in &mut events {
            list.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        }

        let mut end_counts = vec![0u32; num_pops];
        for pop in self.pop_tree.post_order() {
            let population = self.pop_tree.population(pop);
            let mut n: u32 = match population.sons {
                None => 0,
                Some([l, r]) => end_counts[l.index()] + end_counts[r.index()],
            };
            let out_bands: Vec<&MigrationBand> = self
                .pop_tree
                .mig_bands()
                .iter()
                .filter(|b| b.source == pop && !b.is_degenerate())
                .collect();

            let lower = population.age;
            let upper = population
                .father
                .map(|f| self.pop_tree.population(f).age)
                .unwrap_or(f64::INFINITY);

            let mut prev_age = lower;
            let steps: Vec<(f64, Option<Event>)> = events[pop.index()]
                .iter()
                .map(|&(age, ev)| (age, Some(ev)))
                .chain(std::iter::once((upper, None)))
                .collect();
            for (age, ev) in steps {
                let dt = age - prev_age;
                let pairs = n as u64 * n.saturating_sub(1) as u64;
                if pairs != 0 {
                    stats.coal_stats[pop.index()] += dt * pairs as f64;
                }
                if n > 0 {
                    for band in &out_bands {
                        for time_band in self.pop_tree.timeline().bands_for(band.target) {
                            if !time_band.live_bands.contains(&band.id) {
                                continue;
                            }
                            let lo = prev_age.max(time_band.start);
                            let hi = age.min(time_band.end);
                            if hi > lo {
                                stats.mig_stats[band.id.index()] += n as f64 * (hi - lo);
                            }
                        }
                    }
                }
                match ev {
                    Some(Event::SamplesStart) => n += num_samples_per_pop[pop.index()],
                    Some(Event::Coal) => {
                        n -= 1;
                        stats.num_coals[pop.index()] += 1;
                    }
                    Some(Event::OutMig(band)) => {
                        n -= 1;
                        stats.num_migs[band.index()] += 1;
                    }
                    Some(Event::InMig) => n += 1,
                    None => {}
                }
                prev_age = age;
            }
            end_counts[pop.index()] = n;
        }

        let root = self.pop_tree.root();
        let surviving = end_counts[root.index()];
        if surviving != 1 {
            return Err(GenealogyError::InconsistentTree {
                reason: format!(
                    "genealogy does not fully coalesce (shadow check): {surviving} lineage(s) remain at the root"
                ),
            });
        }
        Ok(stats)
    }

    /// Walks `pop`'s chain from POP_START to POP_END, accumulating
    /// `coal_stats`/`mig_stats` into `stats` and updating each interval's
    /// `num_lineages`. Mirrors `recalcStats`.
    ///
    /// Migration exposure is integrated continuously, not just at the event
    /// itself: for every band departing `pop`, every sub-portion of every
    /// step during which that band is live (per the migration-band timeline)
    /// contributes `n * dt_inside` to `mig_stats[band]`, whether or not a
    /// lineage actually crosses that band during this chain.
    pub fn recalc_stats(
        &self,
        chains: &mut IntervalChains,
        genealogy: &GenealogyTree,
        stats: &mut GenealogyStats,
        pop: PopulationId,
        num_samples: u32,
    ) -> Result<(), GenealogyError> {
        let out_bands: Vec<&MigrationBand> = self
            .pop_tree
            .mig_bands()
            .iter()
            .filter(|b| b.source == pop && !b.is_degenerate())
            .collect();

        let ids: Vec<IntervalId> = chains.chain(pop).collect();
        let mut n = chains.interval(ids[0]).num_lineages;
        let mut prev_age = chains.interval(ids[0]).age;

        for window in ids.windows(2) {
            let cur_id = window[1];
            let cur_age = chains.interval(cur_id).age;
            let dt = cur_age - prev_age;
            let pairs = n as u64 * n.saturating_sub(1) as u64;
            let pair_time = if pairs == 0 { 0.0 } else { dt * pairs as f64 };
            stats.coal_stats[pop.index()] += pair_time;

            if n > 0 {
                for band in &out_bands {
                    for time_band in self.pop_tree.timeline().bands_for(band.target) {
                        if !time_band.live_bands.contains(&band.id) {
                            continue;
                        }
                        let lo = prev_age.max(time_band.start);
                        let hi = cur_age.min(time_band.end);
                        if hi > lo {
                            stats.mig_stats[band.id.index()] += n as f64 * (hi - lo);
                        }
                    }
                }
            }

            match chains.interval(cur_id).kind {
                IntervalType::SamplesStart => n += num_samples,
                IntervalType::Coal => {
                    n -= 1;
                    stats.num_coals[pop.index()] += 1;
                }
                IntervalType::OutMig => {
                    n -= 1;
                    let band = self.band_of(chains, genealogy, cur_id)?;
                    stats.num_migs[band.index()] += 1;
                }
                IntervalType::InMig => n += 1,
                IntervalType::PopStart | IntervalType::PopEnd => {}
            }
            chains.interval_mut(cur_id).num_lineages = n;
            prev_age = cur_age;
        }

        Ok(())
    }

    /// The migration band an IN_MIG interval's back-referenced tree node
    /// belongs to.
    fn band_of(
        &self,
        chains: &IntervalChains,
        genealogy: &GenealogyTree,
        interval: IntervalId,
    ) -> Result<MigBandId, GenealogyError> {
        let iv = chains.interval(interval);
        let node = iv.tree_node.ok_or(GenealogyError::InconsistentTree {
            reason: format!("in-mig interval {interval} has no tree-node back-reference"),
        })?;
        match genealogy.node(node) {
            TreeNode::Mig { mig_band, .. } => Ok(*mig_band),
            _ => Err(GenealogyError::UnknownMigBand {
                node,
                band: MigBandId(0),
            }),
        }
    }

    /// Localized delta update after a prune-and-regraft style edit: only the
    /// branch between `bottom` and `top` changed lineage count by
    /// `delta_n_lin`. Mirrors `computeStatsDelta`.
    pub fn compute_stats_delta(
        &self,
        chains: &mut IntervalChains,
        stats: &mut GenealogyStats,
        pop: PopulationId,
        bottom: IntervalId,
        top: IntervalId,
        delta_n_lin: i32,
    ) {
        let mut cursor = bottom;
        loop {
            let (age, next) = {
                let iv = chains.interval(cursor);
                (iv.age, iv.next)
            };
            let next = match next {
                Some(n) => n,
                None => break,
            };
            let next_age = chains.interval(next).age;
            let dt = next_age - age;
            // Undo the old contribution, recompute with the shifted count.
            let n_before = chains.interval(cursor).num_lineages;
            let n_after = (n_before as i64 + delta_n_lin as i64).max(0) as u32;
            let old = dt * (n_before as f64) * (n_before.saturating_sub(1) as f64);
            let new = dt * (n_after as f64) * (n_after.saturating_sub(1) as f64);
            stats.coal_stats[pop.index()] += new - old;
            chains.interval_mut(cursor).num_lineages = n_after;

            if cursor == top {
                break;
            }
            cursor = next;
        }
    }

    /// `sum_p [num_coals[p]*ln(2/theta[p]) - coal_stats[p]/theta[p]]
    /// - sum_b [mig_stats[b]*mig_rate[b] - num_migs[b]*ln(mig_rate[b])]`
    /// log-likelihood contribution for this locus, optionally cross-checked
    /// against statistics computed independently by `shadow`.
    pub fn compute_log_likelihood(
        &self,
        stats: &GenealogyStats,
        shadow: Option<&GenealogyStats>,
    ) -> Result<f64, GenealogyError> {
        if let Some(shadow) = shadow {
            let (diff, what) = stats.max_diff(shadow);
            if diff > SHADOW_TOLERANCE {
                return Err(GenealogyError::StatsMismatch {
                    what: what.to_string(),
                    diff,
                });
            }
        }

        let mut log_likelihood = 0.0;
        for pop in self.pop_tree.populations() {
            if pop.theta > 0.0 {
                log_likelihood -= stats.coal_stats[pop.id.index()] / pop.theta;
                log_likelihood += (stats.num_coals[pop.id.index()] as f64) * (2.0 / pop.theta).ln();
            }
        }
        for band in self.pop_tree.mig_bands() {
            if band.mig_rate > 0.0 {
                log_likelihood -= stats.mig_stats[band.id.index()] * band.mig_rate;
                log_likelihood += (stats.num_migs[band.id.index()] as f64) * band.mig_rate.ln();
            }
        }
        Ok(log_likelihood)
    }
}
