//! The per-locus façade: builds a genealogy tree and its interval chains
//! from external branch/migration data, and drives statistics over them.
//!
//! Grounded on `examples/original_source/src/LocusEmbeddedGenealogy.cpp`'s
//! constructor and `construct_genealogy_and_intervals`/`computeGenetreeStats`/
//! `recalcStats`/`printEmbeddedGenealogy`.

use crate::error::GenealogyError;
use crate::genealogy_tree::GenealogyTree;
use crate::ids::{NodeId, PopulationId};
use crate::interval_chains::IntervalChains;
use crate::pop_interval::IntervalType;
use crate::population_tree::PopulationTree;
use crate::stats::{GenealogyStats, StatsEngine};

/// The external view of a locus's branch topology and ages. Supplied by the
/// MCMC driver; this crate only reads it.
pub trait LocusBranchData {
    fn num_samples(&self) -> usize;
    fn node_pop(&self, node: usize) -> PopulationId;
    fn node_age(&self, node: usize) -> f64;
    fn node_father(&self, node: usize) -> Option<usize>;
    fn node_son(&self, node: usize, k: u8) -> Option<usize>;
}

/// One migration event on a branch.
#[derive(Debug, Clone, Copy)]
pub struct MigEvent {
    pub age: f64,
    pub source_pop: PopulationId,
    pub target_pop: PopulationId,
}

/// The external view of a branch's migration history, walked oldest-first.
pub trait MigrationEventStream {
    /// The first migration on `node`'s branch strictly after `after_age`, if
    /// any.
    fn find_first_mig(&self, node: usize, after_age: f64) -> Option<usize>;
    fn mig_event(&self, mig_id: usize) -> MigEvent;
}

/// Per-locus knobs; pool sizing and the debug shadow-recompute toggle.
#[derive(Debug, Clone, Copy)]
pub struct GenealogyConfig {
    /// Extra interval-pool slots beyond the minimum
    /// `leaves + internal + 2*migrations + 2*num_pops` bound, for safety
    /// margin across MCMC steps that grow the tree slightly.
    pub interval_pool_slack: usize,
    /// When set, every `compute_genetree_stats` call is cross-checked
    /// against an independently recomputed shadow copy (spec §9). Defaults
    /// to `cfg!(debug_assertions)`.
    pub shadow_check: bool,
}

impl Default for GenealogyConfig {
    fn default() -> Self {
        Self {
            interval_pool_slack: 4,
            shadow_check: cfg!(debug_assertions),
        }
    }
}

/// Aggregates one locus's genealogy, its interval chains, and the
/// population tree they were built against.
pub struct LocusEmbeddedGenealogy<'a> {
    locus_id: usize,
    pop_tree: &'a PopulationTree,
    genealogy: GenealogyTree,
    chains: IntervalChains,
    stats: Option<GenealogyStats>,
    config: GenealogyConfig,
}

impl<'a> LocusEmbeddedGenealogy<'a> {
    pub fn new(
        locus_id: usize,
        pop_tree: &'a PopulationTree,
        num_samples: usize,
        num_migrations_hint: usize,
        config: GenealogyConfig,
    ) -> Self {
        let capacity = 2 * num_samples.saturating_sub(1)
            + 2 * num_migrations_hint
            + 2 * pop_tree.num_pops()
            + config.interval_pool_slack;
        Self {
            locus_id,
            pop_tree,
            genealogy: GenealogyTree::new(),
            chains: IntervalChains::new(capacity, pop_tree.num_pops()),
            stats: None,
            config,
        }
    }

    pub fn locus_id(&self) -> usize {
        self.locus_id
    }

    pub fn genealogy(&self) -> &GenealogyTree {
        &self.genealogy
    }

    pub fn chains(&self) -> &IntervalChains {
        &self.chains
    }

    pub fn stats(&self) -> Option<&GenealogyStats> {
        self.stats.as_ref()
    }

    /// Rebuilds the genealogy tree and interval chains from scratch given
    /// this step's branch topology and migration history.
    pub fn construct_genealogy_and_intervals(
        &mut self,
        branch_data: &dyn LocusBranchData,
        mig_events: &dyn MigrationEventStream,
    ) -> Result<(), GenealogyError> {
        self.genealogy.reset();
        self.chains.reset_pop_intervals();
        self.chains.create_start_end_intervals(self.pop_tree)?;

        let num_samples = branch_data.num_samples();
        let total_nodes = 2 * num_samples - 1;
        let mut node_map: Vec<Option<NodeId>> = vec![None; total_nodes];
        let mut samples_created: Vec<bool> = vec![false; self.pop_tree.num_pops()];

        for old_idx in 0..total_nodes {
            let pop = branch_data.node_pop(old_idx);
            let age = branch_data.node_age(old_idx);
            let new_id = match (
                branch_data.node_son(old_idx, 0),
                branch_data.node_son(old_idx, 1),
            ) {
                (None, None) => {
                    let id = self.genealogy.add_leaf(pop, age);
                    if !samples_created[pop.index()] {
                        let iv =
                            self.chains
                                .create_interval(pop, age, IntervalType::SamplesStart)?;
                        self.chains.interval_mut(iv).tree_node = None;
                        samples_created[pop.index()] = true;
                    }
                    id
                }
                (Some(l), Some(r)) => {
                    let left = node_map[l].expect("sons constructed before their father");
                    let right = node_map[r].expect("sons constructed before their father");
                    let id = self.genealogy.add_coal(pop, age, left, right);
                    let iv = self.chains.create_interval(pop, age, IntervalType::Coal)?;
                    self.chains.interval_mut(iv).tree_node = Some(id);
                    match self.genealogy.node_mut(id) {
                        crate::genealogy_tree::TreeNode::Coal { coal_interval, .. } => {
                            *coal_interval = Some(iv);
                        }
                        _ => unreachable!(),
                    }
                    id
                }
                _ => {
                    return Err(GenealogyError::InconsistentTree {
                        reason: format!("node {old_idx} has exactly one son"),
                    })
                }
            };
            node_map[old_idx] = Some(new_id);
            if branch_data.node_father(old_idx).is_none() {
                self.genealogy.add_root(new_id);
            }
        }

        // Walk each branch's migration history, oldest-first, splicing in
        // Mig tree nodes and IN_MIG/OUT_MIG interval pairs.
        for (old_idx, entry) in node_map.iter().enumerate() {
            let mut current_top = entry.expect("node constructed above");
            let mut after_age = branch_data.node_age(old_idx);
            while let Some(mig_id) = mig_events.find_first_mig(old_idx, after_age) {
                let event = mig_events.mig_event(mig_id);
                let band = self
                    .pop_tree
                    .find_mig_band(event.source_pop, event.target_pop)
                    .ok_or(GenealogyError::InconsistentTree {
                        reason: format!(
                            "no migration band from {} to {} for node {old_idx}",
                            event.source_pop, event.target_pop
                        ),
                    })?;

                let out_iv = self.chains.create_interval(
                    event.source_pop,
                    event.age,
                    IntervalType::OutMig,
                )?;
                let in_iv = self.chains.create_interval(
                    event.target_pop,
                    event.age,
                    IntervalType::InMig,
                )?;

                let mig_node = self.genealogy.add_mig(
                    current_top,
                    event.source_pop,
                    event.target_pop,
                    event.age,
                    band,
                );
                self.chains.interval_mut(out_iv).tree_node = Some(mig_node);
                self.chains.interval_mut(in_iv).tree_node = Some(mig_node);
                match self.genealogy.node_mut(mig_node) {
                    crate::genealogy_tree::TreeNode::Mig {
                        out_mig_interval,
                        in_mig_interval,
                        ..
                    } => {
                        *out_mig_interval = Some(out_iv);
                        *in_mig_interval = Some(in_iv);
                    }
                    _ => unreachable!(),
                }

                current_top = mig_node;
                after_age = event.age;
            }
        }

        log::debug!(
            "locus {}: rebuilt genealogy with {} nodes, {} live intervals",
            self.locus_id,
            self.genealogy.len(),
            self.chains.live_count()
        );
        Ok(())
    }

    /// Full statistics recompute, with an optional debug shadow cross-check.
    pub fn compute_genetree_stats(&mut self) -> Result<&GenealogyStats, GenealogyError> {
        let num_samples_per_pop: Vec<u32> = self
            .pop_tree
            .populations()
            .iter()
            .map(|p| p.num_samples)
            .collect();
        let engine = StatsEngine::new(self.pop_tree);
        let stats = engine.compute_genetree_stats(
            &mut self.chains,
            &self.genealogy,
            &num_samples_per_pop,
        )?;

        if self.config.shadow_check {
            let shadow =
                engine.compute_genetree_stats_shadow(&self.genealogy, &num_samples_per_pop)?;
            let _ = engine.compute_log_likelihood(&stats, Some(&shadow))?;
        }

        self.stats = Some(stats);
        Ok(self.stats.as_ref().unwrap())
    }

    /// Recomputes just one population's statistics contribution in place.
    pub fn recalc_stats(&mut self, pop: PopulationId) -> Result<(), GenealogyError> {
        let num_samples = self.pop_tree.population(pop).num_samples;
        let engine = StatsEngine::new(self.pop_tree);
        let stats = self.stats.get_or_insert_with(|| {
            GenealogyStats::new(self.pop_tree.num_pops(), self.pop_tree.mig_bands().len())
        });
        engine.recalc_stats(&mut self.chains, &self.genealogy, stats, pop, num_samples)
    }

    /// Log-likelihood contribution of this locus under the current
    /// statistics.
    pub fn compute_log_likelihood(&self) -> Result<f64, GenealogyError> {
        let stats = self
            .stats
            .as_ref()
            .ok_or(GenealogyError::InconsistentTree {
                reason: "compute_genetree_stats must run before compute_log_likelihood".to_string(),
            })?;
        let engine = StatsEngine::new(self.pop_tree);
        engine.compute_log_likelihood(stats, None)
    }

    /// Debug dump of the population tree and interval chains, mirroring
    /// `printEmbeddedGenealogy`.
    pub fn dump(&self, w: &mut impl std::fmt::Write) -> std::fmt::Result {
        writeln!(w, "locus {}:", self.locus_id)?;
        self.pop_tree.dump(w)?;
        self.chains.dump(w, self.pop_tree)
    }
}
