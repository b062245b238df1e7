//! Per-population doubly-linked interval chains, backed by an arena with an
//! explicit free-list pool.
//!
//! Grounded on `examples/original_source/src/LocusPopIntervals.h`
//! (`intervalsArray_`/`pIntervalsPool_`, `createInterval`/
//! `createIntervalBefore`, `linkIntervals`/`createStartEndIntervals`,
//! `getIntervalFromPool`/`returnToPool`), reshaped per the spec's arena
//! redesign: `slots: Vec<Slot>` where a free slot stores the index of the
//! next free slot instead of a pointer, so the whole pool lives in one
//! contiguous allocation.

use crate::error::GenealogyError;
use crate::ids::{IntervalId, PopulationId};
use crate::pop_interval::{IntervalType, PopInterval};
use crate::population_tree::PopulationTree;

enum Slot {
    Free(Option<IntervalId>),
    Occupied(PopInterval),
}

/// Owns every [`PopInterval`] for one locus, arranged as one chain per
/// population, joined across population boundaries at shared sentinels.
pub struct IntervalChains {
    slots: Vec<Slot>,
    free_head: Option<IntervalId>,
    live_count: usize,
    pop_start: Vec<Option<IntervalId>>,
    pop_end: Vec<Option<IntervalId>>,
    samples_start: Vec<Option<IntervalId>>,
}

impl IntervalChains {
    /// `capacity` bounds the working set: leaves + internal nodes +
    /// 2 * migrations + 2 * num_pops sentinels, per spec §4.
    pub fn new(capacity: usize, num_pops: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            let next = if i + 1 < capacity {
                Some(IntervalId(i + 1))
            } else {
                None
            };
            slots.push(Slot::Free(next));
        }
        Self {
            slots,
            free_head: if capacity > 0 {
                Some(IntervalId(0))
            } else {
                None
            },
            live_count: 0,
            pop_start: vec![None; num_pops],
            pop_end: vec![None; num_pops],
            samples_start: vec![None; num_pops],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn interval(&self, id: IntervalId) -> &PopInterval {
        match &self.slots[id.index()] {
            Slot::Occupied(iv) => iv,
            Slot::Free(_) => panic!("interval {id} is not occupied"),
        }
    }

    pub fn interval_mut(&mut self, id: IntervalId) -> &mut PopInterval {
        match &mut self.slots[id.index()] {
            Slot::Occupied(iv) => iv,
            Slot::Free(_) => panic!("interval {id} is not occupied"),
        }
    }

    pub fn pop_start(&self, pop: PopulationId) -> Option<IntervalId> {
        self.pop_start[pop.index()]
    }

    pub fn pop_end(&self, pop: PopulationId) -> Option<IntervalId> {
        self.pop_end[pop.index()]
    }

    pub fn samples_start(&self, pop: PopulationId) -> Option<IntervalId> {
        self.samples_start[pop.index()]
    }

    /// Returns every non-sentinel interval to the pool, retaining the arena
    /// and the sentinel ids (which `create_start_end_intervals` rebuilds).
    pub fn reset_pop_intervals(&mut self) {
        for i in 0..self.slots.len() {
            let next = if i + 1 < self.slots.len() {
                Some(IntervalId(i + 1))
            } else {
                None
            };
            self.slots[i] = Slot::Free(next);
        }
        self.free_head = if self.slots.is_empty() {
            None
        } else {
            Some(IntervalId(0))
        };
        self.live_count = 0;
        self.pop_start.iter_mut().for_each(|v| *v = None);
        self.pop_end.iter_mut().for_each(|v| *v = None);
        self.samples_start.iter_mut().for_each(|v| *v = None);
    }

    fn get_from_pool(
        &mut self,
        pop: PopulationId,
        kind: &'static str,
    ) -> Result<IntervalId, GenealogyError> {
        let id = self
            .free_head
            .ok_or(GenealogyError::IntervalOverflow { pop, kind })?;
        let next = match &self.slots[id.index()] {
            Slot::Free(next) => *next,
            Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
        };
        self.free_head = next;
        self.live_count += 1;
        Ok(id)
    }

    fn return_to_pool(&mut self, id: IntervalId) {
        self.slots[id.index()] = Slot::Free(self.free_head);
        self.free_head = Some(id);
        self.live_count -= 1;
    }

    /// Allocates POP_START and POP_END sentinels for every population,
    /// linking the son's POP_END to the father's POP_START per spec §3 (a
    /// linkage via index, not pointer aliasing).
    pub fn create_start_end_intervals(
        &mut self,
        pop_tree: &PopulationTree,
    ) -> Result<(), GenealogyError> {
        for pop in pop_tree.populations() {
            let start_id = self.get_from_pool(pop.id, "pop_start")?;
            self.slots[start_id.index()] =
                Slot::Occupied(PopInterval::new(pop.id, pop.age, IntervalType::PopStart));

            let end_age = pop
                .father
                .map(|f| pop_tree.population(f).age)
                .unwrap_or(f64::INFINITY);
            let end_id = self.get_from_pool(pop.id, "pop_end")?;
            self.slots[end_id.index()] =
                Slot::Occupied(PopInterval::new(pop.id, end_age, IntervalType::PopEnd));

            self.interval_mut(start_id).next = Some(end_id);
            self.interval_mut(end_id).prev = Some(start_id);
            self.pop_start[pop.id.index()] = Some(start_id);
            self.pop_end[pop.id.index()] = Some(end_id);
        }
        for pop in pop_tree.populations() {
            if let Some(father) = pop.father {
                let end_id = self.pop_end[pop.id.index()].unwrap();
                let father_start = self.pop_start[father.index()].unwrap();
                self.interval_mut(end_id).next = Some(father_start);
            }
        }
        Ok(())
    }

    /// Finds the insertion point in `pop`'s chain for `(age, kind)` by
    /// walking from POP_START, and inserts there. Errors if age falls
    /// outside the population's span.
    pub fn create_interval(
        &mut self,
        pop: PopulationId,
        age: f64,
        kind: IntervalType,
    ) -> Result<IntervalId, GenealogyError> {
        let start = self.pop_start[pop.index()].expect("create_start_end_intervals not called");
        let end = self.pop_end[pop.index()].expect("create_start_end_intervals not called");

        let lower = self.interval(start).age;
        let upper = self.interval(end).age;
        let on_boundary = match kind {
            // Migration events may not land exactly on a population boundary
            // (spec §9's resolution of an Open Question): the event would be
            // ambiguously assignable to either the ending or the starting
            // population.
            IntervalType::InMig | IntervalType::OutMig => age <= lower || age >= upper,
            _ => age < lower || age > upper,
        };
        if on_boundary {
            return Err(GenealogyError::InvalidAge {
                pop,
                age,
                lower,
                upper,
                kind: kind.kind_str(),
            });
        }

        let mut cursor = start;
        loop {
            let next = self
                .interval(cursor)
                .next
                .expect("chain must end at POP_END");
            if next == end {
                return self.insert_before(next, pop, age, kind);
            }
            let next_iv = self.interval(next);
            if (next_iv.age, next_iv.kind.tie_break_rank()) > (age, kind.tie_break_rank()) {
                return self.insert_before(next, pop, age, kind);
            }
            cursor = next;
        }
    }

    /// Inserts a new interval immediately before `anchor`, without searching
    /// for its position. Used when the caller already knows the exact
    /// location (e.g. splicing a migration pair along a branch already being
    /// walked in age order).
    pub fn create_interval_before(
        &mut self,
        anchor: IntervalId,
        pop: PopulationId,
        age: f64,
        kind: IntervalType,
    ) -> Result<IntervalId, GenealogyError> {
        let prev = self.interval(anchor).prev;
        if let Some(prev) = prev {
            let prev_age = self.interval(prev).age;
            if age < prev_age {
                return Err(GenealogyError::OrderingViolation {
                    pop,
                    age,
                    anchor: Some(anchor),
                });
            }
        }
        self.insert_before(anchor, pop, age, kind)
    }

    fn insert_before(
        &mut self,
        anchor: IntervalId,
        pop: PopulationId,
        age: f64,
        kind: IntervalType,
    ) -> Result<IntervalId, GenealogyError> {
        let prev = self.interval(anchor).prev;
        let id = self.get_from_pool(pop, kind.kind_str())?;
        self.slots[id.index()] = Slot::Occupied(PopInterval::new(pop, age, kind));
        self.interval_mut(id).prev = prev;
        self.interval_mut(id).next = Some(anchor);
        if let Some(prev) = prev {
            self.interval_mut(prev).next = Some(id);
        }
        self.interval_mut(anchor).prev = Some(id);
        if kind == IntervalType::SamplesStart {
            self.samples_start[pop.index()] = Some(id);
        }
        Ok(id)
    }

    /// Removes `id` from its chain and returns it to the pool.
    pub fn remove_interval(&mut self, id: IntervalId) {
        let (prev, next) = {
            let iv = self.interval(id);
            (iv.prev, iv.next)
        };
        if let Some(prev) = prev {
            self.interval_mut(prev).next = next;
        }
        if let Some(next) = next {
            self.interval_mut(next).prev = prev;
        }
        self.return_to_pool(id);
    }

    /// Iterates a population's chain from POP_START to POP_END, inclusive.
    pub fn chain(&self, pop: PopulationId) -> impl Iterator<Item = IntervalId> + '_ {
        let mut cursor = self.pop_start[pop.index()];
        let end = self.pop_end[pop.index()];
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = if Some(current) == end {
                None
            } else {
                self.interval(current).next
            };
            Some(current)
        })
    }

    /// Dumps every population's chain, mirroring `printIntervals`.
    pub fn dump(
        &self,
        w: &mut impl std::fmt::Write,
        pop_tree: &PopulationTree,
    ) -> std::fmt::Result {
        for pop in pop_tree.populations() {
            write!(w, "pop {}: ", pop.id)?;
            for id in self.chain(pop.id) {
                let iv = self.interval(id);
                write!(w, "[{:?}@{} n={}] ", iv.kind, iv.age, iv.num_lineages)?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

impl IntervalType {
    fn kind_str(self) -> &'static str {
        match self {
            IntervalType::PopStart => "pop_start",
            IntervalType::SamplesStart => "samples_start",
            IntervalType::Coal => "coal",
            IntervalType::InMig => "in_mig",
            IntervalType::OutMig => "out_mig",
            IntervalType::PopEnd => "pop_end",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population_tree::Population;

    fn two_leaf_tree() -> PopulationTree {
        let pops = vec![
            Population {
                id: PopulationId(0),
                name: "a".into(),
                age: 0.0,
                sample_age: 0.0,
                father: Some(PopulationId(2)),
                sons: None,
                num_samples: 1,
                theta: 0.01,
                in_mig_bands: vec![],
                out_mig_bands: vec![],
            },
            Population {
                id: PopulationId(1),
                name: "b".into(),
                age: 0.0,
                sample_age: 0.0,
                father: Some(PopulationId(2)),
                sons: None,
                num_samples: 1,
                theta: 0.01,
                in_mig_bands: vec![],
                out_mig_bands: vec![],
            },
            Population {
                id: PopulationId(2),
                name: "root".into(),
                age: 2.0,
                sample_age: 0.0,
                father: None,
                sons: Some([PopulationId(0), PopulationId(1)]),
                num_samples: 0,
                theta: 0.01,
                in_mig_bands: vec![],
                out_mig_bands: vec![],
            },
        ];
        PopulationTree::new(pops, vec![], 2)
    }

    #[test]
    fn start_end_sentinels_link_son_to_father() {
        let pop_tree = two_leaf_tree();
        let mut chains = IntervalChains::new(16, pop_tree.num_pops());
        chains.create_start_end_intervals(&pop_tree).unwrap();

        let son_end = chains.pop_end(PopulationId(0)).unwrap();
        let father_start = chains.pop_start(PopulationId(2)).unwrap();
        assert_eq!(chains.interval(son_end).next, Some(father_start));
    }

    #[test]
    fn create_interval_inserts_in_age_order() {
        let pop_tree = two_leaf_tree();
        let mut chains = IntervalChains::new(16, pop_tree.num_pops());
        chains.create_start_end_intervals(&pop_tree).unwrap();

        chains
            .create_interval(PopulationId(0), 0.0, IntervalType::SamplesStart)
            .unwrap();
        let coal = chains
            .create_interval(PopulationId(0), 1.0, IntervalType::Coal)
            .unwrap();

        let chain: Vec<_> = chains
            .chain(PopulationId(0))
            .map(|id| chains.interval(id).kind)
            .collect();
        assert_eq!(
            chain,
            vec![
                IntervalType::PopStart,
                IntervalType::SamplesStart,
                IntervalType::Coal,
                IntervalType::PopEnd
            ]
        );
        assert_eq!(chains.interval(coal).age, 1.0);
    }

    #[test]
    fn age_outside_population_span_is_rejected() {
        let pop_tree = two_leaf_tree();
        let mut chains = IntervalChains::new(16, pop_tree.num_pops());
        chains.create_start_end_intervals(&pop_tree).unwrap();

        let err = chains
            .create_interval(PopulationId(0), 5.0, IntervalType::Coal)
            .unwrap_err();
        assert!(matches!(err, GenealogyError::InvalidAge { .. }));
    }

    #[test]
    fn migration_event_on_population_boundary_is_rejected() {
        let pop_tree = two_leaf_tree();
        let mut chains = IntervalChains::new(16, pop_tree.num_pops());
        chains.create_start_end_intervals(&pop_tree).unwrap();

        let err = chains
            .create_interval(PopulationId(0), 0.0, IntervalType::OutMig)
            .unwrap_err();
        assert!(matches!(err, GenealogyError::InvalidAge { .. }));

        let err = chains
            .create_interval(PopulationId(0), 2.0, IntervalType::InMig)
            .unwrap_err();
        assert!(matches!(err, GenealogyError::InvalidAge { .. }));
    }

    #[test]
    fn non_migration_interval_may_sit_on_population_start() {
        let pop_tree = two_leaf_tree();
        let mut chains = IntervalChains::new(16, pop_tree.num_pops());
        chains.create_start_end_intervals(&pop_tree).unwrap();

        chains
            .create_interval(PopulationId(0), 0.0, IntervalType::SamplesStart)
            .unwrap();
    }

    #[test]
    fn pool_exhaustion_is_reported() {
        let pop_tree = two_leaf_tree();
        let mut chains = IntervalChains::new(4, pop_tree.num_pops());
        let err = chains.create_start_end_intervals(&pop_tree).unwrap_err();
        assert!(matches!(err, GenealogyError::IntervalOverflow { .. }));
    }
}
