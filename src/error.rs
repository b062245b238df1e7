//! Error taxonomy for the genealogy core.
//!
//! Mirrors the teacher crate's [`thiserror`](https://docs.rs/thiserror)-based
//! `TskitError`: one variant per failure kind, each carrying the context
//! needed to build the fatal dump described in spec §7. None of these are
//! retried by the caller; the driver decides whether to abort the step.

use crate::ids::{IntervalId, MigBandId, NodeId, PopulationId};

#[derive(Debug, thiserror::Error)]
pub enum GenealogyError {
    #[error("interval pool exhausted in population {pop} while creating a {kind} interval")]
    IntervalOverflow {
        pop: PopulationId,
        kind: &'static str,
    },

    #[error(
        "age {age} is outside the valid span ({lower}, {upper}) of population {pop} for a {kind} interval"
    )]
    InvalidAge {
        pop: PopulationId,
        age: f64,
        lower: f64,
        upper: f64,
        kind: &'static str,
    },

    #[error("inserting interval at age {age} into population {pop} would break age ordering (anchor {anchor:?})")]
    OrderingViolation {
        pop: PopulationId,
        age: f64,
        anchor: Option<IntervalId>,
    },

    #[error("genealogy tree is inconsistent: {reason}")]
    InconsistentTree { reason: String },

    #[error(
        "statistics mismatch: production and shadow computations of {what} differ by {diff} (tolerance 1e-10)"
    )]
    StatsMismatch { what: String, diff: f64 },

    #[error("node {node} has no tree-node mapping for migration band {band}")]
    UnknownMigBand { node: NodeId, band: MigBandId },
}
