//! Locus-embedded genealogy core for a coalescent/migration
//! population-genetics inference engine.
//!
//! Given a population tree with migration bands and a per-locus gene tree
//! whose branches carry zero or more migration events, this crate builds the
//! genealogy tree and per-population interval chains, and computes the
//! sufficient statistics from which a locus's log-likelihood contribution is
//! obtained. MCMC proposal construction, prior weighting, file parsing and
//! the sequence-likelihood calculator are out of scope; see each module's
//! docs for the external interfaces this core consumes.

pub mod error;
pub mod genealogy_tree;
pub mod ids;
pub mod interval_chains;
pub mod locus;
pub mod mig_band_timeline;
pub mod pop_interval;
pub mod population_tree;
pub mod stats;
pub mod stats_total;

pub use error::GenealogyError;
pub use genealogy_tree::{GenealogyTree, TreeNode};
pub use ids::{IntervalId, MigBandId, NodeId, PopulationId};
pub use interval_chains::IntervalChains;
pub use locus::{
    GenealogyConfig, LocusBranchData, LocusEmbeddedGenealogy, MigEvent, MigrationEventStream,
};
pub use mig_band_timeline::{MigBandTimeline, TimeBand};
pub use pop_interval::{IntervalType, PopInterval};
pub use population_tree::{MigrationBand, Population, PopulationTree};
pub use stats::{GenealogyStats, StatsEngine};
pub use stats_total::GenealogyStatsTotal;
