//! Newtype identifiers for the arenas owned by this crate.
//!
//! The teacher crate (`tskit`) wraps its C `tsk_id_t` row indices in newtypes
//! such as `NodeId` and `PopulationId`, using a `NULL` sentinel because it
//! bridges a C API. This crate has no C boundary, so the same newtype
//! pattern is kept but links that may be absent are spelled `Option<Id>`
//! rather than a magic sentinel value.

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }

        impl From<$name> for usize {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(
    /// Index into [`crate::population_tree::PopulationTree`]'s population array.
    PopulationId
);
arena_id!(
    /// Index into [`crate::population_tree::PopulationTree`]'s migration band array.
    MigBandId
);
arena_id!(
    /// Index into [`crate::genealogy_tree::GenealogyTree`]'s node arena.
    NodeId
);
arena_id!(
    /// Index into [`crate::interval_chains::IntervalChains`]'s interval pool.
    IntervalId
);
