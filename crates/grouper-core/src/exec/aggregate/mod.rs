//! Module: exec::aggregate
//! Responsibility: aggregate function specs and their mergeable, serializable states.
//! Does not own: group-key handling or grouping-path selection.
//! Boundary: the hash table, spill reconciler and driver only see `AccumulatorSet`.

mod set;
mod spec;
mod state;

#[cfg(test)]
mod tests;

pub use set::AccumulatorSet;
pub use spec::{AggregateKind, AggregateSpec};
