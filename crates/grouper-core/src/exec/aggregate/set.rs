use crate::{
    error::InternalError,
    exec::{
        aggregate::{AggregateSpec, state::AggregateState},
        row::Row,
    },
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::mem::size_of;

///
/// AccumulatorSet
///
/// One state per aggregate call of a GROUP BY, in call order.
/// Sets are created, merged and finalized against the same spec list.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AccumulatorSet {
    states: Vec<AggregateState>,
}

impl AccumulatorSet {
    /// Fresh, empty states for `specs`.
    #[must_use]
    pub fn new(specs: &[AggregateSpec]) -> Self {
        Self {
            states: specs
                .iter()
                .map(AggregateState::new)
                .collect(),
        }
    }

    /// Fold one input row into every state.
    pub fn accumulate(&mut self, specs: &[AggregateSpec], row: &Row) -> Result<(), InternalError> {
        self.check_width(specs.len())?;

        for (state, spec) in self.states.iter_mut().zip(specs) {
            let input = spec.input_value(row)?;
            state.accumulate(spec, input)?;
        }

        Ok(())
    }

    /// Merge another partial set for the same spec list into this one.
    pub fn merge(&mut self, other: Self) -> Result<(), InternalError> {
        self.check_width(other.states.len())?;

        for (state, incoming) in self.states.iter_mut().zip(other.states) {
            state.merge(incoming)?;
        }

        Ok(())
    }

    /// Consume the set, producing one output value per aggregate.
    pub fn finalize(self, specs: &[AggregateSpec]) -> Result<Vec<Value>, InternalError> {
        self.check_width(specs.len())?;

        self.states
            .into_iter()
            .zip(specs)
            .map(|(state, spec)| state.finalize(spec))
            .collect()
    }

    #[must_use]
    pub fn estimated_size(&self) -> usize {
        self.states
            .iter()
            .map(AggregateState::estimated_size)
            .fold(size_of::<Self>(), usize::saturating_add)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn check_width(&self, expected: usize) -> Result<(), InternalError> {
        if self.states.len() == expected {
            Ok(())
        } else {
            Err(InternalError::aggregate_invariant(format!(
                "accumulator set width {} does not match {expected}",
                self.states.len()
            )))
        }
    }
}
