//! Module: exec::rollup
//! Responsibility: per-level accumulator dimensions for GROUP BY and ROLLUP.
//! Does not own: key-change detection or predicate evaluation (see `driver`).
//! Boundary: the driver reports the first differing key position; this
//! module decides which levels close and finalizes them innermost outward.

use crate::{
    error::InternalError,
    exec::{
        aggregate::{AccumulatorSet, AggregateSpec},
        row::Row,
    },
    value::Value,
};
use std::{mem, ops::BitOr};

///
/// DimensionFlags
///
/// Grouping role of one dimension. CUBE is representable for plan
/// round-tripping but never executed.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DimensionFlags(u8);

impl DimensionFlags {
    pub const GROUP_BY: Self = Self(0b001);
    pub const ROLLUP: Self = Self(0b010);
    pub const CUBE: Self = Self(0b100);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for DimensionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

///
/// GroupByDimension
///
/// Accumulators for one ROLLUP level. Level 0 holds the full key; level `i`
/// aggregates over the key truncated to its first `nkeys - i` columns.
///

#[derive(Clone, Debug)]
pub struct GroupByDimension {
    pub flags: DimensionFlags,
    accumulators: AccumulatorSet,
    row_count: u64,
    started: bool,
}

impl GroupByDimension {
    fn new(flags: DimensionFlags, specs: &[AggregateSpec]) -> Self {
        Self {
            flags,
            accumulators: AccumulatorSet::new(specs),
            row_count: 0,
            started: false,
        }
    }

    #[must_use]
    pub const fn row_count(&self) -> u64 {
        self.row_count
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }
}

///
/// FinalizedDimension
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FinalizedDimension {
    pub(crate) level: usize,
    pub(crate) prefix_len: usize,
    pub(crate) aggregates: Vec<Value>,
}

///
/// RollupFinalizer
///
/// Owns the `1 + (rollup ? nkeys : 0)` dimensions of one invocation,
/// allocated once and reset in place at each group start.
///

#[derive(Debug)]
pub(crate) struct RollupFinalizer<'s> {
    specs: &'s [AggregateSpec],
    dims: Vec<GroupByDimension>,
    nkeys: usize,
}

impl<'s> RollupFinalizer<'s> {
    pub(crate) fn new(specs: &'s [AggregateSpec], nkeys: usize, rollup: bool) -> Self {
        let base = if rollup {
            DimensionFlags::GROUP_BY | DimensionFlags::ROLLUP
        } else {
            DimensionFlags::GROUP_BY
        };
        let levels = if rollup { nkeys } else { 0 };

        let mut dims = Vec::with_capacity(1 + levels);
        dims.push(GroupByDimension::new(base, specs));
        dims.extend((0..levels).map(|_| GroupByDimension::new(DimensionFlags::ROLLUP, specs)));

        Self { specs, dims, nkeys }
    }

    #[cfg(test)]
    pub(crate) fn dimensions(&self) -> &[GroupByDimension] {
        &self.dims
    }

    /// Open dimension `idx` for a new (super)group.
    pub(crate) fn start(&mut self, idx: usize) -> Result<(), InternalError> {
        self.dim_mut(idx)?.started = true;

        Ok(())
    }

    /// Open every dimension that is not already collecting a group.
    pub(crate) fn start_idle(&mut self) -> Result<(), InternalError> {
        let idle: Vec<usize> = (0..self.dims.len())
            .filter(|&idx| !self.dims[idx].started)
            .collect();
        for idx in idle {
            self.start(idx)?;
        }

        Ok(())
    }

    /// Fold one direct row into every open dimension.
    pub(crate) fn accumulate(&mut self, row: &Row) -> Result<(), InternalError> {
        let specs = self.specs;
        for dim in self.dims.iter_mut().filter(|dim| dim.started) {
            dim.accumulators.accumulate(specs, row)?;
            dim.row_count = dim.row_count.saturating_add(1);
        }

        Ok(())
    }

    /// Load a reconciled partial group: merged into every open ancestor and
    /// moved into dimension 0.
    pub(crate) fn merge_partial(
        &mut self,
        accumulators: AccumulatorSet,
        row_count: u64,
    ) -> Result<(), InternalError> {
        let Some((base, ancestors)) = self.dims.split_first_mut() else {
            return Err(InternalError::rollup_invariant("no dimensions allocated"));
        };

        for dim in ancestors.iter_mut().filter(|dim| dim.started) {
            dim.accumulators.merge(accumulators.clone())?;
            dim.row_count = dim.row_count.saturating_add(row_count);
        }
        base.accumulators.merge(accumulators)?;
        base.row_count = base.row_count.saturating_add(row_count);

        Ok(())
    }

    /// Finalize dimension `idx`, leaving fresh state behind.
    /// Returns `None` when the dimension holds no open group.
    pub(crate) fn finalize(
        &mut self,
        idx: usize,
    ) -> Result<Option<FinalizedDimension>, InternalError> {
        if idx > 0 && self.dim(idx - 1)?.started {
            return Err(InternalError::rollup_invariant(format!(
                "dimension {idx} finalized before dimension {}",
                idx - 1
            )));
        }

        let specs = self.specs;
        let prefix_len = self.nkeys.saturating_sub(idx);
        let dim = self.dim_mut(idx)?;
        if !dim.started {
            return Ok(None);
        }

        let state = mem::replace(&mut dim.accumulators, AccumulatorSet::new(specs));
        dim.started = false;
        dim.row_count = 0;

        Ok(Some(FinalizedDimension {
            level: idx,
            prefix_len,
            aggregates: state.finalize(specs)?,
        }))
    }

    /// Discard dimension `idx`'s state without producing a row.
    pub(crate) fn reset(&mut self, idx: usize) -> Result<(), InternalError> {
        let specs = self.specs;
        let dim = self.dim_mut(idx)?;
        dim.accumulators = AccumulatorSet::new(specs);
        dim.row_count = 0;
        dim.started = false;

        Ok(())
    }

    /// Close the levels whose key prefix changed at `diff_pos`: dimension 0
    /// plus every ancestor `i` with `nkeys - i > diff_pos`, innermost first.
    pub(crate) fn finalize_changed(
        &mut self,
        diff_pos: usize,
    ) -> Result<Vec<FinalizedDimension>, InternalError> {
        let closing = self.nkeys.saturating_sub(diff_pos).clamp(1, self.dims.len());
        self.finalize_levels(closing)
    }

    /// Close every level, including the grand total.
    pub(crate) fn finalize_all(&mut self) -> Result<Vec<FinalizedDimension>, InternalError> {
        self.finalize_levels(self.dims.len())
    }

    fn finalize_levels(&mut self, count: usize) -> Result<Vec<FinalizedDimension>, InternalError> {
        let mut out = Vec::with_capacity(count);
        for idx in 0..count {
            if let Some(done) = self.finalize(idx)? {
                out.push(done);
            }
            self.reset(idx)?;
        }

        Ok(out)
    }

    fn dim(&self, idx: usize) -> Result<&GroupByDimension, InternalError> {
        self.dims.get(idx).ok_or_else(|| out_of_range(idx, self.dims.len()))
    }

    fn dim_mut(&mut self, idx: usize) -> Result<&mut GroupByDimension, InternalError> {
        let len = self.dims.len();
        self.dims.get_mut(idx).ok_or_else(|| out_of_range(idx, len))
    }
}

fn out_of_range(idx: usize, len: usize) -> InternalError {
    InternalError::rollup_invariant(format!(
        "dimension {idx} out of range for {len} dimensions"
    ))
}

///
/// TESTS
///
