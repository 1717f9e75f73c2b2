//! Module: exec::driver
//! Responsibility: two-source group-boundary driver and group emission.
//! Does not own: hash aggregation or spill reconciliation.
//! Boundary: consumes the key-sorted direct stream plus the reconciled
//! partial stream and pushes finalized group rows to the caller's sink.

#[cfg(test)]
mod tests;

use crate::{
    error::{ErrorOrigin, InternalError},
    exec::{
        interrupt::{Interrupt, poll},
        key::{GroupKey, KeyOrder},
        predicate::{GroupLimit, GroupPredicate},
        rollup::{FinalizedDimension, RollupFinalizer},
        row::{Row, RowSink},
        spec::GroupBySpec,
        spill::{DirectRow, PartialStream},
    },
    value::Value,
};
use std::{cmp::Ordering, vec};

///
/// OutputRow
///
/// One finalized group. `rollup_level` 0 is a base group; level `i` is a
/// supergroup whose trailing `i` key columns are NULL.
///

#[derive(Clone, Debug, PartialEq)]
pub struct OutputRow {
    pub key: Vec<Value>,
    pub aggregates: Vec<Value>,
    pub first_row: Option<Row>,
    pub group_num: u64,
    pub rollup_level: usize,
}

///
/// EmitSummary
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct EmitSummary {
    pub(crate) rows_emitted: u64,
    pub(crate) candidates: u64,
    pub(crate) stop_scan: bool,
}

///
/// GroupEmitter
///
/// Applies HAVING and then the group-number limit to each finalized group.
/// HAVING-rejected groups never consume a group number.
///

pub(crate) struct GroupEmitter<'a> {
    having: Option<&'a dyn GroupPredicate>,
    limit: Option<&'a GroupLimit>,
    summary: EmitSummary,
}

impl<'a> GroupEmitter<'a> {
    pub(crate) fn new(spec: &'a GroupBySpec) -> Self {
        Self {
            having: spec.having.as_deref(),
            limit: spec.limit.as_ref(),
            summary: EmitSummary::default(),
        }
    }

    pub(crate) const fn stop_scan(&self) -> bool {
        self.summary.stop_scan
    }

    pub(crate) const fn summary(&self) -> EmitSummary {
        self.summary
    }

    pub(crate) fn offer(
        &mut self,
        key: Vec<Value>,
        aggregates: Vec<Value>,
        first_row: Option<Row>,
        rollup_level: usize,
        sink: &mut dyn RowSink<OutputRow>,
    ) -> Result<(), InternalError> {
        if self.summary.stop_scan {
            return Ok(());
        }

        let row = OutputRow {
            key,
            aggregates,
            first_row,
            group_num: self.summary.candidates.saturating_add(1),
            rollup_level,
        };

        if let Some(having) = self.having
            && !having.evaluate(&row).passes()?
        {
            return Ok(());
        }
        self.summary.candidates = row.group_num;

        if let Some(limit) = self.limit
            && !limit.evaluate(&row).passes()?
        {
            if limit.stop_when_false() {
                self.summary.stop_scan = true;
            }
            return Ok(());
        }

        sink.push(row)?;
        self.summary.rows_emitted = self.summary.rows_emitted.saturating_add(1);

        Ok(())
    }
}

///
/// DriverState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DriverState {
    Init,
    ScanningGroup,
    NoMoreInput,
    Finalizing,
    Done,
}

///
/// Boundary
///
/// Why the current group is being finalized.
///

#[derive(Debug)]
enum Boundary {
    KeyChange { diff_pos: usize, next: DirectRow },
    EndOfInput,
}

///
/// GroupByDriver
///
/// Walks the sorted direct stream, detects key changes, loads each group's
/// reconciled partial state and finalizes groups through the rollup levels.
///

pub(crate) struct GroupByDriver<'a> {
    key_order: &'a KeyOrder,
    rollup: RollupFinalizer<'a>,
    partials: PartialStream,
    interrupt: &'a dyn Interrupt,
    emitter: GroupEmitter<'a>,
    state: DriverState,
    current_key: Option<GroupKey>,
    first_row: Option<Row>,
    pending: Option<Boundary>,
}

impl<'a> GroupByDriver<'a> {
    pub(crate) fn new(
        spec: &'a GroupBySpec,
        partials: PartialStream,
        interrupt: &'a dyn Interrupt,
    ) -> Self {
        Self {
            key_order: &spec.key_order,
            rollup: RollupFinalizer::new(&spec.aggregates, spec.key_count(), spec.is_rollup()),
            partials,
            interrupt,
            emitter: GroupEmitter::new(spec),
            state: DriverState::Init,
            current_key: None,
            first_row: None,
            pending: None,
        }
    }

    #[cfg(test)]
    pub(crate) const fn state(&self) -> DriverState {
        self.state
    }

    /// Drive `direct` (already sorted by the grouping comparator) to completion.
    pub(crate) fn run(
        mut self,
        direct: Vec<DirectRow>,
        sink: &mut dyn RowSink<OutputRow>,
    ) -> Result<EmitSummary, InternalError> {
        let mut input = direct.into_iter();

        while self.state != DriverState::Done {
            self.state = self.step(&mut input, sink)?;
        }

        Ok(self.emitter.summary())
    }

    fn step(
        &mut self,
        input: &mut vec::IntoIter<DirectRow>,
        sink: &mut dyn RowSink<OutputRow>,
    ) -> Result<DriverState, InternalError> {
        match self.state {
            DriverState::Init => {
                poll(self.interrupt, ErrorOrigin::Driver)?;
                match input.next() {
                    Some(first) => {
                        self.start_group(first)?;
                        Ok(DriverState::ScanningGroup)
                    }
                    None => Ok(DriverState::NoMoreInput),
                }
            }
            DriverState::ScanningGroup => {
                poll(self.interrupt, ErrorOrigin::Driver)?;
                match input.next() {
                    Some(next) => self.scan(next),
                    None => Ok(DriverState::NoMoreInput),
                }
            }
            DriverState::NoMoreInput => {
                self.pending = Some(Boundary::EndOfInput);
                Ok(DriverState::Finalizing)
            }
            DriverState::Finalizing => self.finalize_boundary(sink),
            DriverState::Done => Ok(DriverState::Done),
        }
    }

    // Same key: fold. Later key: schedule a boundary. Earlier key: unsorted input.
    fn scan(&mut self, next: DirectRow) -> Result<DriverState, InternalError> {
        let Some(current) = self.current_key.as_ref() else {
            return Err(InternalError::driver_invariant(
                "scanning without a current group key",
            ));
        };

        let cmp = self.key_order.compare(current.values(), next.key.values())?;
        match cmp.ordering {
            Ordering::Equal => {
                self.accumulate(next.row)?;
                Ok(DriverState::ScanningGroup)
            }
            Ordering::Less => {
                self.pending = Some(Boundary::KeyChange {
                    diff_pos: cmp.diff_pos,
                    next,
                });
                Ok(DriverState::Finalizing)
            }
            Ordering::Greater => Err(InternalError::driver_invariant(format!(
                "direct stream out of order at key {:?}",
                next.key.values()
            ))),
        }
    }

    fn start_group(&mut self, first: DirectRow) -> Result<(), InternalError> {
        let DirectRow { key, row } = first;

        self.rollup.start_idle()?;
        self.load_partial(&key)?;
        self.current_key = Some(key);
        self.first_row = None;

        self.accumulate(row)
    }

    // Every reconciled partial owns at least one direct row, so the partial
    // cursor can never fall behind the direct key.
    fn load_partial(&mut self, key: &GroupKey) -> Result<(), InternalError> {
        let ordering = match self.partials.peek() {
            Some(partial) => self
                .key_order
                .ordering(partial.key.values(), key.values())?,
            None => return Ok(()),
        };

        match ordering {
            Ordering::Less => Err(InternalError::driver_invariant(format!(
                "partial group sorts before direct key {:?} and can never be matched",
                key.values()
            ))),
            Ordering::Equal => {
                if let Some(partial) = self.partials.take() {
                    self.rollup
                        .merge_partial(partial.accumulators, partial.row_count)?;
                }
                Ok(())
            }
            Ordering::Greater => Ok(()),
        }
    }

    // Markers open a group but carry no row to fold.
    fn accumulate(&mut self, row: Option<Row>) -> Result<(), InternalError> {
        if let Some(row) = row {
            self.rollup.accumulate(&row)?;
            if self.first_row.is_none() {
                self.first_row = Some(row);
            }
        }

        Ok(())
    }

    fn finalize_boundary(
        &mut self,
        sink: &mut dyn RowSink<OutputRow>,
    ) -> Result<DriverState, InternalError> {
        poll(self.interrupt, ErrorOrigin::Driver)?;

        let boundary = self.pending.take().unwrap_or(Boundary::EndOfInput);
        let finalized = match (&boundary, &self.current_key) {
            (_, None) => Vec::new(),
            (Boundary::KeyChange { diff_pos, .. }, Some(_)) => {
                self.rollup.finalize_changed(*diff_pos)?
            }
            (Boundary::EndOfInput, Some(_)) => self.rollup.finalize_all()?,
        };
        self.emit(finalized, sink)?;

        if self.emitter.stop_scan() {
            return Ok(DriverState::Done);
        }

        match boundary {
            Boundary::KeyChange { next, .. } => {
                self.start_group(next)?;
                Ok(DriverState::ScanningGroup)
            }
            Boundary::EndOfInput => {
                if !self.partials.is_exhausted() {
                    return Err(InternalError::driver_invariant(
                        "partial groups left unmatched at end of input",
                    ));
                }
                Ok(DriverState::Done)
            }
        }
    }

    fn emit(
        &mut self,
        finalized: Vec<FinalizedDimension>,
        sink: &mut dyn RowSink<OutputRow>,
    ) -> Result<(), InternalError> {
        let Some(current) = self.current_key.as_ref() else {
            return Ok(());
        };

        for dim in finalized {
            let first_row = if dim.level == 0 {
                self.first_row.take()
            } else {
                None
            };
            self.emitter.offer(
                current.with_null_suffix(dim.prefix_len),
                dim.aggregates,
                first_row,
                dim.level,
                sink,
            )?;
            if self.emitter.stop_scan() {
                break;
            }
        }

        Ok(())
    }
}
