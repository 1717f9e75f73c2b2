//! Module: exec
//! Responsibility: hybrid hash/sort GROUP BY execution.
//! Does not own: row production, predicate evaluation or output consumption.
//! Boundary: `GroupByExecutor::execute` is the single entry point; everything
//! below it is invocation-scoped and released by ownership on return.

pub(crate) mod aggregate;
pub(crate) mod driver;
pub(crate) mod hash;
pub(crate) mod interrupt;
pub(crate) mod key;
pub(crate) mod predicate;
pub(crate) mod rollup;
pub(crate) mod row;
pub(crate) mod sort;
pub(crate) mod spec;
pub(crate) mod spill;
pub(crate) mod trace;

#[cfg(test)]
mod tests;

// re-exports
pub use aggregate::{AccumulatorSet, AggregateKind, AggregateSpec};
pub use driver::OutputRow;
pub use hash::{HashTableState, HashTableStats};
pub use interrupt::{Interrupt, NeverInterrupt};
pub use key::{
    ColumnAccessor, GroupKey, GroupKeyRef, KeyAccessors, KeyComparison, KeyOrder, NullOrder,
    SlotAccessor, SortColumn, SortDirection,
};
pub use predicate::{GroupLimit, GroupPredicate, Logical};
pub use rollup::{DimensionFlags, GroupByDimension};
pub use row::{Row, RowSink, RowSource, VecRowSource};
pub use sort::{ExternalSort, InMemorySort};
pub use spec::{GroupBySpec, GroupBySpecError, GroupingMode};
pub use trace::{GroupByTraceEvent, GroupByTracePhase, GroupByTraceSink};

use crate::{
    config::GroupByConfig,
    error::{ErrorOrigin, InternalError},
    exec::{
        driver::{EmitSummary, GroupByDriver, GroupEmitter},
        hash::{HashAggregationTable, HashEntry, ProbeOutcome},
        interrupt::poll,
        spill::{DirectRow, PartialStream, PhaseStreams, SpillReconciler},
        trace::{TraceScope, start_trace},
    },
    obs::sink::{MetricsEvent, Span, record},
};

///
/// GroupByStats
///
/// Per-invocation counters describing which path the rows took.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GroupByStats {
    pub rows_scanned: u64,
    pub hash_rows: u64,
    pub direct_rows: u64,
    pub groups_evicted: u64,
    pub spill_records: u64,
    pub reconciled_records: u64,
    pub fast_path: bool,
    pub selectivity_abort: bool,
}

///
/// GroupByOutcome
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GroupByOutcome {
    pub rows_emitted: u64,
    pub stop_scan: bool,
    pub stats: GroupByStats,
}

///
/// GroupByExecutor
///
/// Runs one GROUP BY: hash phase (when eligible), then either the in-place
/// fast path or sort + reconcile + driver.
///

pub struct GroupByExecutor<'a> {
    spec: &'a GroupBySpec,
    config: GroupByConfig,
    trace: Option<&'a dyn GroupByTraceSink>,
    interrupt: &'a dyn Interrupt,
}

impl<'a> GroupByExecutor<'a> {
    #[must_use]
    pub const fn new(spec: &'a GroupBySpec, config: GroupByConfig) -> Self {
        Self {
            spec,
            config,
            trace: None,
            interrupt: &NeverInterrupt,
        }
    }

    #[must_use]
    pub const fn with_trace(mut self, trace: &'a dyn GroupByTraceSink) -> Self {
        self.trace = Some(trace);
        self
    }

    #[must_use]
    pub const fn with_interrupt(mut self, interrupt: &'a dyn Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &GroupByConfig {
        &self.config
    }

    /// Consume `source` and push every surviving group row into `sink`.
    pub fn execute(
        &self,
        source: &mut dyn RowSource,
        sink: &mut dyn RowSink<OutputRow>,
    ) -> Result<GroupByOutcome, InternalError> {
        self.config.validate()?;
        self.spec.validate()?;

        let trace = start_trace(self.trace, self.hash_eligible(), self.spec.is_rollup());
        let mut span = Span::new(self.hash_eligible());

        let result = self.execute_inner(source, sink, trace.as_ref());
        match &result {
            Ok(outcome) => {
                span.set_rows(outcome.stats.rows_scanned, outcome.stats.hash_rows);
                span.set_groups(outcome.rows_emitted, outcome.stop_scan);
                if outcome.stats.fast_path {
                    span.set_fast_path();
                }
                if let Some(trace) = trace {
                    trace.finish(outcome.rows_emitted, outcome.stop_scan);
                }
                self.debug_log(format!(
                    "group by done: emitted={} stop_scan={} stats={:?}",
                    outcome.rows_emitted, outcome.stop_scan, outcome.stats
                ));
            }
            Err(err) => {
                if let Some(trace) = trace {
                    trace.error(err);
                }
                self.debug_log(format!("group by failed: {}", err.display_with_class()));
            }
        }

        result
    }

    // DISTINCT operand sets grow with the input, so those plans skip hashing.
    fn hash_eligible(&self) -> bool {
        self.config.hash_eligible && !self.spec.has_distinct()
    }

    fn execute_inner(
        &self,
        source: &mut dyn RowSource,
        sink: &mut dyn RowSink<OutputRow>,
        trace: Option<&TraceScope<'_>>,
    ) -> Result<GroupByOutcome, InternalError> {
        let mut stats = GroupByStats::default();
        let mut streams = PhaseStreams::new(self.config.max_spill_record_bytes);

        if self.hash_eligible() {
            let mut table =
                HashAggregationTable::new(&self.spec.aggregates, self.config.regenerate_first_row);
            self.hash_phase(source, &mut table, &mut streams, &mut stats)?;
            if let Some(trace) = trace {
                trace.phase(GroupByTracePhase::HashPhase, stats.hash_rows);
            }

            let table_stats = table.stats();
            if table_stats.evictions == 0 && streams.direct.is_empty() && !self.spec.is_rollup() {
                stats.fast_path = true;
                let summary = self.fast_path(table, sink)?;
                if let Some(trace) = trace {
                    trace.phase(GroupByTracePhase::FastPath, summary.rows_emitted);
                }

                return Ok(outcome(summary, stats));
            }

            table.drain_all(&mut streams)?;
            stats.groups_evicted = table.stats().evictions;
        } else {
            self.direct_phase(source, &mut streams, &mut stats)?;
        }

        stats.direct_rows = streams.direct.len() as u64;
        stats.spill_records = streams.spill.records() as u64;

        let key_order = &self.spec.key_order;
        let sorter = InMemorySort;
        let direct = sorter.sort_by(streams.direct, |left, right| {
            key_order.ordering(left.key.values(), right.key.values())
        })?;

        let partials = if streams.spill.records() == 0 {
            PartialStream::empty()
        } else {
            SpillReconciler::new(key_order, &sorter).reconcile(streams.spill.into_stream())?
        };
        stats.reconciled_records = partials.len() as u64;
        if let Some(trace) = trace {
            trace.phase(GroupByTracePhase::Reconcile, stats.reconciled_records);
        }
        self.debug_log(format!(
            "sort path: direct_rows={} spill_records={} reconciled={}",
            stats.direct_rows, stats.spill_records, stats.reconciled_records
        ));

        let summary = GroupByDriver::new(self.spec, partials, self.interrupt).run(direct, sink)?;
        if let Some(trace) = trace {
            trace.phase(GroupByTracePhase::Drive, summary.rows_emitted);
        }

        Ok(outcome(summary, stats))
    }

    // Probe every row; enforce the budget and the selectivity gate while the
    // table still accepts input.
    fn hash_phase(
        &self,
        source: &mut dyn RowSource,
        table: &mut HashAggregationTable<'_>,
        streams: &mut PhaseStreams,
        stats: &mut GroupByStats,
    ) -> Result<(), InternalError> {
        while let Some(row) = source.next_row()? {
            poll(self.interrupt, ErrorOrigin::Hash)?;
            stats.rows_scanned += 1;

            match table.probe_or_insert(&self.spec.keys, row)? {
                ProbeOutcome::Absorbed => stats.hash_rows += 1,
                ProbeOutcome::Marker(key) => {
                    stats.hash_rows += 1;
                    streams.push_direct(DirectRow::marker(key))?;
                }
                ProbeOutcome::Rejected(row) => {
                    let key = self.spec.keys.owned(&row)?;
                    streams.push_direct(DirectRow::input(key, row))?;
                }
            }

            if table.state() == HashTableState::RejectAll {
                continue;
            }

            let before = table.stats().hash_size_bytes;
            let evicted = table.enforce_memory_budget(self.config.max_hash_bytes, streams)?;
            if evicted > 0 {
                let bytes = before.saturating_sub(table.stats().hash_size_bytes);
                record(MetricsEvent::HashSpill {
                    entries: evicted,
                    bytes,
                });
            }

            let aborted = table.check_selectivity(
                self.config.selectivity_tuple_threshold,
                self.config.selectivity_ratio_threshold,
                streams,
            )?;
            if aborted {
                let table_stats = table.stats();
                stats.selectivity_abort = true;
                record(MetricsEvent::SelectivityAbort {
                    groups: table_stats.group_count,
                    tuples: table_stats.tuple_count,
                });
                self.debug_log(format!(
                    "hash aggregation abandoned: groups={} tuples={}",
                    table_stats.group_count, table_stats.tuple_count
                ));
            }
        }

        Ok(())
    }

    // Hash-ineligible plans send every row straight to the sort path.
    fn direct_phase(
        &self,
        source: &mut dyn RowSource,
        streams: &mut PhaseStreams,
        stats: &mut GroupByStats,
    ) -> Result<(), InternalError> {
        while let Some(row) = source.next_row()? {
            poll(self.interrupt, ErrorOrigin::Driver)?;
            stats.rows_scanned += 1;

            let key = self.spec.keys.owned(&row)?;
            streams.push_direct(DirectRow::input(key, row))?;
        }

        Ok(())
    }

    // Nothing left the table: finalize resident groups in key order, no spill.
    fn fast_path(
        &self,
        table: HashAggregationTable<'_>,
        sink: &mut dyn RowSink<OutputRow>,
    ) -> Result<EmitSummary, InternalError> {
        let specs = &self.spec.aggregates;
        let key_order = &self.spec.key_order;
        let entries = InMemorySort.sort_by(table.into_entries(), |left, right| {
            key_order.ordering(left.key.values(), right.key.values())
        })?;

        let mut emitter = GroupEmitter::new(self.spec);
        for entry in entries {
            poll(self.interrupt, ErrorOrigin::Driver)?;

            let HashEntry { key, value, .. } = entry;
            let mut accumulators = value.accumulators;
            if let Some(first) = &value.cached_first_row {
                accumulators.accumulate(specs, first)?;
            }
            let aggregates = accumulators.finalize(specs)?;

            emitter.offer(
                key.into_values(),
                aggregates,
                value.cached_first_row,
                0,
                sink,
            )?;
            if emitter.stop_scan() {
                break;
            }
        }

        Ok(emitter.summary())
    }

    fn debug_log(&self, s: impl AsRef<str>) {
        if self.config.debug {
            println!("[debug] {}", s.as_ref());
        }
    }
}

const fn outcome(summary: EmitSummary, stats: GroupByStats) -> GroupByOutcome {
    GroupByOutcome {
        rows_emitted: summary.rows_emitted,
        stop_scan: summary.stop_scan,
        stats,
    }
}
