//! Metrics sink boundary.
//!
//! GROUP BY execution MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the global metrics state.
use crate::obs::metrics;
use std::{cell::RefCell, time::Instant};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    GroupByStart {
        hash_eligible: bool,
    },
    GroupByFinish {
        rows_scanned: u64,
        rows_hashed: u64,
        groups_emitted: u64,
        fast_path: bool,
        stopped_early: bool,
        elapsed_micros: u64,
    },
    HashSpill {
        entries: u64,
        bytes: u64,
    },
    SelectivityAbort {
        groups: u64,
        tuples: u64,
    },
    SpillReconciled {
        input_records: u64,
        output_records: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::GroupByStart { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.group_by_calls = m.ops.group_by_calls.saturating_add(1);
                });
            }

            MetricsEvent::GroupByFinish {
                rows_scanned,
                rows_hashed,
                groups_emitted,
                fast_path,
                stopped_early,
                elapsed_micros,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_scanned = m.ops.rows_scanned.saturating_add(rows_scanned);
                    m.ops.rows_hashed = m.ops.rows_hashed.saturating_add(rows_hashed);
                    m.ops.groups_emitted = m.ops.groups_emitted.saturating_add(groups_emitted);
                    if fast_path {
                        m.ops.fast_path_runs = m.ops.fast_path_runs.saturating_add(1);
                    }
                    if stopped_early {
                        m.ops.stopped_early = m.ops.stopped_early.saturating_add(1);
                    }
                    metrics::add_duration(
                        &mut m.perf.group_by_micros_total,
                        &mut m.perf.group_by_micros_max,
                        elapsed_micros,
                    );
                });
            }

            MetricsEvent::HashSpill { entries, bytes } => {
                metrics::with_state_mut(|m| {
                    m.ops.hash_evictions = m.ops.hash_evictions.saturating_add(entries);
                    m.ops.hash_evicted_bytes = m.ops.hash_evicted_bytes.saturating_add(bytes);
                });
            }

            MetricsEvent::SelectivityAbort { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.selectivity_aborts = m.ops.selectivity_aborts.saturating_add(1);
                });
            }

            MetricsEvent::SpillReconciled {
                input_records,
                output_records,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.spill_records_in = m.ops.spill_records_in.saturating_add(input_records);
                    m.ops.spill_records_out =
                        m.ops.spill_records_out.saturating_add(output_records);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - Only a shared reference is materialized, matching the shared borrow
        //   used to install the override.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state for reporting/test plumbing.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state (counters + perf).
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

/// Span
/// RAII guard that emits start/finish metrics events for one GROUP BY call.
/// Ensures finish accounting happens even on error or unwind.

pub(crate) struct Span {
    start: Instant,
    rows_scanned: u64,
    rows_hashed: u64,
    groups_emitted: u64,
    fast_path: bool,
    stopped_early: bool,
    finished: bool,
}

impl Span {
    #[must_use]
    /// Start a metrics span for one GROUP BY invocation.
    pub(crate) fn new(hash_eligible: bool) -> Self {
        record(MetricsEvent::GroupByStart { hash_eligible });

        Self {
            start: Instant::now(),
            rows_scanned: 0,
            rows_hashed: 0,
            groups_emitted: 0,
            fast_path: false,
            stopped_early: false,
            finished: false,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows_scanned: u64, rows_hashed: u64) {
        self.rows_scanned = rows_scanned;
        self.rows_hashed = rows_hashed;
    }

    pub(crate) const fn set_groups(&mut self, groups_emitted: u64, stopped_early: bool) {
        self.groups_emitted = groups_emitted;
        self.stopped_early = stopped_early;
    }

    pub(crate) const fn set_fast_path(&mut self) {
        self.fast_path = true;
    }

    fn finish_inner(&self) {
        let elapsed = u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX);

        record(MetricsEvent::GroupByFinish {
            rows_scanned: self.rows_scanned,
            rows_hashed: self.rows_hashed,
            groups_emitted: self.groups_emitted,
            fast_path: self.fast_path,
            stopped_early: self.stopped_early,
            elapsed_micros: elapsed,
        });
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if !self.finished {
            self.finish_inner();
            self.finished = true;
        }
    }
}
