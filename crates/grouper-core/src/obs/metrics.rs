use serde::{Deserialize, Serialize};
use std::cell::RefCell;

///
/// EventState
/// Ephemeral, in-memory counters and simple perf totals for GROUP BY runs.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct EventState {
    pub(crate) ops: EventOps,
    pub(crate) perf: EventPerf,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Executor entrypoints
    pub group_by_calls: u64,
    pub fast_path_runs: u64,
    pub stopped_early: u64,

    // Rows and groups
    pub rows_scanned: u64,
    pub rows_hashed: u64,
    pub groups_emitted: u64,

    // Hash table pressure
    pub hash_evictions: u64,
    pub hash_evicted_bytes: u64,
    pub selectivity_aborts: u64,

    // Spill reconciliation
    pub spill_records_in: u64,
    pub spill_records_out: u64,
}

///
/// EventPerf
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventPerf {
    // Wall-clock totals per GROUP BY invocation
    pub group_by_micros_total: u128,

    // Maximum observed invocation duration
    pub group_by_micros_max: u64,
}

///
/// EventReport
/// Point-in-time copy of the metrics counters.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub perf: EventPerf,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters and perf totals.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Accumulate a duration and track a max.
#[allow(clippy::missing_const_for_fn)]
pub(crate) fn add_duration(total: &mut u128, max: &mut u64, delta: u64) {
    *total = total.saturating_add(u128::from(delta));
    if delta > *max {
        *max = delta;
    }
}

/// Build a point-in-time report of the current counters.
#[must_use]
pub(crate) fn report() -> EventReport {
    with_state(|m| EventReport {
        ops: m.ops.clone(),
        perf: m.perf.clone(),
    })
}

///
/// TESTS
///
