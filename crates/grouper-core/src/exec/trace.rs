//! GROUP BY tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect execution semantics.

use crate::error::{ErrorClass, ErrorOrigin, InternalError};

///
/// GroupByTraceSink
///

pub trait GroupByTraceSink {
    fn on_event(&self, event: GroupByTraceEvent);
}

///
/// GroupByTracePhase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupByTracePhase {
    HashPhase,
    Reconcile,
    Drive,
    FastPath,
}

///
/// GroupByTraceEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupByTraceEvent {
    Start {
        hash_eligible: bool,
        rollup: bool,
    },
    Phase {
        phase: GroupByTracePhase,
        rows: u64,
    },
    Finish {
        rows_emitted: u64,
        stop_scan: bool,
    },
    Error {
        class: ErrorClass,
        origin: ErrorOrigin,
    },
}

///
/// TraceScope
///

pub(crate) struct TraceScope<'a> {
    sink: &'a dyn GroupByTraceSink,
}

impl<'a> TraceScope<'a> {
    fn new(sink: &'a dyn GroupByTraceSink, hash_eligible: bool, rollup: bool) -> Self {
        sink.on_event(GroupByTraceEvent::Start {
            hash_eligible,
            rollup,
        });

        Self { sink }
    }

    pub(crate) fn phase(&self, phase: GroupByTracePhase, rows: u64) {
        self.sink.on_event(GroupByTraceEvent::Phase { phase, rows });
    }

    pub(crate) fn finish(self, rows_emitted: u64, stop_scan: bool) {
        self.sink.on_event(GroupByTraceEvent::Finish {
            rows_emitted,
            stop_scan,
        });
    }

    pub(crate) fn error(self, err: &InternalError) {
        self.sink.on_event(GroupByTraceEvent::Error {
            class: err.class,
            origin: err.origin,
        });
    }
}

pub(crate) fn start_trace<'a>(
    sink: Option<&'a dyn GroupByTraceSink>,
    hash_eligible: bool,
    rollup: bool,
) -> Option<TraceScope<'a>> {
    sink.map(|sink| TraceScope::new(sink, hash_eligible, rollup))
}
