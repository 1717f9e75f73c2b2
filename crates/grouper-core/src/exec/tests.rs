use super::*;
use crate::{
    error::ErrorClass,
    exec::{
        aggregate::AggregateSpec, predicate::Logical, row::VecRowSource, trace::GroupByTraceEvent,
    },
    obs::{MetricsSink, with_metrics_sink},
    row,
    value::Value,
};
use std::cell::RefCell;

#[derive(Default)]
struct RecordingTrace {
    events: RefCell<Vec<GroupByTraceEvent>>,
}

impl GroupByTraceSink for RecordingTrace {
    fn on_event(&self, event: GroupByTraceEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[derive(Default)]
struct RecordingMetrics {
    events: RefCell<Vec<MetricsEvent>>,
}

impl MetricsSink for RecordingMetrics {
    fn record(&self, event: MetricsEvent) {
        self.events.borrow_mut().push(event);
    }
}

fn sum_spec() -> GroupBySpec {
    GroupBySpec::slots(&[0], vec![AggregateSpec::sum(1)])
}

fn source() -> VecRowSource {
    VecRowSource::new([row![1, 10], row![1, 20], row![2, 5]])
}

fn phases(trace: &RecordingTrace) -> Vec<GroupByTracePhase> {
    trace
        .events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            GroupByTraceEvent::Phase { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect()
}

#[test]
fn resident_groups_take_the_fast_path() {
    let spec = sum_spec();
    let trace = RecordingTrace::default();
    let mut out: Vec<OutputRow> = Vec::new();

    let outcome = GroupByExecutor::new(&spec, GroupByConfig::default())
        .with_trace(&trace)
        .execute(&mut source(), &mut out)
        .expect("execute");

    assert!(outcome.stats.fast_path);
    assert_eq!(outcome.rows_emitted, 2);
    assert_eq!(outcome.stats.hash_rows, 3);
    assert_eq!(
        phases(&trace),
        vec![GroupByTracePhase::HashPhase, GroupByTracePhase::FastPath]
    );
    assert_eq!(
        trace.events.borrow().last(),
        Some(&GroupByTraceEvent::Finish {
            rows_emitted: 2,
            stop_scan: false,
        })
    );
}

#[test]
fn hash_disabled_goes_through_reconcile_and_drive() {
    let spec = sum_spec();
    let trace = RecordingTrace::default();
    let mut out: Vec<OutputRow> = Vec::new();

    let outcome = GroupByExecutor::new(&spec, GroupByConfig::hash_disabled())
        .with_trace(&trace)
        .execute(&mut source(), &mut out)
        .expect("execute");

    assert!(!outcome.stats.fast_path);
    assert_eq!(outcome.stats.direct_rows, 3);
    assert_eq!(outcome.stats.reconciled_records, 0);
    assert_eq!(
        phases(&trace),
        vec![GroupByTracePhase::Reconcile, GroupByTracePhase::Drive]
    );
    assert_eq!(
        trace.events.borrow().first(),
        Some(&GroupByTraceEvent::Start {
            hash_eligible: false,
            rollup: false,
        })
    );
}

#[test]
fn distinct_aggregates_bypass_the_hash_phase() {
    let spec = GroupBySpec::slots(&[0], vec![AggregateSpec::sum(1).with_distinct()]);
    let trace = RecordingTrace::default();
    let mut out: Vec<OutputRow> = Vec::new();
    let mut rows = VecRowSource::new([row![1, 10], row![1, 10], row![1, 20], row![2, 5]]);

    let outcome = GroupByExecutor::new(&spec, GroupByConfig::default())
        .with_trace(&trace)
        .execute(&mut rows, &mut out)
        .expect("execute");

    assert_eq!(outcome.stats.hash_rows, 0);
    assert_eq!(outcome.stats.direct_rows, 4);
    assert!(!outcome.stats.fast_path);
    assert_eq!(
        trace.events.borrow().first(),
        Some(&GroupByTraceEvent::Start {
            hash_eligible: false,
            rollup: false,
        })
    );
    assert_eq!(
        out.iter()
            .map(|r| (r.key.clone(), r.aggregates.clone()))
            .collect::<Vec<_>>(),
        vec![
            (vec![Value::Int(1)], vec![Value::Int(30)]),
            (vec![Value::Int(2)], vec![Value::Int(5)]),
        ]
    );
}

#[test]
fn predicate_failure_is_traced_as_error() {
    let spec = sum_spec().with_having(|_: &OutputRow| Logical::Error("bad having".to_string()));
    let trace = RecordingTrace::default();
    let mut out: Vec<OutputRow> = Vec::new();

    let err = GroupByExecutor::new(&spec, GroupByConfig::default())
        .with_trace(&trace)
        .execute(&mut source(), &mut out)
        .expect_err("having error");

    assert_eq!(err.class, ErrorClass::Predicate);
    assert_eq!(
        trace.events.borrow().last(),
        Some(&GroupByTraceEvent::Error {
            class: ErrorClass::Predicate,
            origin: ErrorOrigin::Driver,
        })
    );
}

#[test]
fn zero_budget_reports_spills_and_reconciliation() {
    let spec = sum_spec();
    let metrics = RecordingMetrics::default();
    let mut out: Vec<OutputRow> = Vec::new();
    let config = GroupByConfig::default()
        .with_max_hash_bytes(0)
        .with_regenerate_first_row(true);

    // Every row is folded on insert and evicted at once, so each one spills.
    let outcome = with_metrics_sink(&metrics, || {
        GroupByExecutor::new(&spec, config).execute(&mut source(), &mut out)
    })
    .expect("execute");

    assert!(!outcome.stats.fast_path);
    assert_eq!(outcome.stats.spill_records, 3);
    assert_eq!(outcome.stats.reconciled_records, 2);
    assert_eq!(outcome.stats.direct_rows, 3, "one marker per insertion");
    assert_eq!(
        out.iter()
            .map(|r| (r.key.clone(), r.aggregates.clone()))
            .collect::<Vec<_>>(),
        vec![
            (vec![Value::Int(1)], vec![Value::Int(30)]),
            (vec![Value::Int(2)], vec![Value::Int(5)]),
        ]
    );

    let events = metrics.events.borrow();
    assert!(matches!(
        events.first(),
        Some(MetricsEvent::GroupByStart {
            hash_eligible: true
        })
    ));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, MetricsEvent::HashSpill { .. }))
    );
    assert!(events.iter().any(|e| matches!(
        e,
        MetricsEvent::SpillReconciled {
            input_records: 3,
            output_records: 2,
        }
    )));
    assert!(matches!(
        events.last(),
        Some(MetricsEvent::GroupByFinish {
            rows_scanned: 3,
            groups_emitted: 2,
            fast_path: false,
            ..
        })
    ));
}

#[test]
fn selectivity_abort_is_reported() {
    let spec = sum_spec();
    let metrics = RecordingMetrics::default();
    let mut out: Vec<OutputRow> = Vec::new();
    let mut rows = VecRowSource::new((0..20).map(|k| row![k, 1]));

    let outcome = with_metrics_sink(&metrics, || {
        GroupByExecutor::new(&spec, GroupByConfig::default().with_selectivity(8, 0.5))
            .execute(&mut rows, &mut out)
    })
    .expect("execute");

    assert!(outcome.stats.selectivity_abort);
    assert_eq!(out.len(), 20);
    assert_eq!(
        metrics
            .events
            .borrow()
            .iter()
            .filter(|e| matches!(e, MetricsEvent::SelectivityAbort { .. }))
            .count(),
        1
    );
}

#[test]
fn invalid_config_fails_before_reading_input() {
    let spec = sum_spec();
    let mut rows = source();
    let mut out: Vec<OutputRow> = Vec::new();

    let err = GroupByExecutor::new(&spec, GroupByConfig::default().with_selectivity(1, 0.0))
        .execute(&mut rows, &mut out)
        .expect_err("ratio of zero is rejected");

    assert_eq!(err.class, ErrorClass::Unsupported);
    assert_eq!(rows.remaining(), 3);
}
