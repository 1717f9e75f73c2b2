use super::*;
use crate::{
    error::ErrorClass,
    exec::{
        aggregate::{AccumulatorSet, AggregateSpec},
        interrupt::NeverInterrupt,
        predicate::Logical,
        spill::SpillRecord,
    },
    row,
};
use std::sync::atomic::AtomicBool;

fn sum_spec() -> GroupBySpec {
    GroupBySpec::slots(&[0], vec![AggregateSpec::sum(1)])
}

fn key(v: i64) -> GroupKey {
    GroupKey::new(vec![Value::Int(v)])
}

fn input(k: i64, v: i64) -> DirectRow {
    DirectRow::input(key(k), row![k, v])
}

fn partial(spec: &GroupBySpec, k: i64, values: &[i64]) -> SpillRecord {
    let mut accumulators = AccumulatorSet::new(spec.aggregates());
    for v in values {
        accumulators
            .accumulate(spec.aggregates(), &row![k, *v])
            .expect("accumulate");
    }

    SpillRecord {
        key: key(k),
        row_count: values.len() as u64,
        accumulators,
    }
}

fn run(
    spec: &GroupBySpec,
    direct: Vec<DirectRow>,
    partials: Vec<SpillRecord>,
) -> Result<Vec<OutputRow>, InternalError> {
    let mut out: Vec<OutputRow> = Vec::new();
    GroupByDriver::new(spec, PartialStream::new(partials), &NeverInterrupt)
        .run(direct, &mut out)?;

    Ok(out)
}

fn pairs(rows: &[OutputRow]) -> Vec<(Vec<Value>, Vec<Value>)> {
    rows.iter()
        .map(|r| (r.key.clone(), r.aggregates.clone()))
        .collect()
}

#[test]
fn partial_state_joins_its_direct_rows() {
    let spec = sum_spec();

    let out = run(
        &spec,
        vec![input(1, 10), input(2, 5)],
        vec![partial(&spec, 1, &[20])],
    )
    .expect("drive");

    assert_eq!(
        pairs(&out),
        vec![
            (vec![Value::Int(1)], vec![Value::Int(30)]),
            (vec![Value::Int(2)], vec![Value::Int(5)]),
        ]
    );
    assert_eq!(out[0].first_row, Some(row![1, 10]));
    assert_eq!(
        out.iter().map(|r| r.group_num).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn marker_opens_group_without_accumulating() {
    let spec = sum_spec();

    let out = run(
        &spec,
        vec![DirectRow::marker(key(1))],
        vec![partial(&spec, 1, &[10, 20])],
    )
    .expect("drive");

    assert_eq!(pairs(&out), vec![(vec![Value::Int(1)], vec![Value::Int(30)])]);
    assert_eq!(out[0].first_row, None);
}

#[test]
fn partial_behind_direct_key_is_invariant_violation() {
    let spec = sum_spec();

    let err = run(&spec, vec![input(1, 10)], vec![partial(&spec, 0, &[1])])
        .expect_err("unmatched partial must fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn leftover_partial_at_end_is_invariant_violation() {
    let spec = sum_spec();

    let err = run(&spec, vec![input(1, 10)], vec![partial(&spec, 5, &[1])])
        .expect_err("leftover partial must fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn unsorted_direct_stream_is_invariant_violation() {
    let spec = sum_spec();

    let err = run(&spec, vec![input(2, 1), input(1, 1)], Vec::new())
        .expect_err("descending input under ascending order must fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn having_filters_before_numbering_and_limit_stops_scan() {
    let spec = sum_spec()
        .with_having(|row: &OutputRow| match row.aggregates[0] {
            Value::Int(v) => Logical::from(v > 5),
            _ => Logical::Unknown,
        })
        .with_limit(crate::exec::predicate::GroupLimit::first(1));

    let mut out: Vec<OutputRow> = Vec::new();
    let summary = GroupByDriver::new(&spec, PartialStream::empty(), &NeverInterrupt)
        .run(
            vec![input(1, 1), input(2, 10), input(3, 20), input(4, 30)],
            &mut out,
        )
        .expect("drive");

    assert_eq!(pairs(&out), vec![(vec![Value::Int(2)], vec![Value::Int(10)])]);
    assert_eq!(out[0].group_num, 1, "group 1 failed HAVING and took no number");
    assert!(summary.stop_scan);
    assert_eq!(summary.rows_emitted, 1);
}

#[test]
fn having_error_surfaces_as_predicate_error() {
    let spec = sum_spec().with_having(|_: &OutputRow| Logical::Error("boom".to_string()));

    let err = run(&spec, vec![input(1, 1)], Vec::new()).expect_err("predicate error");
    assert_eq!(err.class, ErrorClass::Predicate);
}

#[test]
fn interrupt_stops_without_emitting() {
    let spec = sum_spec();
    let flag = AtomicBool::new(true);
    let mut out: Vec<OutputRow> = Vec::new();

    let err = GroupByDriver::new(&spec, PartialStream::empty(), &flag)
        .run(vec![input(1, 1)], &mut out)
        .expect_err("interrupted");

    assert!(err.is_interrupted());
    assert!(out.is_empty());
}

#[test]
fn empty_input_finishes_without_rows() {
    let spec = sum_spec();
    let mut driver = GroupByDriver::new(&spec, PartialStream::empty(), &NeverInterrupt);
    let mut out: Vec<OutputRow> = Vec::new();
    let mut input = Vec::new().into_iter();

    while driver.state() != DriverState::Done {
        driver.state = driver.step(&mut input, &mut out).expect("step");
    }

    assert!(out.is_empty());
}

#[test]
fn rollup_emits_supergroups_after_their_base_groups() {
    let spec = GroupBySpec::slots(&[0, 1], vec![AggregateSpec::sum(2)]).with_rollup();
    let direct = [(1, 1, 10), (1, 2, 20), (2, 1, 5)]
        .into_iter()
        .map(|(a, b, v)| {
            let key = GroupKey::new(vec![Value::Int(a), Value::Int(b)]);
            DirectRow::input(key, row![a, b, v])
        })
        .collect();

    let mut out: Vec<OutputRow> = Vec::new();
    GroupByDriver::new(&spec, PartialStream::empty(), &NeverInterrupt)
        .run(direct, &mut out)
        .expect("drive");

    let shape: Vec<_> = out
        .iter()
        .map(|r| (r.key.clone(), r.aggregates[0].clone(), r.rollup_level))
        .collect();
    assert_eq!(
        shape,
        vec![
            (vec![Value::Int(1), Value::Int(1)], Value::Int(10), 0),
            (vec![Value::Int(1), Value::Int(2)], Value::Int(20), 0),
            (vec![Value::Int(1), Value::Null], Value::Int(30), 1),
            (vec![Value::Int(2), Value::Int(1)], Value::Int(5), 0),
            (vec![Value::Int(2), Value::Null], Value::Int(5), 1),
            (vec![Value::Null, Value::Null], Value::Int(35), 2),
        ]
    );
}
