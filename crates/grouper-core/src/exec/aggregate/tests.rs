use super::*;
use crate::{
    error::{ErrorClass, ErrorOrigin},
    exec::{row::Row, spec::GroupBySpecError},
    row,
    serialize::{deserialize_bounded, serialize},
    value::Value,
};
use proptest::prelude::*;

fn fold(specs: &[AggregateSpec], rows: &[Row]) -> AccumulatorSet {
    let mut set = AccumulatorSet::new(specs);
    for row in rows {
        set.accumulate(specs, row).expect("accumulate");
    }

    set
}

fn finalize(specs: &[AggregateSpec], rows: &[Row]) -> Vec<Value> {
    fold(specs, rows).finalize(specs).expect("finalize")
}

fn single_column(values: impl IntoIterator<Item = Value>) -> Vec<Row> {
    values.into_iter().map(|v| Row::new(vec![v])).collect()
}

fn assert_float(value: &Value, expected: f64) {
    let Value::Float64(actual) = value else {
        panic!("expected float result, found {value:?}");
    };
    assert!(
        (actual.get() - expected).abs() < 1e-9,
        "expected {expected}, found {}",
        actual.get()
    );
}

#[test]
fn count_star_counts_nulls_but_count_skips_them() {
    let specs = [AggregateSpec::count_star(), AggregateSpec::count(0)];
    let rows = single_column([Value::Int(1), Value::Null, Value::Int(3)]);

    assert_eq!(finalize(&specs, &rows), vec![Value::Uint(3), Value::Uint(2)]);
}

#[test]
fn empty_groups_finalize_to_null_except_counts() {
    let specs = [
        AggregateSpec::count_star(),
        AggregateSpec::sum(0),
        AggregateSpec::avg(0),
        AggregateSpec::min(0),
        AggregateSpec::new(AggregateKind::BitAnd, 0),
        AggregateSpec::median(0),
    ];

    assert_eq!(
        finalize(&specs, &[]),
        vec![
            Value::Uint(0),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
        ]
    );
}

#[test]
fn sum_stays_exact_then_promotes_past_u64() {
    let specs = [AggregateSpec::sum(0)];

    let exact = finalize(&specs, &single_column([Value::Int(i64::MAX), Value::Int(1)]));
    assert_eq!(exact, vec![Value::Uint(1u64 << 63)]);

    let promoted = finalize(&specs, &single_column([Value::Uint(u64::MAX), Value::Uint(1)]));
    assert_float(&promoted[0], 18_446_744_073_709_551_616.0);
}

#[test]
fn avg_ignores_nulls() {
    let specs = [AggregateSpec::avg(0)];
    let rows = single_column([Value::Int(1), Value::Int(2), Value::Null, Value::Int(6)]);

    assert_float(&finalize(&specs, &rows)[0], 3.0);
}

#[test]
fn min_max_compare_numerics_across_variants() {
    let specs = [AggregateSpec::min(0), AggregateSpec::max(0)];
    let rows = single_column([Value::Int(3), Value::float(1.5), Value::Uint(7)]);

    assert_eq!(
        finalize(&specs, &rows),
        vec![Value::float(1.5), Value::Uint(7)]
    );
}

#[test]
fn bit_aggregates_fold_bit_patterns() {
    let specs = [
        AggregateSpec::new(AggregateKind::BitAnd, 0),
        AggregateSpec::new(AggregateKind::BitOr, 0),
        AggregateSpec::new(AggregateKind::BitXor, 0),
    ];
    let rows = single_column([Value::Int(0b1100), Value::Int(0b1010)]);

    assert_eq!(
        finalize(&specs, &rows),
        vec![Value::Uint(0b1000), Value::Uint(0b1110), Value::Uint(0b0110)]
    );
}

#[test]
fn variance_and_stddev_population_and_sample() {
    let specs = [
        AggregateSpec::new(AggregateKind::VarPop, 0),
        AggregateSpec::new(AggregateKind::StddevPop, 0),
        AggregateSpec::new(AggregateKind::VarSamp, 0),
        AggregateSpec::new(AggregateKind::Variance, 0),
    ];
    let rows = single_column([2, 4, 4, 4, 5, 5, 7, 9].map(Value::Int));

    let out = finalize(&specs, &rows);
    assert_float(&out[0], 4.0);
    assert_float(&out[1], 2.0);
    assert_float(&out[2], 32.0 / 7.0);
    assert_float(&out[3], 4.0);
}

#[test]
fn sample_variance_of_one_row_is_null() {
    let specs = [
        AggregateSpec::new(AggregateKind::VarSamp, 0),
        AggregateSpec::new(AggregateKind::StddevSamp, 0),
    ];

    assert_eq!(
        finalize(&specs, &single_column([Value::Int(5)])),
        vec![Value::Null, Value::Null]
    );
}

#[test]
fn percentiles_interpolate_or_pick() {
    let specs = [
        AggregateSpec::median(0),
        AggregateSpec::percentile_cont(0, 0.25),
        AggregateSpec::percentile_disc(0, 0.5),
        AggregateSpec::percentile_disc(0, 0.0),
        AggregateSpec::percentile_disc(0, 1.0),
    ];
    let rows = single_column([4, 1, 3, 2].map(Value::Int));

    let out = finalize(&specs, &rows);
    assert_float(&out[0], 2.5);
    assert_float(&out[1], 1.75);
    assert_float(&out[2], 2.0);
    assert_float(&out[3], 1.0);
    assert_float(&out[4], 4.0);
}

#[test]
fn percentile_merge_concatenates_partials() {
    let specs = [AggregateSpec::median(0)];
    let mut left = fold(&specs, &single_column([1, 9].map(Value::Int)));
    let right = fold(&specs, &single_column([5].map(Value::Int)));

    left.merge(right).expect("merge");
    assert_float(&left.finalize(&specs).expect("finalize")[0], 5.0);
}

#[test]
fn sum_rejects_text_input() {
    let specs = [AggregateSpec::sum(0)];
    let mut set = AccumulatorSet::new(&specs);

    let err = set
        .accumulate(&specs, &row!["abc"])
        .expect_err("text input must be rejected");
    assert_eq!(err.class, ErrorClass::Unsupported);
}

#[test]
fn float_sum_overflow_is_an_error_not_null() {
    let specs = [AggregateSpec::sum(0)];
    let mut set = AccumulatorSet::new(&specs);
    set.accumulate(&specs, &row![Value::float(1e308)]).expect("first addend fits");

    let err = set
        .accumulate(&specs, &row![Value::float(1e308)])
        .expect_err("sum past f64::MAX must fail");
    assert_eq!(err.class, ErrorClass::Overflow);
    assert_eq!(err.origin, ErrorOrigin::Aggregate);
}

#[test]
fn float_overflow_is_detected_when_merging_partials() {
    let specs = [AggregateSpec::avg(0), AggregateSpec::sum(0)];
    let mut left = fold(&specs, &single_column([Value::float(1e308)]));
    let right = fold(&specs, &single_column([Value::float(1e308)]));

    let err = left.merge(right).expect_err("merged sum past f64::MAX must fail");
    assert_eq!(err.class, ErrorClass::Overflow);
}

#[test]
fn variance_overflow_in_sum_of_squares_is_an_error() {
    let specs = [AggregateSpec::new(AggregateKind::VarPop, 0)];
    let mut set = AccumulatorSet::new(&specs);

    let err = set
        .accumulate(&specs, &row![Value::float(1e200)])
        .expect_err("square past f64::MAX must fail");
    assert_eq!(err.class, ErrorClass::Overflow);
}

#[test]
fn extreme_inputs_stay_finite_where_the_result_fits() {
    let specs = [AggregateSpec::median(0), AggregateSpec::sum(0)];
    let rows = single_column([Value::float(-1.7e308), Value::float(1.7e308)]);

    let out = finalize(&specs, &rows);
    assert_float(&out[0], 0.0);
    assert_float(&out[1], 0.0);
}

#[test]
fn distinct_counts_and_sums_each_value_once() {
    let specs = [
        AggregateSpec::count(0).with_distinct(),
        AggregateSpec::sum(0).with_distinct(),
        AggregateSpec::avg(0).with_distinct(),
        AggregateSpec::count(0),
    ];
    let rows = single_column([
        Value::Int(3),
        Value::Null,
        Value::float(3.0),
        Value::Uint(3),
        Value::Int(5),
        Value::Int(5),
    ]);

    let out = finalize(&specs, &rows);
    assert_eq!(out[0], Value::Uint(2));
    assert_eq!(out[1], Value::Int(8));
    assert_float(&out[2], 4.0);
    assert_eq!(out[3], Value::Uint(5));
}

#[test]
fn distinct_merge_is_a_set_union() {
    let specs = [
        AggregateSpec::count(0).with_distinct(),
        AggregateSpec::sum(0).with_distinct(),
    ];
    let mut left = fold(&specs, &single_column([1, 2, 2].map(Value::Int)));
    let right = fold(&specs, &single_column([2, 3].map(Value::Int)));

    left.merge(right).expect("merge");
    assert_eq!(
        left.finalize(&specs).expect("finalize"),
        vec![Value::Uint(3), Value::Int(6)]
    );
}

#[test]
fn distinct_operands_are_type_checked_on_arrival() {
    let specs = [AggregateSpec::sum(0).with_distinct()];
    let mut set = AccumulatorSet::new(&specs);

    let err = set
        .accumulate(&specs, &row!["abc"])
        .expect_err("text input must be rejected");
    assert_eq!(err.class, ErrorClass::Unsupported);
}

#[test]
fn distinct_over_no_values_finalizes_like_the_plain_function() {
    let specs = [
        AggregateSpec::count(0).with_distinct(),
        AggregateSpec::sum(0).with_distinct(),
    ];

    assert_eq!(
        finalize(&specs, &single_column([Value::Null])),
        vec![Value::Uint(0), Value::Null]
    );
}

#[test]
fn merge_rejects_mismatched_states() {
    let mut sums = AccumulatorSet::new(&[AggregateSpec::sum(0)]);
    let mins = AccumulatorSet::new(&[AggregateSpec::min(0)]);

    let err = sums.merge(mins).expect_err("mismatched merge must fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn input_slot_out_of_range_is_invariant_violation() {
    let specs = [AggregateSpec::sum(3)];
    let mut set = AccumulatorSet::new(&specs);

    let err = set
        .accumulate(&specs, &row![1])
        .expect_err("missing slot must fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn spec_validation_checks_inputs_and_fractions() {
    let missing = AggregateSpec {
        kind: AggregateKind::Sum,
        input: None,
        percentile: None,
        distinct: false,
    };
    assert!(matches!(
        missing.validate(),
        Err(GroupBySpecError::MissingInput {
            kind: AggregateKind::Sum
        })
    ));
    assert!(matches!(
        AggregateSpec::percentile_cont(0, 1.5).validate(),
        Err(GroupBySpecError::PercentileOutOfRange { .. })
    ));
    assert!(AggregateSpec::count_star().validate().is_ok());
    assert!(AggregateSpec::percentile_disc(0, 1.0).validate().is_ok());
    assert!(matches!(
        AggregateSpec::count_star().with_distinct().validate(),
        Err(GroupBySpecError::DistinctWithoutInput { .. })
    ));
    assert!(AggregateSpec::count(0).with_distinct().validate().is_ok());
}

#[test]
fn accumulator_set_survives_spill_encoding() {
    let specs = [
        AggregateSpec::sum(0),
        AggregateSpec::max(0),
        AggregateSpec::median(0),
        AggregateSpec::count(0).with_distinct(),
    ];
    let set = fold(&specs, &single_column([Value::Int(2), Value::float(3.5)]));

    let bytes = serialize(&set).expect("serialize");
    let decoded: AccumulatorSet = deserialize_bounded(&bytes, 1024).expect("deserialize");

    assert_eq!(decoded, set);
}

#[test]
fn kind_display_uses_sql_names() {
    assert_eq!(AggregateKind::CountStar.to_string(), "COUNT(*)");
    assert_eq!(AggregateKind::PercentileDisc.to_string(), "PERCENTILE_DISC");
}

///
/// PROPERTIES
///

fn mergeable_specs() -> Vec<AggregateSpec> {
    vec![
        AggregateSpec::count_star(),
        AggregateSpec::count(0),
        AggregateSpec::sum(0),
        AggregateSpec::min(0),
        AggregateSpec::max(0),
        AggregateSpec::new(AggregateKind::BitAnd, 0),
        AggregateSpec::new(AggregateKind::BitOr, 0),
        AggregateSpec::new(AggregateKind::BitXor, 0),
        AggregateSpec::count(0).with_distinct(),
        AggregateSpec::sum(0).with_distinct(),
    ]
}

fn arb_input() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|v| Value::Int(i64::from(v))),
        any::<u32>().prop_map(|v| Value::Uint(u64::from(v))),
        Just(Value::Null),
    ]
}

proptest! {
    #[test]
    fn merge_is_associative_and_matches_single_fold(
        values in prop::collection::vec(arb_input(), 0..40),
        cut_a in 0usize..40,
        cut_b in 0usize..40,
    ) {
        let specs = mergeable_specs();
        let rows = single_column(values);
        let (lo, hi) = (cut_a.min(cut_b).min(rows.len()), cut_a.max(cut_b).min(rows.len()));
        let (a, b, c) = (&rows[..lo], &rows[lo..hi], &rows[hi..]);

        let mut left_first = fold(&specs, a);
        left_first.merge(fold(&specs, b)).expect("merge");
        left_first.merge(fold(&specs, c)).expect("merge");

        let mut right_first = fold(&specs, b);
        right_first.merge(fold(&specs, c)).expect("merge");
        let mut outer = fold(&specs, a);
        outer.merge(right_first).expect("merge");

        let whole = finalize(&specs, &rows);
        prop_assert_eq!(left_first.finalize(&specs).expect("finalize"), whole.clone());
        prop_assert_eq!(outer.finalize(&specs).expect("finalize"), whole);
    }
}
