use crate::{
    error::ErrorClass,
    serialize::{deserialize_bounded, serialize},
    value::{Float64, Value, canonical_cmp, grouping_cmp, stable_hash_values},
};
use std::cmp::Ordering;

// ---- helpers -----------------------------------------------------------

fn v_f64(x: f64) -> Value {
    Value::Float64(Float64::try_new(x).expect("finite f64"))
}
fn v_i(x: i64) -> Value {
    Value::Int(x)
}
fn v_u(x: u64) -> Value {
    Value::Uint(x)
}
fn v_txt(s: &str) -> Value {
    Value::Text(s.to_string())
}

// ---- comparison --------------------------------------------------------

#[test]
fn numeric_values_compare_across_variants_by_magnitude() {
    assert_eq!(canonical_cmp(&v_i(-1), &v_u(0)), Ordering::Less);
    assert_eq!(canonical_cmp(&v_u(3), &v_f64(2.5)), Ordering::Greater);
    assert_eq!(canonical_cmp(&v_f64(2.0), &v_i(2)), Ordering::Equal);
    assert_eq!(canonical_cmp(&v_i(2), &v_f64(2.25)), Ordering::Less);
    assert_eq!(canonical_cmp(&v_i(-2), &v_f64(-2.25)), Ordering::Greater);
}

#[test]
fn integer_float_comparison_does_not_round_large_integers() {
    let big = v_u(u64::MAX);
    let near = v_f64(1.8e19);

    assert_eq!(canonical_cmp(&big, &near), Ordering::Greater);
    assert_eq!(canonical_cmp(&v_i(i64::MAX), &v_f64(3e19)), Ordering::Less);
}

#[test]
fn canonical_cmp_orders_null_first() {
    assert_eq!(canonical_cmp(&Value::Null, &v_i(i64::MIN)), Ordering::Less);
    assert_eq!(canonical_cmp(&v_txt(""), &Value::Null), Ordering::Greater);
}

#[test]
fn grouping_cmp_rejects_mixed_families() {
    let err = grouping_cmp(&v_txt("a"), &v_i(1)).expect_err("text vs int has no order");

    assert_eq!(err.class, ErrorClass::Comparator);
}

#[test]
fn grouping_cmp_accepts_mixed_numeric_variants() {
    assert_eq!(
        grouping_cmp(&v_u(7), &v_i(7)).expect("numeric compare"),
        Ordering::Equal
    );
}

// ---- hashing -----------------------------------------------------------

#[test]
fn equal_numerics_share_stable_hash() {
    let as_int = stable_hash_values(&[v_i(42), v_txt("x")]);
    let as_uint = stable_hash_values(&[v_u(42), v_txt("x")]);
    let as_float = stable_hash_values(&[v_f64(42.0), v_txt("x")]);

    assert_eq!(as_int, as_uint);
    assert_eq!(as_int, as_float);
}

#[test]
#[expect(clippy::cast_precision_loss)]
fn integral_floats_hash_like_integers_across_full_range() {
    let signed = [i64::MIN, -9_210_000_000_000_000_000, -(1 << 53), 1 << 62];
    for i in signed {
        let float = v_f64(i as f64);
        assert_eq!(canonical_cmp(&v_i(i), &float), Ordering::Equal, "{i}");
        assert_eq!(
            stable_hash_values(&[v_i(i)]),
            stable_hash_values(&[float]),
            "{i}"
        );
    }

    let unsigned = [1 << 63, 18_400_000_000_000_000_000, u64::MAX - 2047];
    for u in unsigned {
        let float = v_f64(u as f64);
        assert_eq!(canonical_cmp(&v_u(u), &float), Ordering::Equal, "{u}");
        assert_eq!(
            stable_hash_values(&[v_u(u)]),
            stable_hash_values(&[float]),
            "{u}"
        );
    }
}

#[test]
fn floats_outside_integer_range_hash_as_floats() {
    // 2^64 has no integer counterpart and must not collide with u64::MAX.
    assert_ne!(
        stable_hash_values(&[v_f64(18_446_744_073_709_551_616.0)]),
        stable_hash_values(&[v_u(u64::MAX)])
    );
}

#[test]
fn stable_hash_depends_on_column_boundaries() {
    let left = stable_hash_values(&[v_txt("ab"), v_txt("c")]);
    let right = stable_hash_values(&[v_txt("a"), v_txt("bc")]);

    assert_ne!(left, right);
}

#[test]
fn negative_zero_is_canonicalized() {
    let neg = Float64::try_new(-0.0).expect("finite");

    assert_eq!(neg.get().to_bits(), 0.0f64.to_bits());
    assert!(Float64::try_new(f64::NAN).is_none());
    assert_eq!(Value::float(f64::INFINITY), Value::Null);
}

// ---- serialization -----------------------------------------------------

#[test]
fn float_deserialization_rejects_non_finite_payloads() {
    let bytes = serialize(&f64::NAN).expect("serialize raw f64");
    let decoded = deserialize_bounded::<Float64>(&bytes, 64);

    assert!(decoded.is_err());
}

#[test]
fn value_cbor_preserves_variants() {
    let values = vec![
        Value::Null,
        Value::Bool(true),
        v_i(-5),
        v_u(5),
        v_f64(1.5),
        v_txt("grouped"),
        Value::Blob(vec![1, 2, 3]),
    ];
    let bytes = serialize(&values).expect("serialize");
    let decoded: Vec<Value> = deserialize_bounded(&bytes, 1024).expect("deserialize");

    assert_eq!(decoded, values);
}
