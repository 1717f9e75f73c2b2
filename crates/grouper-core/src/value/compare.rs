use crate::{error::InternalError, value::Value};
use std::cmp::Ordering;

// Beyond this magnitude every f64 lies outside the i64/u64 range.
const F64_BEYOND_INT_RANGE: f64 = 2e19;

/// Total canonical comparator used by MIN/MAX and deterministic ordering.
///
/// Ordering rules:
/// 1. Canonical tag rank (NULL first)
/// 2. Variant-specific comparison for same-ranked values
///
/// Numeric variants share one rank and compare by exact magnitude.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = left.tag().to_u8().cmp(&right.tag().to_u8());
    if rank != Ordering::Equal {
        return rank;
    }

    #[allow(clippy::match_same_arms)]
    match (left, right) {
        (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => numeric_cmp(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Strict comparator for two non-NULL grouping values.
///
/// Values from different families (e.g. text vs integer) have no grouping
/// order and fail with a comparator error instead of a silent rank order.
pub fn grouping_cmp(left: &Value, right: &Value) -> Result<Ordering, InternalError> {
    if left.tag() != right.tag() {
        return Err(InternalError::key_comparator(format!(
            "incomparable grouping values: {left:?} vs {right:?}"
        )));
    }

    Ok(canonical_cmp(left, right))
}

fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Float64(a), Value::Float64(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Uint(a), Value::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Int(a), Value::Float64(b)) => Some(cmp_int_float(i128::from(*a), b.get())),
        (Value::Uint(a), Value::Float64(b)) => Some(cmp_int_float(i128::from(*a), b.get())),
        (Value::Float64(a), Value::Int(b)) => {
            Some(cmp_int_float(i128::from(*b), a.get()).reverse())
        }
        (Value::Float64(a), Value::Uint(b)) => {
            Some(cmp_int_float(i128::from(*b), a.get()).reverse())
        }
        _ => None,
    }
}

// Exact integer/float comparison; never rounds the integer through f64.
#[expect(clippy::cast_possible_truncation)]
fn cmp_int_float(int: i128, float: f64) -> Ordering {
    if float >= F64_BEYOND_INT_RANGE {
        return Ordering::Less;
    }
    if float <= -F64_BEYOND_INT_RANGE {
        return Ordering::Greater;
    }

    let whole = float.trunc() as i128;
    match int.cmp(&whole) {
        Ordering::Equal => {
            let fraction = float.fract();
            if fraction > 0.0 {
                Ordering::Less
            } else if fraction < 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        other => other,
    }
}
