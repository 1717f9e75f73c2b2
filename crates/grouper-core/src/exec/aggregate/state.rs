use crate::{
    error::{ErrorOrigin, InternalError},
    exec::aggregate::{AggregateKind, AggregateSpec},
    value::{Value, canonical_cmp},
};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, mem::size_of};

///
/// SumValue
///
/// Running SUM. Integer sums stay exact until they leave the 64-bit range,
/// then promote to float for the rest of the group.
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub(crate) enum SumValue {
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl SumValue {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(Self::Int(*v)),
            Value::Uint(v) => Some(Self::Uint(*v)),
            Value::Float64(v) => Some(Self::Float(v.get())),
            _ => None,
        }
    }

    fn exact(self) -> Option<i128> {
        match self {
            Self::Int(v) => Some(i128::from(v)),
            Self::Uint(v) => Some(i128::from(v)),
            Self::Float(_) => None,
        }
    }

    fn integral(v: i128) -> Self {
        if let Ok(v) = i64::try_from(v) {
            Self::Int(v)
        } else if let Ok(v) = u64::try_from(v) {
            Self::Uint(v)
        } else {
            Self::Float(v.to_f64().unwrap_or(f64::MAX))
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Self::Int(v) => v.to_f64().unwrap_or_default(),
            Self::Uint(v) => v.to_f64().unwrap_or_default(),
            Self::Float(v) => v,
        }
    }

    fn add(self, other: Self) -> Result<Self, InternalError> {
        match (self.exact(), other.exact()) {
            (Some(left), Some(right)) => Ok(Self::integral(left + right)),
            _ => {
                let sum = self.to_f64() + other.to_f64();
                if sum.is_finite() {
                    Ok(Self::Float(sum))
                } else {
                    Err(InternalError::aggregate_overflow(
                        "floating-point sum overflowed the double range",
                    ))
                }
            }
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Int(v) => Value::Int(v),
            Self::Uint(v) => Value::Uint(v),
            Self::Float(v) => Value::float(v),
        }
    }
}

fn add_sum(slot: &mut Option<SumValue>, value: SumValue) -> Result<(), InternalError> {
    *slot = Some(match *slot {
        Some(current) => current.add(value)?,
        None => value,
    });

    Ok(())
}

// Running sums of squares overflow long before the inputs do.
fn check_moments(sum: f64, sum_sq: f64) -> Result<(), InternalError> {
    if sum.is_finite() && sum_sq.is_finite() {
        Ok(())
    } else {
        Err(InternalError::aggregate_overflow(
            "variance moments overflowed the double range",
        ))
    }
}

fn count_f64(count: u64) -> f64 {
    count.to_f64().unwrap_or(f64::MAX)
}

///
/// AggregateState
///
/// Mergeable per-function state. Serialized verbatim into spill records.
/// DISTINCT calls hold their operand set, ordered by `canonical_cmp`, and
/// fold it into the function's own state at finalize.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub(crate) enum AggregateState {
    Count(u64),
    Sum(Option<SumValue>),
    Avg {
        count: u64,
        sum: Option<SumValue>,
    },
    Min(Option<Value>),
    Max(Option<Value>),
    BitAnd(Option<u64>),
    BitOr(Option<u64>),
    BitXor(Option<u64>),
    Moments {
        count: u64,
        sum: f64,
        sum_sq: f64,
    },
    Values(Vec<f64>),
    Distinct(Vec<Value>),
}

impl AggregateState {
    pub(crate) const fn new(spec: &AggregateSpec) -> Self {
        if spec.distinct {
            Self::Distinct(Vec::new())
        } else {
            Self::for_kind(spec.kind)
        }
    }

    const fn for_kind(kind: AggregateKind) -> Self {
        match kind {
            AggregateKind::CountStar | AggregateKind::Count => Self::Count(0),
            AggregateKind::Sum => Self::Sum(None),
            AggregateKind::Avg => Self::Avg { count: 0, sum: None },
            AggregateKind::Min => Self::Min(None),
            AggregateKind::Max => Self::Max(None),
            AggregateKind::BitAnd => Self::BitAnd(None),
            AggregateKind::BitOr => Self::BitOr(None),
            AggregateKind::BitXor => Self::BitXor(None),
            AggregateKind::Variance
            | AggregateKind::VarPop
            | AggregateKind::VarSamp
            | AggregateKind::Stddev
            | AggregateKind::StddevPop
            | AggregateKind::StddevSamp => Self::Moments {
                count: 0,
                sum: 0.0,
                sum_sq: 0.0,
            },
            AggregateKind::Median
            | AggregateKind::PercentileCont
            | AggregateKind::PercentileDisc => Self::Values(Vec::new()),
        }
    }

    /// Fold one input value into the state. NULL inputs are ignored by
    /// every function except COUNT(*).
    pub(crate) fn accumulate(
        &mut self,
        spec: &AggregateSpec,
        input: Option<&Value>,
    ) -> Result<(), InternalError> {
        if spec.kind == AggregateKind::CountStar {
            if let Self::Count(count) = self {
                *count = count.saturating_add(1);
            }
            return Ok(());
        }

        let Some(value) = input.filter(|value| !value.is_null()) else {
            return Ok(());
        };

        match self {
            Self::Count(count) => *count = count.saturating_add(1),
            Self::Sum(sum) => add_sum(sum, numeric_input(spec, value)?)?,
            Self::Avg { count, sum } => {
                add_sum(sum, numeric_input(spec, value)?)?;
                *count = count.saturating_add(1);
            }
            Self::Min(best) => keep_extreme(best, value, Ordering::Less),
            Self::Max(best) => keep_extreme(best, value, Ordering::Greater),
            Self::BitAnd(acc) => {
                let bits = bits_input(spec, value)?;
                *acc = Some(acc.map_or(bits, |current| current & bits));
            }
            Self::BitOr(acc) => {
                let bits = bits_input(spec, value)?;
                *acc = Some(acc.map_or(bits, |current| current | bits));
            }
            Self::BitXor(acc) => {
                let bits = bits_input(spec, value)?;
                *acc = Some(acc.map_or(bits, |current| current ^ bits));
            }
            Self::Moments { count, sum, sum_sq } => {
                let v = numeric_input(spec, value)?.to_f64();
                *count = count.saturating_add(1);
                *sum += v;
                *sum_sq += v * v;
                check_moments(*sum, *sum_sq)?;
            }
            Self::Values(values) => {
                let v = numeric_input(spec, value)?.to_f64();
                values.try_reserve(1).map_err(|_| {
                    InternalError::out_of_memory(
                        ErrorOrigin::Aggregate,
                        "percentile value buffer",
                        size_of::<f64>() as u64,
                    )
                })?;
                values.push(v);
            }
            Self::Distinct(values) => {
                check_operand(spec, value)?;
                insert_distinct(values, value.clone())?;
            }
        }

        Ok(())
    }

    /// Merge a partial state of the same function into this one.
    pub(crate) fn merge(&mut self, other: Self) -> Result<(), InternalError> {
        match (self, other) {
            (Self::Count(left), Self::Count(right)) => *left = left.saturating_add(right),
            (Self::Sum(left), Self::Sum(right)) => {
                if let Some(right) = right {
                    add_sum(left, right)?;
                }
            }
            (
                Self::Avg { count, sum },
                Self::Avg {
                    count: right_count,
                    sum: right_sum,
                },
            ) => {
                *count = count.saturating_add(right_count);
                if let Some(right_sum) = right_sum {
                    add_sum(sum, right_sum)?;
                }
            }
            (Self::Min(left), Self::Min(right)) => {
                if let Some(right) = right {
                    keep_extreme(left, &right, Ordering::Less);
                }
            }
            (Self::Max(left), Self::Max(right)) => {
                if let Some(right) = right {
                    keep_extreme(left, &right, Ordering::Greater);
                }
            }
            (Self::BitAnd(left), Self::BitAnd(right)) => merge_bits(left, right, |a, b| a & b),
            (Self::BitOr(left), Self::BitOr(right)) => merge_bits(left, right, |a, b| a | b),
            (Self::BitXor(left), Self::BitXor(right)) => merge_bits(left, right, |a, b| a ^ b),
            (
                Self::Moments { count, sum, sum_sq },
                Self::Moments {
                    count: right_count,
                    sum: right_sum,
                    sum_sq: right_sum_sq,
                },
            ) => {
                *count = count.saturating_add(right_count);
                *sum += right_sum;
                *sum_sq += right_sum_sq;
                check_moments(*sum, *sum_sq)?;
            }
            (Self::Values(left), Self::Values(mut right)) => {
                left.try_reserve(right.len()).map_err(|_| {
                    InternalError::out_of_memory(
                        ErrorOrigin::Aggregate,
                        "percentile value buffer",
                        (right.len() * size_of::<f64>()) as u64,
                    )
                })?;
                left.append(&mut right);
            }
            (Self::Distinct(left), Self::Distinct(right)) => {
                for value in right {
                    insert_distinct(left, value)?;
                }
            }
            (left, right) => {
                return Err(InternalError::aggregate_invariant(format!(
                    "cannot merge mismatched aggregate states: {left:?} vs {right:?}"
                )));
            }
        }

        Ok(())
    }

    /// Produce the aggregate's output value.
    pub(crate) fn finalize(self, spec: &AggregateSpec) -> Result<Value, InternalError> {
        Ok(match self {
            Self::Count(count) => Value::Uint(count),
            Self::Sum(sum) => sum.map_or(Value::Null, SumValue::into_value),
            Self::Avg { count, sum } => match sum {
                Some(sum) if count > 0 => Value::float(sum.to_f64() / count_f64(count)),
                _ => Value::Null,
            },
            Self::Min(best) | Self::Max(best) => best.unwrap_or(Value::Null),
            Self::BitAnd(acc) | Self::BitOr(acc) | Self::BitXor(acc) => {
                acc.map_or(Value::Null, Value::Uint)
            }
            Self::Moments { count, sum, sum_sq } => finalize_moments(spec.kind, count, sum, sum_sq),
            Self::Values(mut values) => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                values.sort_by(f64::total_cmp);
                let fraction = spec.fraction();
                let picked = if spec.kind == AggregateKind::PercentileDisc {
                    percentile_disc(&values, fraction)
                } else {
                    percentile_cont(&values, fraction)
                };

                Value::float(picked)
            }
            Self::Distinct(values) => return Self::finalize_distinct(spec, &values),
        })
    }

    fn finalize_distinct(spec: &AggregateSpec, values: &[Value]) -> Result<Value, InternalError> {
        let mut state = Self::for_kind(spec.kind);
        for value in values {
            state.accumulate(spec, Some(value))?;
        }

        state.finalize(spec)
    }

    /// Approximate resident size of this state.
    pub(crate) fn estimated_size(&self) -> usize {
        let heap = match self {
            Self::Min(Some(value)) | Self::Max(Some(value)) => value.estimated_size(),
            Self::Values(values) => values.capacity().saturating_mul(size_of::<f64>()),
            Self::Distinct(values) => values
                .iter()
                .map(Value::estimated_size)
                .fold(0, usize::saturating_add),
            _ => 0,
        };

        size_of::<Self>().saturating_add(heap)
    }
}

fn numeric_input(spec: &AggregateSpec, value: &Value) -> Result<SumValue, InternalError> {
    SumValue::from_value(value).ok_or_else(|| {
        InternalError::aggregate_unsupported(format!(
            "{} requires numeric input, found {value:?}",
            spec.kind
        ))
    })
}

// DISTINCT operands are type-checked as they arrive, not at finalize.
fn check_operand(spec: &AggregateSpec, value: &Value) -> Result<(), InternalError> {
    match spec.kind {
        AggregateKind::CountStar
        | AggregateKind::Count
        | AggregateKind::Min
        | AggregateKind::Max => Ok(()),
        AggregateKind::BitAnd | AggregateKind::BitOr | AggregateKind::BitXor => {
            bits_input(spec, value).map(|_| ())
        }
        _ => numeric_input(spec, value).map(|_| ()),
    }
}

// Insert unless an operand comparing equal is already held; the first seen wins.
fn insert_distinct(values: &mut Vec<Value>, value: Value) -> Result<(), InternalError> {
    let Err(at) = values.binary_search_by(|held| canonical_cmp(held, &value)) else {
        return Ok(());
    };
    values.try_reserve(1).map_err(|_| {
        InternalError::out_of_memory(
            ErrorOrigin::Aggregate,
            "distinct value set",
            value.estimated_size() as u64,
        )
    })?;
    values.insert(at, value);

    Ok(())
}

fn bits_input(spec: &AggregateSpec, value: &Value) -> Result<u64, InternalError> {
    value.to_bits_u64().ok_or_else(|| {
        InternalError::aggregate_unsupported(format!(
            "{} requires integer input, found {value:?}",
            spec.kind
        ))
    })
}

// Replace `best` when `candidate` compares as `wanted` against it.
fn keep_extreme(best: &mut Option<Value>, candidate: &Value, wanted: Ordering) {
    let replace = best
        .as_ref()
        .is_none_or(|current| canonical_cmp(candidate, current) == wanted);
    if replace {
        *best = Some(candidate.clone());
    }
}

fn merge_bits(left: &mut Option<u64>, right: Option<u64>, op: impl Fn(u64, u64) -> u64) {
    if let Some(right) = right {
        *left = Some(left.map_or(right, |current| op(current, right)));
    }
}

fn finalize_moments(kind: AggregateKind, count: u64, sum: f64, sum_sq: f64) -> Value {
    let sample = matches!(kind, AggregateKind::VarSamp | AggregateKind::StddevSamp);
    if count == 0 || (sample && count < 2) {
        return Value::Null;
    }

    let n = count_f64(count);
    let divisor = if sample { n - 1.0 } else { n };
    // Rounding can push a zero spread slightly negative.
    let mean = sum / n;
    let variance = ((sum_sq - mean * sum) / divisor).max(0.0);

    match kind {
        AggregateKind::Stddev | AggregateKind::StddevPop | AggregateKind::StddevSamp => {
            Value::float(variance.sqrt())
        }
        _ => Value::float(variance),
    }
}

// Linear interpolation between the two rows bracketing `fraction * (n - 1)`.
fn percentile_cont(sorted: &[f64], fraction: f64) -> f64 {
    let last = sorted.len().saturating_sub(1);
    let row = fraction * count_f64(last as u64);
    let lower = row.floor().to_usize().unwrap_or(0).min(last);
    let upper = row.ceil().to_usize().unwrap_or(0).min(last);

    if lower == upper {
        sorted[lower]
    } else {
        let weight = row - row.floor();
        sorted[lower].mul_add(1.0 - weight, sorted[upper] * weight)
    }
}

// First value whose cumulative distribution reaches `fraction`.
fn percentile_disc(sorted: &[f64], fraction: f64) -> f64 {
    let last = sorted.len().saturating_sub(1);
    let rank = (fraction * count_f64(sorted.len() as u64))
        .ceil()
        .to_usize()
        .unwrap_or(0);

    sorted[rank.saturating_sub(1).min(last)]
}
