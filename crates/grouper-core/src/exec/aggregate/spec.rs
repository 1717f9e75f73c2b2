use crate::{
    error::InternalError,
    exec::{row::Row, spec::GroupBySpecError},
    value::Value,
};
use derive_more::Display;

///
/// AggregateKind
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum AggregateKind {
    #[display("COUNT(*)")]
    CountStar,
    #[display("COUNT")]
    Count,
    #[display("SUM")]
    Sum,
    #[display("AVG")]
    Avg,
    #[display("MIN")]
    Min,
    #[display("MAX")]
    Max,
    #[display("BIT_AND")]
    BitAnd,
    #[display("BIT_OR")]
    BitOr,
    #[display("BIT_XOR")]
    BitXor,
    #[display("VARIANCE")]
    Variance,
    #[display("VAR_POP")]
    VarPop,
    #[display("VAR_SAMP")]
    VarSamp,
    #[display("STDDEV")]
    Stddev,
    #[display("STDDEV_POP")]
    StddevPop,
    #[display("STDDEV_SAMP")]
    StddevSamp,
    #[display("MEDIAN")]
    Median,
    #[display("PERCENTILE_CONT")]
    PercentileCont,
    #[display("PERCENTILE_DISC")]
    PercentileDisc,
}

impl AggregateKind {
    #[must_use]
    pub const fn requires_input(self) -> bool {
        !matches!(self, Self::CountStar)
    }

    #[must_use]
    pub const fn requires_percentile(self) -> bool {
        matches!(self, Self::PercentileCont | Self::PercentileDisc)
    }
}

///
/// AggregateSpec
///
/// One aggregate call: the function, its input slot and, for percentile
/// functions, the requested fraction. `distinct` folds each distinct
/// non-NULL input once per group.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AggregateSpec {
    pub kind: AggregateKind,
    pub input: Option<usize>,
    pub percentile: Option<f64>,
    pub distinct: bool,
}

impl AggregateSpec {
    #[must_use]
    pub const fn new(kind: AggregateKind, input: usize) -> Self {
        Self {
            kind,
            input: Some(input),
            percentile: None,
            distinct: false,
        }
    }

    #[must_use]
    pub const fn count_star() -> Self {
        Self {
            kind: AggregateKind::CountStar,
            input: None,
            percentile: None,
            distinct: false,
        }
    }

    #[must_use]
    pub const fn count(input: usize) -> Self {
        Self::new(AggregateKind::Count, input)
    }

    #[must_use]
    pub const fn sum(input: usize) -> Self {
        Self::new(AggregateKind::Sum, input)
    }

    #[must_use]
    pub const fn avg(input: usize) -> Self {
        Self::new(AggregateKind::Avg, input)
    }

    #[must_use]
    pub const fn min(input: usize) -> Self {
        Self::new(AggregateKind::Min, input)
    }

    #[must_use]
    pub const fn max(input: usize) -> Self {
        Self::new(AggregateKind::Max, input)
    }

    #[must_use]
    pub const fn median(input: usize) -> Self {
        Self::new(AggregateKind::Median, input)
    }

    #[must_use]
    pub const fn percentile_cont(input: usize, fraction: f64) -> Self {
        Self {
            kind: AggregateKind::PercentileCont,
            input: Some(input),
            percentile: Some(fraction),
            distinct: false,
        }
    }

    #[must_use]
    pub const fn percentile_disc(input: usize, fraction: f64) -> Self {
        Self {
            kind: AggregateKind::PercentileDisc,
            input: Some(input),
            percentile: Some(fraction),
            distinct: false,
        }
    }

    /// De-duplicate the operand before aggregating, as in `SUM(DISTINCT x)`.
    #[must_use]
    pub const fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Check the call shape: required input present, percentile in `[0, 1]`.
    pub fn validate(&self) -> Result<(), GroupBySpecError> {
        if self.distinct && !self.kind.requires_input() {
            return Err(GroupBySpecError::DistinctWithoutInput { kind: self.kind });
        }
        if self.kind.requires_input() && self.input.is_none() {
            return Err(GroupBySpecError::MissingInput { kind: self.kind });
        }
        if self.kind.requires_percentile() {
            let Some(fraction) = self.percentile else {
                return Err(GroupBySpecError::MissingPercentile { kind: self.kind });
            };
            if !(0.0..=1.0).contains(&fraction) {
                return Err(GroupBySpecError::PercentileOutOfRange {
                    kind: self.kind,
                    fraction,
                });
            }
        }

        Ok(())
    }

    /// Fraction used at finalize; MEDIAN is the 0.5 continuous percentile.
    pub(crate) fn fraction(&self) -> f64 {
        match self.kind {
            AggregateKind::Median => 0.5,
            _ => self.percentile.unwrap_or(0.5),
        }
    }

    /// Read this aggregate's input value from `row`; `None` for COUNT(*).
    pub(crate) fn input_value<'r>(&self, row: &'r Row) -> Result<Option<&'r Value>, InternalError> {
        let Some(slot) = self.input else {
            return Ok(None);
        };

        row.get(slot).map(Some).ok_or_else(|| {
            InternalError::aggregate_invariant(format!(
                "{} input slot {slot} out of range for row of width {}",
                self.kind,
                row.len()
            ))
        })
    }
}
