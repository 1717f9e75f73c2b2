//! GROUP BY invocation description and its validation.

use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    exec::{
        aggregate::{AggregateKind, AggregateSpec},
        key::{KeyAccessors, KeyOrder},
        predicate::{GroupLimit, GroupPredicate},
    },
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// GroupingMode
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum GroupingMode {
    #[default]
    Plain,
    Rollup,
    Cube,
}

///
/// GroupBySpecError
///

#[derive(Debug, ThisError)]
pub enum GroupBySpecError {
    #[error("group by requires at least one aggregate")]
    NoAggregates,

    #[error("grouping slot {slot} appears more than once")]
    DuplicateKeySlot { slot: usize },

    #[error("key order has {order} columns but only {keys} grouping keys")]
    KeyOrderWidth { order: usize, keys: usize },

    #[error("{kind} requires an input column")]
    MissingInput { kind: AggregateKind },

    #[error("{kind} requires a percentile fraction")]
    MissingPercentile { kind: AggregateKind },

    #[error("{kind} fraction {fraction} is outside [0, 1]")]
    PercentileOutOfRange { kind: AggregateKind, fraction: f64 },

    #[error("{kind} does not accept DISTINCT")]
    DistinctWithoutInput { kind: AggregateKind },

    #[error("CUBE grouping is not supported")]
    CubeUnsupported,
}

impl From<GroupBySpecError> for InternalError {
    fn from(err: GroupBySpecError) -> Self {
        let origin = match err {
            GroupBySpecError::MissingInput { .. }
            | GroupBySpecError::MissingPercentile { .. }
            | GroupBySpecError::PercentileOutOfRange { .. }
            | GroupBySpecError::DistinctWithoutInput { .. } => ErrorOrigin::Aggregate,
            _ => ErrorOrigin::Config,
        };

        Self::new(ErrorClass::Unsupported, origin, err.to_string())
    }
}

///
/// GroupBySpec
///
/// Grouping columns, their order, aggregate calls and group-level predicates
/// for one GROUP BY.
///

pub struct GroupBySpec {
    pub(crate) keys: KeyAccessors,
    pub(crate) key_order: KeyOrder,
    pub(crate) aggregates: Vec<AggregateSpec>,
    pub(crate) mode: GroupingMode,
    pub(crate) having: Option<Box<dyn GroupPredicate>>,
    pub(crate) limit: Option<GroupLimit>,
}

impl GroupBySpec {
    /// Ascending, NULLs-first grouping over `keys`.
    #[must_use]
    pub fn new(keys: KeyAccessors, aggregates: Vec<AggregateSpec>) -> Self {
        let key_order = KeyOrder::ascending(keys.len());

        Self {
            keys,
            key_order,
            aggregates,
            mode: GroupingMode::Plain,
            having: None,
            limit: None,
        }
    }

    /// Group by the given positional slots.
    #[must_use]
    pub fn slots(slots: &[usize], aggregates: Vec<AggregateSpec>) -> Self {
        Self::new(KeyAccessors::slots(slots), aggregates)
    }

    #[must_use]
    pub fn with_key_order(mut self, key_order: KeyOrder) -> Self {
        self.key_order = key_order;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: GroupingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn with_rollup(self) -> Self {
        self.with_mode(GroupingMode::Rollup)
    }

    #[must_use]
    pub fn with_having(mut self, having: impl GroupPredicate + 'static) -> Self {
        self.having = Some(Box::new(having));
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: GroupLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn aggregates(&self) -> &[AggregateSpec] {
        &self.aggregates
    }

    #[must_use]
    pub const fn mode(&self) -> GroupingMode {
        self.mode
    }

    #[must_use]
    pub const fn is_rollup(&self) -> bool {
        matches!(self.mode, GroupingMode::Rollup)
    }

    /// True when any aggregate de-duplicates its input. Such plans group
    /// on the sort path only.
    #[must_use]
    pub fn has_distinct(&self) -> bool {
        self.aggregates.iter().any(|aggregate| aggregate.distinct)
    }

    /// Check the plan shape before any row is read.
    pub fn validate(&self) -> Result<(), GroupBySpecError> {
        if self.aggregates.is_empty() {
            return Err(GroupBySpecError::NoAggregates);
        }
        for aggregate in &self.aggregates {
            aggregate.validate()?;
        }

        let mut seen = BTreeSet::new();
        for slot in self.keys.slots_read() {
            if !seen.insert(slot) {
                return Err(GroupBySpecError::DuplicateKeySlot { slot });
            }
        }

        if self.key_order.columns().len() > self.keys.len() {
            return Err(GroupBySpecError::KeyOrderWidth {
                order: self.key_order.columns().len(),
                keys: self.keys.len(),
            });
        }

        if self.mode == GroupingMode::Cube {
            return Err(GroupBySpecError::CubeUnsupported);
        }

        Ok(())
    }
}

impl std::fmt::Debug for GroupBySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupBySpec")
            .field("keys", &self.keys)
            .field("key_order", &self.key_order)
            .field("aggregates", &self.aggregates)
            .field("mode", &self.mode)
            .field("having", &self.having.is_some())
            .field("limit", &self.limit)
            .finish()
    }
}

///
/// TESTS
///
