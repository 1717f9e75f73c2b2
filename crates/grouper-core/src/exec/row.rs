//! Row model plus the source/sink boundaries of one GROUP BY invocation.

use crate::{error::InternalError, value::Value};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, mem::size_of};

///
/// Row
///
/// Ordered, positional vector of values produced by the upstream scan.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Approximate resident size, used by hash-table memory accounting.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        self.values
            .iter()
            .map(Value::estimated_size)
            .fold(size_of::<Self>(), usize::saturating_add)
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Build a row from a list of values convertible into [`Value`].
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::exec::Row::new(vec![$($crate::value::Value::from($value)),*])
    };
}

///
/// RowSource
///
/// Pull-based upstream producer. `Ok(None)` marks end of input.
///

pub trait RowSource {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError>;
}

///
/// VecRowSource
///

#[derive(Clone, Debug, Default)]
pub struct VecRowSource {
    rows: VecDeque<Row>,
}

impl VecRowSource {
    #[must_use]
    pub fn new(rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowSource for VecRowSource {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError> {
        Ok(self.rows.pop_front())
    }
}

///
/// RowSink
///
/// Downstream consumer of finalized group rows.
///

pub trait RowSink<R> {
    fn push(&mut self, row: R) -> Result<(), InternalError>;
}

impl<R> RowSink<R> for Vec<R> {
    fn push(&mut self, row: R) -> Result<(), InternalError> {
        Self::push(self, row);
        Ok(())
    }
}

///
/// TESTS
///
