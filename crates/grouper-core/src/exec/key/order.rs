use crate::{
    error::InternalError,
    value::{Value, grouping_cmp},
};
use std::cmp::Ordering;

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

///
/// NullOrder
///
/// Placement of NULL grouping values, independent of direction.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NullOrder {
    #[default]
    First,
    Last,
}

///
/// SortColumn
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SortColumn {
    pub direction: SortDirection,
    pub nulls: NullOrder,
}

impl SortColumn {
    #[must_use]
    pub const fn new(direction: SortDirection, nulls: NullOrder) -> Self {
        Self { direction, nulls }
    }

    fn compare(self, left: &Value, right: &Value) -> Result<Ordering, InternalError> {
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => return Ok(Ordering::Equal),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let ordering = grouping_cmp(left, right)?;
                return Ok(match self.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                });
            }
        };

        Ok(match self.nulls {
            NullOrder::First => ordering,
            NullOrder::Last => ordering.reverse(),
        })
    }
}

///
/// KeyComparison
///
/// Result of comparing two group keys: their order plus the index of the
/// first differing column (equal to the key width when the keys are equal).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyComparison {
    pub ordering: Ordering,
    pub diff_pos: usize,
}

///
/// KeyOrder
///
/// Grouping comparator shared by the direct-row sort, spill reconciliation
/// and the driver, so all three agree on one key order.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyOrder {
    columns: Vec<SortColumn>,
}

impl KeyOrder {
    #[must_use]
    pub const fn new(columns: Vec<SortColumn>) -> Self {
        Self { columns }
    }

    /// Ascending, NULLs-first order over `width` columns.
    #[must_use]
    pub fn ascending(width: usize) -> Self {
        Self::new(vec![SortColumn::default(); width])
    }

    #[must_use]
    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    /// Compare two keys column by column.
    ///
    /// Columns beyond the configured list compare ascending with NULLs first.
    pub fn compare(&self, left: &[Value], right: &[Value]) -> Result<KeyComparison, InternalError> {
        if left.len() != right.len() {
            return Err(InternalError::key_invariant(format!(
                "group key width mismatch: {} vs {}",
                left.len(),
                right.len()
            )));
        }

        for (pos, (l, r)) in left.iter().zip(right).enumerate() {
            let column = self.columns.get(pos).copied().unwrap_or_default();
            let ordering = column.compare(l, r)?;
            if ordering != Ordering::Equal {
                return Ok(KeyComparison {
                    ordering,
                    diff_pos: pos,
                });
            }
        }

        Ok(KeyComparison {
            ordering: Ordering::Equal,
            diff_pos: left.len(),
        })
    }

    pub fn ordering(&self, left: &[Value], right: &[Value]) -> Result<Ordering, InternalError> {
        Ok(self.compare(left, right)?.ordering)
    }
}
