//! Module: exec::key
//! Responsibility: group-key extraction, owned/borrowed key flavors and key hashing.
//! Does not own: key ordering policy (see `order`).
//! Boundary: every container (hash table, spill stream, driver) stores only owned keys.

mod order;


use crate::{
    error::InternalError,
    exec::row::Row,
    value::{StableHash, Value, canonical_cmp, stable_hash_values},
};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, cmp::Ordering, mem::size_of};

pub use order::{KeyComparison, KeyOrder, NullOrder, SortColumn, SortDirection};

///
/// ColumnAccessor
///
/// Reads one grouping value out of a row. Accessors may borrow from the row
/// or compute a fresh value.
///

pub trait ColumnAccessor {
    fn value<'r>(&self, row: &'r Row) -> Result<Cow<'r, Value>, InternalError>;

    /// Positional slot read by this accessor, when it reads exactly one.
    fn slot(&self) -> Option<usize> {
        None
    }
}

///
/// SlotAccessor
///
/// Positional accessor reading one slot of the row.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SlotAccessor(pub usize);

impl ColumnAccessor for SlotAccessor {
    fn value<'r>(&self, row: &'r Row) -> Result<Cow<'r, Value>, InternalError> {
        row.get(self.0).map(Cow::Borrowed).ok_or_else(|| {
            InternalError::key_invariant(format!(
                "grouping slot {} out of range for row of width {}",
                self.0,
                row.len()
            ))
        })
    }

    fn slot(&self) -> Option<usize> {
        Some(self.0)
    }
}

///
/// KeyAccessors
///
/// Ordered accessor list defining the grouping columns.
///

pub struct KeyAccessors {
    columns: Vec<Box<dyn ColumnAccessor>>,
}

impl KeyAccessors {
    #[must_use]
    pub fn new(columns: Vec<Box<dyn ColumnAccessor>>) -> Self {
        Self { columns }
    }

    /// Accessor list reading the given positional slots, in order.
    #[must_use]
    pub fn slots(slots: &[usize]) -> Self {
        Self::new(
            slots
                .iter()
                .map(|&slot| Box::new(SlotAccessor(slot)) as Box<dyn ColumnAccessor>)
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Slots read by positional accessors, in column order.
    pub fn slots_read(&self) -> impl Iterator<Item = usize> {
        self.columns.iter().filter_map(|column| column.slot())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Build a lookup key borrowing from `row` wherever the accessor allows.
    pub fn borrowed<'r>(&self, row: &'r Row) -> Result<GroupKeyRef<'r>, InternalError> {
        let values = self
            .columns
            .iter()
            .map(|column| column.value(row))
            .collect::<Result<Vec<_>, _>>()?;
        let hash = stable_hash_values(values.iter().map(AsRef::as_ref));

        Ok(GroupKeyRef { values, hash })
    }

    /// Build an owned key, deep-copying the grouping values.
    pub fn owned(&self, row: &Row) -> Result<GroupKey, InternalError> {
        Ok(self.borrowed(row)?.to_owned_key())
    }
}

impl std::fmt::Debug for KeyAccessors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyAccessors")
            .field("columns", &self.columns.len())
            .finish()
    }
}

///
/// GroupKeyRef
///
/// Borrowed lookup key. Lives only as long as the row it was read from;
/// containers convert it with [`GroupKeyRef::to_owned_key`] before storing.
///

#[derive(Debug)]
pub struct GroupKeyRef<'r> {
    values: Vec<Cow<'r, Value>>,
    hash: StableHash,
}

impl GroupKeyRef<'_> {
    #[must_use]
    pub(crate) const fn hash(&self) -> StableHash {
        self.hash
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(AsRef::as_ref)
    }

    /// Canonical equality against a stored key.
    #[must_use]
    pub fn matches(&self, key: &GroupKey) -> bool {
        self.hash == key.hash
            && self.values.len() == key.values.len()
            && self
                .values()
                .zip(&key.values)
                .all(|(left, right)| canonical_cmp(left, right) == Ordering::Equal)
    }

    #[must_use]
    pub fn to_owned_key(&self) -> GroupKey {
        GroupKey {
            values: self.values().cloned().collect(),
            hash: self.hash,
        }
    }
}

///
/// GroupKey
///
/// Owned group key: the grouping values plus their stable hash.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct GroupKey {
    values: Vec<Value>,
    hash: StableHash,
}

impl GroupKey {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        let hash = stable_hash_values(&values);

        Self { values, hash }
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

    #[must_use]
    pub(crate) const fn hash(&self) -> StableHash {
        self.hash
    }

    /// Copy of this key with every column from `prefix_len` onward set to NULL.
    #[must_use]
    pub fn with_null_suffix(&self, prefix_len: usize) -> Vec<Value> {
        self.values
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                if idx < prefix_len {
                    value.clone()
                } else {
                    Value::Null
                }
            })
            .collect()
    }

    #[must_use]
    pub fn estimated_size(&self) -> usize {
        self.values
            .iter()
            .map(Value::estimated_size)
            .fold(size_of::<Self>(), usize::saturating_add)
    }
}

impl From<Vec<Value>> for GroupKey {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl From<GroupKey> for Vec<Value> {
    fn from(key: GroupKey) -> Self {
        key.values
    }
}
