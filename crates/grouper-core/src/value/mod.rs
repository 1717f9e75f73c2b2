mod compare;
mod float;
mod hash;
mod tag;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::mem::size_of;

// re-exports
pub use compare::{canonical_cmp, grouping_cmp};
pub use float::{Float64, Float64Error};
pub(crate) use hash::{StableHash, stable_hash_values};
#[cfg(test)]
pub(crate) use hash::with_test_hash_override;
pub(crate) use tag::ValueTag;

///
/// Value
///
/// Typed scalar carried by rows, group keys and aggregate results.
///
/// Null → SQL NULL; groups with itself under GROUP BY semantics.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Value {
    Blob(Vec<u8>),
    Bool(bool),
    Float64(Float64),
    Int(i64),
    Null,
    Text(String),
    Uint(u64),
}

impl Value {
    ///
    /// CONSTRUCTION
    ///

    /// Build a finite float value, mapping non-finite input to NULL.
    #[must_use]
    pub fn float(v: f64) -> Self {
        Float64::try_new(v).map_or(Self::Null, Self::Float64)
    }

    ///
    /// INSPECTION
    ///

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Project a numeric value onto f64 (lossy for very large integers).
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        use num_traits::ToPrimitive;

        match self {
            Self::Int(v) => v.to_f64(),
            Self::Uint(v) => v.to_f64(),
            Self::Float64(v) => Some(v.get()),
            _ => None,
        }
    }

    /// Project an integer value onto its 64-bit pattern for bitwise aggregates.
    #[must_use]
    pub const fn to_bits_u64(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(v.cast_unsigned()),
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub(crate) const fn tag(&self) -> ValueTag {
        tag::canonical_tag(self)
    }

    /// Approximate resident size of this value, inline part plus heap payload.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        let heap = match self {
            Self::Blob(bytes) => bytes.capacity(),
            Self::Text(text) => text.capacity(),
            _ => 0,
        };

        size_of::<Self>().saturating_add(heap)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Float64> for Value {
    fn from(v: Float64) -> Self {
        Self::Float64(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
