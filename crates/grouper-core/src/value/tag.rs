use crate::value::Value;

///
/// ValueTag
///
/// Stable one-byte variant tag used by hashing and cross-variant ranking.
/// Numeric variants share one rank so mixed numeric keys order by magnitude.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub(crate) enum ValueTag {
    Null = 1,
    Bool = 2,
    Numeric = 3,
    Text = 4,
    Blob = 5,
}

impl ValueTag {
    #[must_use]
    pub(crate) const fn to_u8(self) -> u8 {
        self as u8
    }
}

#[must_use]
pub(super) const fn canonical_tag(value: &Value) -> ValueTag {
    match value {
        Value::Null => ValueTag::Null,
        Value::Bool(_) => ValueTag::Bool,
        Value::Int(_) | Value::Uint(_) | Value::Float64(_) => ValueTag::Numeric,
        Value::Text(_) => ValueTag::Text,
        Value::Blob(_) => ValueTag::Blob,
    }
}
