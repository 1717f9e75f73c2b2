use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every GROUP BY failure is fatal for the invocation and surfaces through
/// this single type; callers branch on `class`, never on `message`.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct an out-of-memory error for one named resource.
    pub(crate) fn out_of_memory(
        origin: ErrorOrigin,
        resource: &'static str,
        requested: u64,
    ) -> Self {
        Self {
            class: ErrorClass::OutOfMemory,
            origin,
            message: format!("allocation failed for {resource}: requested={requested}"),
            detail: Some(ErrorDetail::Memory(MemoryError::AllocationFailed {
                resource,
                requested,
            })),
        }
    }

    /// Construct a spill-origin serialization failure.
    pub(crate) fn spill_serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Serialization, ErrorOrigin::Spill, message.into())
    }

    /// Construct a key-origin comparator failure.
    pub(crate) fn key_comparator(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Comparator, ErrorOrigin::Key, message.into())
    }

    /// Construct a key-origin invariant violation.
    pub(crate) fn key_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Key,
            message.into(),
        )
    }

    /// Construct a predicate failure raised while evaluating one group.
    pub(crate) fn predicate(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Predicate, ErrorOrigin::Driver, message.into())
    }

    /// Construct a cooperative-cancellation error.
    pub(crate) fn interrupted(origin: ErrorOrigin) -> Self {
        Self::new(
            ErrorClass::Interrupted,
            origin,
            format!("group by interrupted during {origin}"),
        )
    }

    /// Construct a hash-table invariant violation.
    pub(crate) fn hash_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Hash,
            message.into(),
        )
    }

    /// Construct a driver invariant violation.
    pub(crate) fn driver_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Driver,
            message.into(),
        )
    }

    /// Construct a rollup invariant violation.
    pub(crate) fn rollup_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Rollup,
            message.into(),
        )
    }

    /// Construct an aggregate-origin invariant violation.
    pub(crate) fn aggregate_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Aggregate,
            message.into(),
        )
    }

    /// Construct an aggregate-origin unsupported error.
    pub(crate) fn aggregate_unsupported(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Aggregate,
            message.into(),
        )
    }

    /// Construct an aggregate-origin arithmetic overflow.
    pub(crate) fn aggregate_overflow(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Overflow, ErrorOrigin::Aggregate, message.into())
    }

    /// Construct a sort-origin invariant violation.
    pub(crate) fn sort_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Sort,
            message.into(),
        )
    }

    /// Construct a config-origin unsupported error.
    pub(crate) fn config_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Config, message.into())
    }

    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self.class, ErrorClass::OutOfMemory)
    }

    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self.class, ErrorClass::Interrupted)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Memory(MemoryError),
}

///
/// MemoryError
///
/// Memory-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Memory`].
///

#[derive(Debug, ThisError)]
pub enum MemoryError {
    #[error("allocation failed for {resource}: requested={requested}")]
    AllocationFailed {
        resource: &'static str,
        requested: u64,
    },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    OutOfMemory,
    Serialization,
    Comparator,
    Predicate,
    Interrupted,
    InvariantViolation,
    Overflow,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::OutOfMemory => "out_of_memory",
            Self::Serialization => "serialization",
            Self::Comparator => "comparator",
            Self::Predicate => "predicate",
            Self::Interrupted => "interrupted",
            Self::InvariantViolation => "invariant_violation",
            Self::Overflow => "overflow",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Serialize,
    Spill,
    Hash,
    Sort,
    Driver,
    Rollup,
    Aggregate,
    Key,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Serialize => "serialize",
            Self::Spill => "spill",
            Self::Hash => "hash",
            Self::Sort => "sort",
            Self::Driver => "driver",
            Self::Rollup => "rollup",
            Self::Aggregate => "aggregate",
            Self::Key => "key",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
