//! Group-level predicates: HAVING and the GROUP-NUM/LIMIT gate.

use crate::{error::InternalError, exec::driver::OutputRow};

///
/// Logical
///
/// Three-valued predicate result plus an evaluation failure.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Logical {
    True,
    False,
    Unknown,
    Error(String),
}

impl Logical {
    /// Collapse to a pass/fail decision. `Unknown` fails; `Error` propagates.
    pub fn passes(self) -> Result<bool, InternalError> {
        match self {
            Self::True => Ok(true),
            Self::False | Self::Unknown => Ok(false),
            Self::Error(message) => Err(InternalError::predicate(message)),
        }
    }
}

impl From<bool> for Logical {
    fn from(v: bool) -> Self {
        if v { Self::True } else { Self::False }
    }
}

///
/// GroupPredicate
///

pub trait GroupPredicate {
    fn evaluate(&self, row: &OutputRow) -> Logical;
}

impl<F> GroupPredicate for F
where
    F: Fn(&OutputRow) -> Logical,
{
    fn evaluate(&self, row: &OutputRow) -> Logical {
        self(row)
    }
}

///
/// GroupLimit
///
/// Predicate over candidate group rows (usually on `group_num`).
/// With `stop_when_false`, the first false result also stops the scan.
///

pub struct GroupLimit {
    predicate: Box<dyn GroupPredicate>,
    stop_when_false: bool,
}

impl GroupLimit {
    #[must_use]
    pub fn new(predicate: impl GroupPredicate + 'static, stop_when_false: bool) -> Self {
        Self {
            predicate: Box::new(predicate),
            stop_when_false,
        }
    }

    /// Emit only the first `count` groups, then stop scanning.
    #[must_use]
    pub fn first(count: u64) -> Self {
        Self::new(
            move |row: &OutputRow| Logical::from(row.group_num <= count),
            true,
        )
    }

    #[must_use]
    pub const fn stop_when_false(&self) -> bool {
        self.stop_when_false
    }

    pub fn evaluate(&self, row: &OutputRow) -> Logical {
        self.predicate.evaluate(row)
    }
}

impl std::fmt::Debug for GroupLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupLimit")
            .field("stop_when_false", &self.stop_when_false)
            .finish_non_exhaustive()
    }
}

///
/// TESTS
///
