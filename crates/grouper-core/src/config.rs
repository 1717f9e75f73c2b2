//! Runtime configuration for one GROUP BY invocation.
//!
//! Limits are policy-owned by the caller and passed down explicitly; the
//! hash table never reads process-wide parameters.

use crate::error::InternalError;
use serde::Deserialize;

/// Default hash-table byte budget (2 MiB).
pub const DEFAULT_MAX_HASH_BYTES: u64 = 2 * 1024 * 1024;

/// Rows the hash table must see before selectivity is judged.
pub const DEFAULT_SELECTIVITY_TUPLE_THRESHOLD: u32 = 200;

/// Groups-per-row ratio above which hashing is abandoned.
pub const DEFAULT_SELECTIVITY_RATIO_THRESHOLD: f32 = 0.5;

/// Upper bound on one encoded spill record (4 MiB).
pub const DEFAULT_MAX_SPILL_RECORD_BYTES: usize = 4 * 1024 * 1024;

///
/// GroupByConfig
///
/// Hash eligibility, memory budget and selectivity gate for one GROUP BY.
/// Deserializes with per-field defaults so it can be embedded in a host
/// configuration document.
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupByConfig {
    pub hash_eligible: bool,
    pub max_hash_bytes: u64,
    pub selectivity_tuple_threshold: u32,
    pub selectivity_ratio_threshold: f32,
    pub regenerate_first_row: bool,
    pub max_spill_record_bytes: usize,
    pub debug: bool,
}

impl GroupByConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hash_eligible: true,
            max_hash_bytes: DEFAULT_MAX_HASH_BYTES,
            selectivity_tuple_threshold: DEFAULT_SELECTIVITY_TUPLE_THRESHOLD,
            selectivity_ratio_threshold: DEFAULT_SELECTIVITY_RATIO_THRESHOLD,
            regenerate_first_row: false,
            max_spill_record_bytes: DEFAULT_MAX_SPILL_RECORD_BYTES,
            debug: false,
        }
    }

    /// Sort-only configuration: every row goes straight to the direct stream.
    #[must_use]
    pub const fn hash_disabled() -> Self {
        let mut config = Self::new();
        config.hash_eligible = false;
        config
    }

    #[must_use]
    pub const fn with_max_hash_bytes(mut self, max_hash_bytes: u64) -> Self {
        self.max_hash_bytes = max_hash_bytes;
        self
    }

    #[must_use]
    pub const fn with_selectivity(mut self, tuple_threshold: u32, ratio_threshold: f32) -> Self {
        self.selectivity_tuple_threshold = tuple_threshold;
        self.selectivity_ratio_threshold = ratio_threshold;
        self
    }

    #[must_use]
    pub const fn with_regenerate_first_row(mut self, regenerate: bool) -> Self {
        self.regenerate_first_row = regenerate;
        self
    }

    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Reject configurations the hash phase cannot honor.
    pub fn validate(&self) -> Result<(), InternalError> {
        let ratio = self.selectivity_ratio_threshold;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(InternalError::config_unsupported(format!(
                "selectivity ratio threshold must be in (0, 1], found {ratio}"
            )));
        }
        if self.max_spill_record_bytes == 0 {
            return Err(InternalError::config_unsupported(
                "max spill record bytes must be positive",
            ));
        }

        Ok(())
    }
}

impl Default for GroupByConfig {
    fn default() -> Self {
        Self::new()
    }
}

///
/// TESTS
///
