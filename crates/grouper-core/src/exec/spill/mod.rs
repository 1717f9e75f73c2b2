//! Module: exec::spill
//! Responsibility: spill record encoding, the append-only spill stream and
//! reconciliation of duplicated partial groups.
//! Does not own: eviction policy (hash table) or group finalization (driver).
//! Boundary: the hash phase writes `PhaseStreams`; the driver reads a `PartialStream`.

mod reconcile;
mod stream;


use crate::{
    error::InternalError,
    exec::{aggregate::AccumulatorSet, key::GroupKey, row::Row},
    value::Value,
};
use serde::{Deserialize, Serialize};

pub(crate) use reconcile::{PartialStream, SpillReconciler};
pub(crate) use stream::SpillStream;

///
/// SpillRecordRef
///
/// Borrowed encode-side view of one evicted partial group.
///

#[derive(Serialize)]
struct SpillRecordRef<'a> {
    key: &'a [Value],
    row_count: u64,
    accumulators: &'a AccumulatorSet,
}

///
/// SpillRecord
///
/// Decoded partial group: key, rows folded so far and their accumulators.
///

#[derive(Debug, Deserialize)]
pub(crate) struct SpillRecord {
    pub(crate) key: GroupKey,
    pub(crate) row_count: u64,
    pub(crate) accumulators: AccumulatorSet,
}

///
/// SpillWriter
///
/// Append-only writer; never deduplicates, so one key may appear many times.
///

#[derive(Debug)]
pub(crate) struct SpillWriter {
    stream: SpillStream,
}

impl SpillWriter {
    pub(crate) const fn new(stream: SpillStream) -> Self {
        Self { stream }
    }

    pub(crate) fn append(
        &mut self,
        key: &GroupKey,
        row_count: u64,
        accumulators: &AccumulatorSet,
    ) -> Result<(), InternalError> {
        self.stream.append(&SpillRecordRef {
            key: key.values(),
            row_count,
            accumulators,
        })
    }

    pub(crate) const fn records(&self) -> usize {
        self.stream.len()
    }

    pub(crate) fn into_stream(self) -> SpillStream {
        self.stream
    }
}

///
/// DirectRow
///
/// One entry of the direct stream: an input row with its owned key, or a
/// key-only marker that opens a group without being accumulated.
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DirectRow {
    pub(crate) key: GroupKey,
    pub(crate) row: Option<Row>,
}

impl DirectRow {
    pub(crate) const fn input(key: GroupKey, row: Row) -> Self {
        Self {
            key,
            row: Some(row),
        }
    }

    pub(crate) const fn marker(key: GroupKey) -> Self {
        Self { key, row: None }
    }
}

///
/// PhaseStreams
///
/// Everything the hash phase hands to the sort path: rows the table did not
/// absorb (plus first rows of evicted groups) and the evicted partials.
///

#[derive(Debug)]
pub(crate) struct PhaseStreams {
    pub(crate) direct: Vec<DirectRow>,
    pub(crate) spill: SpillWriter,
}

impl PhaseStreams {
    pub(crate) const fn new(max_record_bytes: usize) -> Self {
        Self {
            direct: Vec::new(),
            spill: SpillWriter::new(SpillStream::new(max_record_bytes)),
        }
    }

    pub(crate) fn push_direct(&mut self, row: DirectRow) -> Result<(), InternalError> {
        self.direct.try_reserve(1).map_err(|_| {
            InternalError::out_of_memory(
                crate::error::ErrorOrigin::Spill,
                "direct row stream",
                u64::try_from(std::mem::size_of::<DirectRow>()).unwrap_or(u64::MAX),
            )
        })?;
        self.direct.push(row);

        Ok(())
    }
}
