//! Module: exec::hash
//! Responsibility: bounded-memory hash aggregation with LRU eviction and a
//! selectivity gate.
//! Does not own: spill encoding (see `spill`) or group finalization (see `driver`).
//! Boundary: every group leaving the table is written to `PhaseStreams` so
//! the sort path aggregates each row exactly once.

mod lru;


use crate::{
    error::InternalError,
    exec::{
        aggregate::{AccumulatorSet, AggregateSpec},
        key::{GroupKey, KeyAccessors},
        row::Row,
        spill::{DirectRow, PhaseStreams},
    },
    value::StableHash,
};
use lru::LruArena;
use std::{collections::BTreeMap, mem::size_of};

// Fixed bookkeeping per entry: arena node links plus a bucket slot.
const ENTRY_OVERHEAD_BYTES: usize = 4 * size_of::<usize>();

///
/// HashTableState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashTableState {
    AcceptAll,
    RejectAll,
}

///
/// AccumulatorValue
///
/// Resident payload of one group. `row_count` counts rows folded into
/// `accumulators`; the cached first row is held back until the entry leaves
/// the table.
///

#[derive(Clone, Debug)]
pub(crate) struct AccumulatorValue {
    pub(crate) accumulators: AccumulatorSet,
    pub(crate) row_count: u64,
    pub(crate) cached_first_row: Option<Row>,
}

///
/// HashEntry
///

#[derive(Debug)]
pub(crate) struct HashEntry {
    pub(crate) key: GroupKey,
    pub(crate) value: AccumulatorValue,
    size: usize,
}

impl HashEntry {
    fn estimated_size(key: &GroupKey, value: &AccumulatorValue) -> usize {
        key.estimated_size()
            .saturating_add(ENTRY_OVERHEAD_BYTES)
            .saturating_add(value.accumulators.estimated_size())
            .saturating_add(value.cached_first_row.as_ref().map_or(0, Row::estimated_size))
    }
}

///
/// ProbeOutcome
///

#[derive(Debug, PartialEq)]
pub(crate) enum ProbeOutcome {
    /// Row folded into a resident group (or held as its first row).
    Absorbed,
    /// New group whose first row was folded immediately; the marker must be
    /// appended to the direct stream.
    Marker(GroupKey),
    /// Table rejects all input; the row belongs to the direct stream.
    Rejected(Row),
}

///
/// HashTableStats
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HashTableStats {
    pub group_count: u64,
    pub tuple_count: u64,
    pub hash_size_bytes: u64,
    pub evictions: u64,
    pub resident: usize,
    pub state: HashTableState,
}

///
/// HashAggregationTable
///
/// Group key → accumulator map with LRU order and a running byte estimate.
/// Buckets are keyed by the stable key hash; keys inside a bucket are
/// compared canonically, so colliding hashes never merge groups.
///

#[derive(Debug)]
pub(crate) struct HashAggregationTable<'s> {
    specs: &'s [AggregateSpec],
    regenerate_first_row: bool,
    arena: LruArena<HashEntry>,
    buckets: BTreeMap<StableHash, Vec<usize>>,
    group_count: u64,
    tuple_count: u64,
    hash_size_bytes: u64,
    evictions: u64,
    state: HashTableState,
}

impl<'s> HashAggregationTable<'s> {
    pub(crate) const fn new(specs: &'s [AggregateSpec], regenerate_first_row: bool) -> Self {
        Self {
            specs,
            regenerate_first_row,
            arena: LruArena::new(),
            buckets: BTreeMap::new(),
            group_count: 0,
            tuple_count: 0,
            hash_size_bytes: 0,
            evictions: 0,
            state: HashTableState::AcceptAll,
        }
    }

    pub(crate) const fn state(&self) -> HashTableState {
        self.state
    }

    pub(crate) const fn stats(&self) -> HashTableStats {
        HashTableStats {
            group_count: self.group_count,
            tuple_count: self.tuple_count,
            hash_size_bytes: self.hash_size_bytes,
            evictions: self.evictions,
            resident: self.arena.len(),
            state: self.state,
        }
    }

    /// Route one input row into the table.
    pub(crate) fn probe_or_insert(
        &mut self,
        accessors: &KeyAccessors,
        row: Row,
    ) -> Result<ProbeOutcome, InternalError> {
        if self.state == HashTableState::RejectAll {
            return Ok(ProbeOutcome::Rejected(row));
        }

        let probe = accessors.borrowed(&row)?;
        let hit = self.buckets.get(&probe.hash()).and_then(|bucket| {
            bucket.iter().copied().find(|&idx| {
                self.arena
                    .get(idx)
                    .is_some_and(|entry| probe.matches(&entry.key))
            })
        });

        if let Some(idx) = hit {
            drop(probe);
            self.accumulate_hit(idx, &row)?;
            return Ok(ProbeOutcome::Absorbed);
        }

        let key = probe.to_owned_key();
        drop(probe);
        self.insert(key, row)
    }

    /// Mark an entry most recently used.
    pub(crate) fn touch(&mut self, idx: usize) {
        self.arena.touch(idx);
    }

    /// Evict least-recently-used entries until the estimate fits `limit_bytes`.
    /// Returns the number of entries evicted.
    pub(crate) fn enforce_memory_budget(
        &mut self,
        limit_bytes: u64,
        streams: &mut PhaseStreams,
    ) -> Result<u64, InternalError> {
        let mut evicted = 0u64;
        while self.hash_size_bytes > limit_bytes {
            self.evict_lru(streams)?;
            evicted += 1;
        }

        Ok(evicted)
    }

    /// Evict the least-recently-used entry to the phase streams.
    pub(crate) fn evict_lru(&mut self, streams: &mut PhaseStreams) -> Result<(), InternalError> {
        let Some(idx) = self.arena.lru() else {
            return Err(InternalError::hash_invariant(format!(
                "eviction requested from empty hash table with {} estimated bytes",
                self.hash_size_bytes
            )));
        };

        let entry = self.remove(idx)?;
        self.evictions = self.evictions.saturating_add(1);

        write_out(entry, streams)
    }

    /// Judge selectivity once enough tuples were seen. A table whose groups
    /// are too distinct switches to `RejectAll` and drains completely.
    /// Returns `true` when this call aborted hashing.
    pub(crate) fn check_selectivity(
        &mut self,
        tuple_threshold: u32,
        ratio_threshold: f32,
        streams: &mut PhaseStreams,
    ) -> Result<bool, InternalError> {
        if self.state == HashTableState::RejectAll
            || self.tuple_count <= u64::from(tuple_threshold)
        {
            return Ok(false);
        }

        let ratio = ratio_of(self.group_count, self.tuple_count);
        if ratio <= f64::from(ratio_threshold) {
            return Ok(false);
        }

        self.state = HashTableState::RejectAll;
        self.drain_all(streams)?;

        Ok(true)
    }

    /// Write every resident entry out, least recently used first.
    pub(crate) fn drain_all(&mut self, streams: &mut PhaseStreams) -> Result<(), InternalError> {
        for (_, entry) in self.arena.drain_lru() {
            self.evictions = self.evictions.saturating_add(1);
            write_out(entry, streams)?;
        }
        self.buckets.clear();
        self.hash_size_bytes = 0;

        Ok(())
    }

    /// Hand over the resident entries for in-place finalization.
    pub(crate) fn into_entries(mut self) -> Vec<HashEntry> {
        self.arena
            .drain_lru()
            .into_iter()
            .map(|(_, entry)| entry)
            .collect()
    }

    fn accumulate_hit(&mut self, idx: usize, row: &Row) -> Result<(), InternalError> {
        let specs = self.specs;
        let entry = self.arena.get_mut(idx).ok_or_else(|| {
            InternalError::hash_invariant(format!("bucket names missing arena slot {idx}"))
        })?;

        entry.value.accumulators.accumulate(specs, row)?;
        entry.value.row_count = entry.value.row_count.saturating_add(1);

        let resized = HashEntry::estimated_size(&entry.key, &entry.value);
        let old = std::mem::replace(&mut entry.size, resized);
        self.hash_size_bytes = self
            .hash_size_bytes
            .saturating_sub(as_u64(old))
            .saturating_add(as_u64(resized));
        self.tuple_count = self.tuple_count.saturating_add(1);
        self.touch(idx);

        Ok(())
    }

    fn insert(&mut self, key: GroupKey, row: Row) -> Result<ProbeOutcome, InternalError> {
        let mut value = AccumulatorValue {
            accumulators: AccumulatorSet::new(self.specs),
            row_count: 0,
            cached_first_row: None,
        };

        let outcome = if self.regenerate_first_row {
            value.accumulators.accumulate(self.specs, &row)?;
            value.row_count = 1;
            ProbeOutcome::Marker(key.clone())
        } else {
            value.cached_first_row = Some(row);
            ProbeOutcome::Absorbed
        };

        let size = HashEntry::estimated_size(&key, &value);
        let hash = key.hash();
        let idx = self.arena.push_mru(HashEntry { key, value, size })?;
        self.buckets.entry(hash).or_default().push(idx);

        self.group_count = self.group_count.saturating_add(1);
        self.tuple_count = self.tuple_count.saturating_add(1);
        self.hash_size_bytes = self.hash_size_bytes.saturating_add(as_u64(size));

        Ok(outcome)
    }

    fn remove(&mut self, idx: usize) -> Result<HashEntry, InternalError> {
        let entry = self.arena.remove(idx).ok_or_else(|| {
            InternalError::hash_invariant(format!("lru names missing arena slot {idx}"))
        })?;

        let hash = entry.key.hash();
        if let Some(bucket) = self.buckets.get_mut(&hash) {
            bucket.retain(|&slot| slot != idx);
            if bucket.is_empty() {
                self.buckets.remove(&hash);
            }
        }
        self.hash_size_bytes = self.hash_size_bytes.saturating_sub(as_u64(entry.size));

        Ok(entry)
    }
}

// First row goes to the direct stream, folded rows to the spill stream.
fn write_out(entry: HashEntry, streams: &mut PhaseStreams) -> Result<(), InternalError> {
    let HashEntry { key, value, .. } = entry;

    if value.row_count > 0 {
        streams
            .spill
            .append(&key, value.row_count, &value.accumulators)?;
    }
    if let Some(first) = value.cached_first_row {
        streams.push_direct(DirectRow::input(key, first))?;
    }

    Ok(())
}

fn as_u64(bytes: usize) -> u64 {
    u64::try_from(bytes).unwrap_or(u64::MAX)
}

fn ratio_of(groups: u64, tuples: u64) -> f64 {
    use num_traits::ToPrimitive;

    let groups = groups.to_f64().unwrap_or(f64::MAX);
    let tuples = tuples.to_f64().unwrap_or(f64::MAX);

    groups / tuples
}
