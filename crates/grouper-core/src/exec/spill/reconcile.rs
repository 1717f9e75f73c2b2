use crate::{
    error::InternalError,
    exec::{
        key::KeyOrder,
        sort::ExternalSort,
        spill::{SpillRecord, SpillStream},
    },
    obs::sink::{MetricsEvent, record},
};
use std::{cmp::Ordering, iter::Peekable, vec};

///
/// SpillReconciler
///
/// Sorts the spill stream by group key and merges adjacent equal keys, so the
/// driver sees at most one partial record per group, in key order.
///

pub(crate) struct SpillReconciler<'a, S> {
    key_order: &'a KeyOrder,
    sorter: &'a S,
}

impl<'a, S: ExternalSort> SpillReconciler<'a, S> {
    pub(crate) const fn new(key_order: &'a KeyOrder, sorter: &'a S) -> Self {
        Self { key_order, sorter }
    }

    pub(crate) fn reconcile(&self, stream: SpillStream) -> Result<PartialStream, InternalError> {
        let records: Vec<SpillRecord> = stream.decode_all()?;
        let input_records = records.len();

        let sorted = self.sorter.sort_by(records, |left, right| {
            self.key_order
                .ordering(left.key.values(), right.key.values())
        })?;

        let mut merged = Vec::new();
        let mut current: Option<SpillRecord> = None;
        for incoming in sorted {
            let same_group = match &current {
                Some(open) => {
                    self.key_order
                        .ordering(open.key.values(), incoming.key.values())?
                        == Ordering::Equal
                }
                None => false,
            };

            if same_group {
                if let Some(open) = current.as_mut() {
                    open.row_count = open.row_count.saturating_add(incoming.row_count);
                    open.accumulators.merge(incoming.accumulators)?;
                }
            } else if let Some(closed) = current.replace(incoming) {
                merged.push(closed);
            }
        }
        merged.extend(current);

        record(MetricsEvent::SpillReconciled {
            input_records: input_records as u64,
            output_records: merged.len() as u64,
        });

        Ok(PartialStream::new(merged))
    }
}

///
/// PartialStream
///
/// Reconciled partial groups, ascending by key, consumed by the driver.
///

#[derive(Debug)]
pub(crate) struct PartialStream {
    records: Peekable<vec::IntoIter<SpillRecord>>,
    len: usize,
}

impl PartialStream {
    pub(crate) fn new(records: Vec<SpillRecord>) -> Self {
        Self {
            len: records.len(),
            records: records.into_iter().peekable(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Total records produced by reconciliation.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn peek(&mut self) -> Option<&SpillRecord> {
        self.records.peek()
    }

    pub(crate) fn take(&mut self) -> Option<SpillRecord> {
        self.records.next()
    }

    pub(crate) fn is_exhausted(&mut self) -> bool {
        self.records.peek().is_none()
    }
}
