//! Comparator-driven sort boundary.
//!
//! The core treats sorting as a black box over an owned record vector. The
//! comparator may fail (incomparable keys); the first failure aborts the sort.

use crate::error::{ErrorOrigin, InternalError};
use std::{cmp::Ordering, mem::size_of};

///
/// ExternalSort
///
/// Stable sort over owned records with a fallible comparator.
///

pub trait ExternalSort {
    fn sort_by<T, F>(&self, records: Vec<T>, compare: F) -> Result<Vec<T>, InternalError>
    where
        F: FnMut(&T, &T) -> Result<Ordering, InternalError>;
}

///
/// InMemorySort
///
/// Bottom-up merge sort held entirely in memory. Passes alternate between
/// two buffers reserved once up front, so a sort allocates O(1) times.
///
/// `slice::sort_by` is not used: once the comparator fails its answers are
/// no longer a total order, and the std sort may panic on that.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct InMemorySort;

impl ExternalSort for InMemorySort {
    fn sort_by<T, F>(&self, records: Vec<T>, mut compare: F) -> Result<Vec<T>, InternalError>
    where
        F: FnMut(&T, &T) -> Result<Ordering, InternalError>,
    {
        merge_sort(records, &mut compare)
    }
}

fn merge_sort<T, F>(records: Vec<T>, compare: &mut F) -> Result<Vec<T>, InternalError>
where
    F: FnMut(&T, &T) -> Result<Ordering, InternalError>,
{
    let len = records.len();
    if len <= 1 {
        return Ok(records);
    }

    let mut src = reserve_buffer::<T>(len)?;
    src.extend(records.into_iter().map(Some));
    let mut dst = reserve_buffer::<T>(len)?;

    let mut width = 1;
    while width < len {
        dst.clear();
        let mut start = 0;
        while start < len {
            let mid = start.saturating_add(width).min(len);
            let end = mid.saturating_add(width).min(len);
            merge_runs(&mut src, &mut dst, (start, mid, end), compare)?;
            start = end;
        }
        std::mem::swap(&mut src, &mut dst);
        width = width.saturating_mul(2);
    }

    src.into_iter()
        .map(|slot| {
            slot.ok_or_else(|| InternalError::sort_invariant("merge pass dropped a record"))
        })
        .collect()
}

// Move `src[start..mid]` and `src[mid..end]` into `dst` in merged order.
fn merge_runs<T, F>(
    src: &mut [Option<T>],
    dst: &mut Vec<Option<T>>,
    (start, mid, end): (usize, usize, usize),
    compare: &mut F,
) -> Result<(), InternalError>
where
    F: FnMut(&T, &T) -> Result<Ordering, InternalError>,
{
    let (mut left, mut right) = (start, mid);
    while left < mid && right < end {
        // Ties take from the left run to keep the sort stable.
        let take_right = match (&src[left], &src[right]) {
            (Some(l), Some(r)) => compare(r, l)? == Ordering::Less,
            _ => return Err(InternalError::sort_invariant("merge run slot already taken")),
        };
        if take_right {
            dst.push(src[right].take());
            right += 1;
        } else {
            dst.push(src[left].take());
            left += 1;
        }
    }
    dst.extend(src[left..mid].iter_mut().map(Option::take));
    dst.extend(src[right..end].iter_mut().map(Option::take));

    Ok(())
}

fn reserve_buffer<T>(len: usize) -> Result<Vec<Option<T>>, InternalError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| {
        InternalError::out_of_memory(
            ErrorOrigin::Sort,
            "sort merge buffer",
            u64::try_from(len.saturating_mul(size_of::<Option<T>>())).unwrap_or(u64::MAX),
        )
    })?;

    Ok(buffer)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn sorts_and_keeps_ties_stable() {
        let records = vec![(3, 'a'), (1, 'b'), (3, 'c'), (2, 'd'), (1, 'e')];

        let sorted = InMemorySort
            .sort_by(records, |l, r| Ok(l.0.cmp(&r.0)))
            .expect("sort");

        assert_eq!(sorted, vec![(1, 'b'), (1, 'e'), (2, 'd'), (3, 'a'), (3, 'c')]);
    }

    #[test]
    fn comparator_failure_aborts_sort() {
        let err = InMemorySort
            .sort_by(vec![1, 2, 3], |_, _| {
                Err(InternalError::key_comparator("incomparable"))
            })
            .expect_err("comparator error must propagate");

        assert_eq!(err.class, ErrorClass::Comparator);
    }

    #[test]
    fn odd_lengths_merge_trailing_runs() {
        let records: Vec<(u8, usize)> = [5, 3, 9, 3, 1, 5, 7, 3, 0, 9, 2]
            .into_iter()
            .enumerate()
            .map(|(at, key)| (key, at))
            .collect();
        let mut expected = records.clone();
        expected.sort_by_key(|record| record.0);

        let sorted = InMemorySort
            .sort_by(records, |l, r| Ok(l.0.cmp(&r.0)))
            .expect("sort");

        assert_eq!(sorted, expected);
    }

    #[test]
    fn comparator_failure_midway_returns_the_first_error() {
        let mut calls = 0;
        let err = InMemorySort
            .sort_by((0..64).rev().collect::<Vec<i32>>(), |l, r| {
                calls += 1;
                if calls == 20 {
                    return Err(InternalError::key_comparator("first failure"));
                }
                if calls > 20 {
                    return Err(InternalError::key_comparator("later failure"));
                }
                Ok(l.cmp(r))
            })
            .expect_err("comparator error must propagate");

        assert_eq!(err.message, "first failure");
        assert_eq!(calls, 20);
    }

    #[test]
    fn empty_and_single_inputs_pass_through() {
        let empty: Vec<u8> = InMemorySort
            .sort_by(Vec::new(), |l: &u8, r: &u8| Ok(l.cmp(r)))
            .expect("sort");
        assert!(empty.is_empty());

        let single = InMemorySort
            .sort_by(vec![9], |l: &i32, r: &i32| Ok(l.cmp(r)))
            .expect("sort");
        assert_eq!(single, vec![9]);
    }
}
