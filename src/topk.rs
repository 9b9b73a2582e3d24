//! # Top-K Retainer
//!
//! A fixed-capacity min-heap that keeps the K largest values out of an
//! unbounded stream, backed by a `BinaryHeap<Reverse<T>>`. The smallest
//! retained value sits at the root, so the admission test for a new value is
//! `peek`, O(1), and a replacement overwrites the root through `peek_mut`,
//! O(log K).
//!
//! ## Concurrency
//!
//! `TopK` holds no lock of its own. When several workers contribute to the
//! same instance the caller wraps it in a mutex and holds the guard for the
//! duration of one worker's batch (see `worker.rs`). The final contents do
//! not depend on contribution order: after any interleaving the heap holds
//! the K largest values of the multiset that was contributed.

use crate::error::{BenchError, Result};
use crate::stats::{Average, CheckedSum};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Bounded min-heap retaining the `capacity` largest values seen.
#[derive(Debug, Clone)]
pub struct TopK<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<T>>,
}

impl<T: Ord + Copy> TopK<T> {
    /// Create a retainer, allocating its backing storage up front.
    pub fn try_new(capacity: usize) -> Result<Self> {
        let mut heap = BinaryHeap::new();
        reserve(&mut heap, capacity)?;
        Ok(Self { capacity, heap })
    }

    /// Build a retainer on top of storage obtained elsewhere.
    ///
    /// The storage is cleared and reused; if it cannot hold `capacity`
    /// elements the missing room is reserved here, so pushes never
    /// reallocate.
    pub fn from_storage(capacity: usize, mut storage: Vec<T>) -> Result<Self> {
        storage.clear();
        let mut heap = BinaryHeap::from(storage.into_iter().map(Reverse).collect::<Vec<_>>());
        reserve(&mut heap, capacity)?;
        Ok(Self { capacity, heap })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Smallest retained value.
    pub fn min(&self) -> Option<T> {
        self.heap.peek().map(|Reverse(min)| *min)
    }

    /// Offer one value. Returns `true` if it was retained.
    pub fn push(&mut self, value: T) -> bool {
        if !self.is_full() {
            self.heap.push(Reverse(value));
            return true;
        }

        match self.heap.peek_mut() {
            // the root is re-sifted when `min` is dropped
            Some(mut min) if value > min.0 => {
                *min = Reverse(value);
                true
            }
            // full and not larger than the minimum, or capacity zero
            _ => false,
        }
    }

    /// Offer a batch of values.
    pub fn contribute<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.push(value);
        }
    }

    /// Retained values in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.heap.iter().map(|Reverse(value)| *value)
    }

    /// Retained values, largest first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        // ascending under `Reverse` is descending for `T`
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(value)| value)
            .collect()
    }
}

fn reserve<T: Ord>(heap: &mut BinaryHeap<Reverse<T>>, capacity: usize) -> Result<()> {
    let additional = capacity.saturating_sub(heap.len());
    heap.try_reserve_exact(additional)
        .map_err(|_| BenchError::AllocationFailure {
            what: "top-k retainer",
            len: capacity,
        })
}

impl TopK<u64> {
    /// Overflow-checked truncated mean of the retained values.
    ///
    /// A retainer holding fewer than `capacity` values is a valid partial
    /// state; `None` only when nothing was retained at all.
    pub fn average(&self) -> Option<Average> {
        let sum: CheckedSum = self.iter().collect();
        sum.average().map(|value| Average {
            value,
            overflowed: sum.overflowed(),
        })
    }
}
