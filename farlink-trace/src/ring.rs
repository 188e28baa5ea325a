// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Lock-free single-producer single-consumer ring for edge samples.
//!
//! The capture peripheral's interrupt pushes [`EdgePair`]s; the decode
//! task pops them.  The producer never blocks: on a full ring the sample
//! is dropped and a counter incremented, leaving queued entries intact.
//! Head and tail are the only shared state, updated with acquire/release
//! atomics, so neither side ever takes a lock.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use core::cell::UnsafeCell;
use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

/// One captured edge sample: how long the line sat low, then high, in
/// fixed capture-clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgePair {
    pub low: u16,
    pub high: u16,
}

/// Fixed-capacity SPSC ring of edge samples.
///
/// `N` must be a power of two.  One slot is sacrificed to distinguish
/// full from empty, so the usable capacity is `N - 1`.
pub struct EdgeRing<const N: usize> {
    buf: [UnsafeCell<EdgePair>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicU32,
}

// The producer only writes slots the consumer cannot yet read and vice
// versa; the head/tail handoff carries the ordering.
unsafe impl<const N: usize> Sync for EdgeRing<N> {}

impl<const N: usize> EdgeRing<N> {
    const MASK: usize = N - 1;

    pub const fn new() -> Self {
        assert!(N.is_power_of_two());
        EdgeRing {
            buf: [const { UnsafeCell::new(EdgePair { low: 0, high: 0 }) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Splits the ring into its producer and consumer ends.  Taking
    /// `&mut self` guarantees there is exactly one of each.
    pub fn split(&mut self) -> (EdgeProducer<'_, N>, EdgeConsumer<'_, N>) {
        let ring = &*self;
        (EdgeProducer { ring }, EdgeConsumer { ring })
    }
}

impl<const N: usize> Default for EdgeRing<N> {
    fn default() -> Self {
        EdgeRing::new()
    }
}

/// The interrupt-side end of an [`EdgeRing`].
pub struct EdgeProducer<'a, const N: usize> {
    ring: &'a EdgeRing<N>,
}

// The ends move between contexts but each stays with one owner.
unsafe impl<const N: usize> Send for EdgeProducer<'_, N> {}

impl<const N: usize> EdgeProducer<'_, N> {
    /// Pushes a sample.  Returns `false` and counts a drop when the
    /// ring is full; never blocks.
    pub fn push(&mut self, pair: EdgePair) -> bool {
        let head = self.ring.head.load(Ordering::Relaxed);
        let next = (head + 1) & EdgeRing::<N>::MASK;
        if next == self.ring.tail.load(Ordering::Acquire) {
            self.ring.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        unsafe { *self.ring.buf[head].get() = pair };
        self.ring.head.store(next, Ordering::Release);
        true
    }
}

/// The decode-task end of an [`EdgeRing`].
pub struct EdgeConsumer<'a, const N: usize> {
    ring: &'a EdgeRing<N>,
}

unsafe impl<const N: usize> Send for EdgeConsumer<'_, N> {}

impl<const N: usize> EdgeConsumer<'_, N> {
    /// Pops the oldest sample, or `None` when the ring is empty.
    pub fn pop(&mut self) -> Option<EdgePair> {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        if tail == self.ring.head.load(Ordering::Acquire) {
            return None;
        }
        let pair = unsafe { *self.ring.buf[tail].get() };
        self.ring
            .tail
            .store((tail + 1) & EdgeRing::<N>::MASK, Ordering::Release);
        Some(pair)
    }

    /// Number of queued samples.
    pub fn len(&self) -> usize {
        self.ring
            .head
            .load(Ordering::Acquire)
            .wrapping_sub(self.ring.tail.load(Ordering::Relaxed))
            & EdgeRing::<N>::MASK
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns and clears the count of samples dropped since the last
    /// call.
    pub fn take_dropped(&mut self) -> u32 {
        self.ring.dropped.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(n: u16) -> EdgePair {
        EdgePair { low: n, high: n + 1 }
    }

    #[test]
    fn fifo_order() {
        let mut ring = EdgeRing::<8>::new();
        let (mut tx, mut rx) = ring.split();
        for i in 0..5 {
            assert!(tx.push(pair(i)));
        }
        assert_eq!(rx.len(), 5);
        for i in 0..5 {
            assert_eq!(rx.pop(), Some(pair(i)));
        }
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn overflow_counts_and_preserves_queue() {
        let mut ring = EdgeRing::<8>::new();
        let (mut tx, mut rx) = ring.split();
        // Usable capacity is 7.
        for i in 0..7 {
            assert!(tx.push(pair(i)));
        }
        for i in 0..3 {
            assert!(!tx.push(pair(100 + i)));
        }
        assert_eq!(rx.take_dropped(), 3);
        assert_eq!(rx.take_dropped(), 0);
        // Queued entries survived the overflow untouched.
        for i in 0..7 {
            assert_eq!(rx.pop(), Some(pair(i)));
        }
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn wraps_around() {
        let mut ring = EdgeRing::<4>::new();
        let (mut tx, mut rx) = ring.split();
        for round in 0..10u16 {
            assert!(tx.push(pair(round)));
            assert!(tx.push(pair(round + 50)));
            assert_eq!(rx.pop(), Some(pair(round)));
            assert_eq!(rx.pop(), Some(pair(round + 50)));
        }
        assert!(rx.is_empty());
    }
}
