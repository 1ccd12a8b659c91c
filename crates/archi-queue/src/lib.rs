// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-queue
//!
//! A bounded, lock-free multi-producer/multi-consumer ring buffer
//! (component E), implementing the sequence-numbered-slot algorithm
//! described by Dmitry Vyukov. Capacity is always a power of two,
//! `1 << capacity_log2`, with `capacity_log2 <= 16` by default (`<= 32`
//! under the `large-queue` feature).
//!
//! `push`/`pop` never block: they return `false` exactly at the
//! linearisation point where the queue is full/empty. `T = ()` models the
//! specification's "zero element size, count-only" queues without a
//! separate code path — a `UnsafeCell<MaybeUninit<()>>` slot costs
//! nothing.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use archi_core::status::Status;
use thiserror::Error;

/// The largest `capacity_log2` this build accepts.
#[cfg(not(feature = "large-queue"))]
pub const MAX_CAPACITY_LOG2: u32 = 16;
/// The largest `capacity_log2` this build accepts.
#[cfg(feature = "large-queue")]
pub const MAX_CAPACITY_LOG2: u32 = 32;

/// Errors raised while constructing a [`LockFreeQueue`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// `capacity_log2` exceeded [`MAX_CAPACITY_LOG2`] for this build.
    #[error("capacity_log2 {0} exceeds the compiled maximum of {MAX_CAPACITY_LOG2}")]
    CapacityTooLarge(u32),
}

impl From<QueueError> for Status {
    fn from(_: QueueError) -> Status {
        Status::MISUSE
    }
}

struct Slot<T> {
    /// Sequence number: `index` while empty-and-claimable by a producer,
    /// `index + 1` once a value has been published, `index + capacity`
    /// once a consumer has reclaimed it for the next lap.
    seq: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded lock-free MPMC ring buffer.
pub struct LockFreeQueue<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: access to each slot's `UnsafeCell` is serialised by the
// sequence-number protocol below: only the producer/consumer that wins
// the CAS on `tail`/`head` touches the corresponding slot's value.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    /// Build a queue of capacity `1 << capacity_log2`.
    ///
    /// # Errors
    /// Returns [`QueueError::CapacityTooLarge`] if `capacity_log2` exceeds
    /// [`MAX_CAPACITY_LOG2`].
    pub fn new(capacity_log2: u32) -> Result<LockFreeQueue<T>, QueueError> {
        if capacity_log2 > MAX_CAPACITY_LOG2 {
            return Err(QueueError::CapacityTooLarge(capacity_log2));
        }
        let capacity = 1usize << capacity_log2;
        let slots = (0..capacity)
            .map(|i| Slot {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(LockFreeQueue {
            slots,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        })
    }

    /// The queue's fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Attempt to push `value`. Returns `false` iff the queue was full at
    /// the linearisation point (never blocks).
    pub fn push(&self, value: T) -> bool {
        let mut tail = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[tail & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            #[allow(clippy::cast_possible_wrap)]
            let diff = seq as isize - tail as isize;
            match diff.cmp(&0) {
                std::cmp::Ordering::Equal => {
                    match self.tail.compare_exchange_weak(tail, tail.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed) {
                        Ok(_) => {
                            // SAFETY: we exclusively own this slot until
                            // its sequence number is published below.
                            unsafe { (*slot.value.get()).write(value) };
                            slot.seq.store(tail.wrapping_add(1), Ordering::Release);
                            return true;
                        }
                        Err(observed) => tail = observed,
                    }
                }
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Greater => tail = self.tail.load(Ordering::Relaxed),
            }
        }
    }

    /// Attempt to pop a value. Returns `None` iff the queue was empty at
    /// the linearisation point (never blocks).
    pub fn pop(&self) -> Option<T> {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[head & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            #[allow(clippy::cast_possible_wrap)]
            let diff = seq as isize - (head.wrapping_add(1)) as isize;
            match diff.cmp(&0) {
                std::cmp::Ordering::Equal => {
                    match self.head.compare_exchange_weak(head, head.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed) {
                        Ok(_) => {
                            // SAFETY: we exclusively own this slot until
                            // its sequence number is republished below.
                            let value = unsafe { (*slot.value.get()).assume_init_read() };
                            slot.seq.store(head.wrapping_add(self.slots.len()), Ordering::Release);
                            return Some(value);
                        }
                        Err(observed) => head = observed,
                    }
                }
                std::cmp::Ordering::Less => return None,
                std::cmp::Ordering::Greater => head = self.head.load(Ordering::Relaxed),
            }
        }
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // Drain any values still pending so their destructors run.
        while self.pop().is_some() {}
    }
}

/// A queue that only counts pushes and pops, modelling the specification's
/// zero-element-size mode.
pub type CountingQueue = LockFreeQueue<()>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_log2_zero_holds_one_element() {
        let q: LockFreeQueue<u32> = LockFreeQueue::new(0).unwrap();
        assert_eq!(q.capacity(), 1);
        assert!(q.push(1));
        assert!(!q.push(2));
        assert_eq!(q.pop(), Some(1));
        assert!(q.push(3));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn push_fails_when_full() {
        let q: LockFreeQueue<u32> = LockFreeQueue::new(2).unwrap();
        for i in 0..4 {
            assert!(q.push(i));
        }
        assert!(!q.push(99));
    }

    #[test]
    fn pop_fails_when_empty() {
        let q: LockFreeQueue<u32> = LockFreeQueue::new(2).unwrap();
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn fifo_order_is_preserved_single_threaded() {
        let q: LockFreeQueue<u32> = LockFreeQueue::new(3).unwrap();
        for i in 0..8 {
            assert!(q.push(i));
        }
        for i in 0..8 {
            assert_eq!(q.pop(), Some(i));
        }
    }

    #[test]
    fn capacity_over_max_is_rejected() {
        let err = LockFreeQueue::<u32>::new(MAX_CAPACITY_LOG2 + 1).unwrap_err();
        assert_eq!(err, QueueError::CapacityTooLarge(MAX_CAPACITY_LOG2 + 1));
    }

    #[test]
    fn counting_queue_tracks_presence_only() {
        let q: CountingQueue = LockFreeQueue::new(1).unwrap();
        assert!(q.push(()));
        assert!(q.push(()));
        assert!(!q.push(()));
        assert_eq!(q.pop(), Some(()));
        assert_eq!(q.pop(), Some(()));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn spsc_ten_thousand_values_round_trip_in_order() {
        let q = Arc::new(LockFreeQueue::<u32>::new(1).unwrap());
        let producer_q = q.clone();
        let producer = thread::spawn(move || {
            let mut i = 0u32;
            while i < 10_000 {
                if producer_q.push(i) {
                    i += 1;
                }
            }
        });
        let mut consumed = Vec::with_capacity(10_000);
        while consumed.len() < 10_000 {
            if let Some(v) = q.pop() {
                consumed.push(v);
            }
        }
        producer.join().unwrap();
        assert_eq!(consumed, (0..10_000).collect::<Vec<_>>());
    }

    proptest::proptest! {
        #[test]
        fn mpmc_never_duplicates_or_drops_values(n in 100u32..2000) {
            let q = Arc::new(LockFreeQueue::<u32>::new(4).unwrap());
            let producers: Vec<_> = (0..4u32).map(|p| {
                let q = q.clone();
                let per = n;
                thread::spawn(move || {
                    let mut i = 0u32;
                    while i < per {
                        if q.push(p * 1_000_000 + i) {
                            i += 1;
                        }
                    }
                })
            }).collect();

            let consumed = Arc::new(std::sync::Mutex::new(Vec::new()));
            let consumers: Vec<_> = (0..4).map(|_| {
                let q = q.clone();
                let consumed = consumed.clone();
                let target = (n as usize) * 4;
                thread::spawn(move || {
                    loop {
                        if consumed.lock().unwrap().len() >= target {
                            break;
                        }
                        if let Some(v) = q.pop() {
                            consumed.lock().unwrap().push(v);
                        }
                    }
                })
            }).collect();

            for p in producers {
                p.join().unwrap();
            }
            for c in consumers {
                c.join().unwrap();
            }

            let mut values = consumed.lock().unwrap().clone();
            let original_len = values.len();
            values.sort_unstable();
            values.dedup();
            prop_assert_eq!(values.len(), original_len);
            prop_assert_eq!(original_len, (n as usize) * 4);
        }
    }
}
