// SPDX-License-Identifier: GPL-3.0-or-later

//! The flip-flop flag barrier used twice per [`crate::ThreadGroup`]
//! (`ping` and `pong`), per §4.5 of the specification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// A `{flag, sense, condvar, mutex}` barrier: one side publishes a
/// toggled sense under the mutex and broadcasts; the other toggles its
/// own local sense and waits until the published flag matches it.
///
/// Used twice per thread group (`ping` wakes workers for a new dispatch,
/// `pong` wakes the caller when all workers finish and no callback was
/// supplied).
pub struct FlagBarrier {
    flag: Mutex<bool>,
    sense: AtomicBool,
    condvar: Condvar,
}

impl FlagBarrier {
    /// A fresh barrier with both the published flag and sense at `false`.
    #[must_use]
    pub fn new() -> FlagBarrier {
        FlagBarrier {
            flag: Mutex::new(false),
            sense: AtomicBool::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Publisher side: toggle the barrier's sense, publish it as the new
    /// flag value, and wake every waiter.
    pub fn signal(&self) {
        let new_sense = !self.sense.load(Ordering::Relaxed);
        self.sense.store(new_sense, Ordering::Relaxed);
        let mut flag = self.flag.lock().unwrap();
        *flag = new_sense;
        drop(flag);
        self.condvar.notify_all();
    }

    /// Waiter side: toggle `local_sense` and block until the published
    /// flag matches it, mirroring "each worker toggles its local
    /// `ping_sense`, waits on `ping.condvar` until `ping.flag ==
    /// local_ping_sense`".
    pub fn wait(&self, local_sense: &mut bool) {
        *local_sense = !*local_sense;
        let target = *local_sense;
        let guard = self.flag.lock().unwrap();
        drop(self.condvar.wait_while(guard, |flag| *flag != target).unwrap());
    }
}

impl Default for FlagBarrier {
    fn default() -> FlagBarrier {
        FlagBarrier::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn signal_wakes_a_waiting_thread() {
        let barrier = Arc::new(FlagBarrier::new());
        let waiter_barrier = barrier.clone();
        let waiter = thread::spawn(move || {
            let mut local_sense = false;
            waiter_barrier.wait(&mut local_sense);
            local_sense
        });

        // Give the waiter a moment to block; not required for correctness
        // but keeps the test from racing signal() before wait() locks.
        thread::yield_now();
        barrier.signal();

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn two_rounds_toggle_correctly() {
        let barrier = Arc::new(FlagBarrier::new());
        let waiter_barrier = barrier.clone();
        let h = thread::spawn(move || {
            let mut local_sense = false;
            waiter_barrier.wait(&mut local_sense);
            waiter_barrier.wait(&mut local_sense);
        });
        thread::yield_now();
        barrier.signal();
        thread::yield_now();
        barrier.signal();
        h.join().unwrap();
    }
}
