// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-threads
//!
//! The thread group (component F): a fixed-size worker pool driven by a
//! pair of flip-flop [`barrier::FlagBarrier`]s, dispatching indexed work
//! items in batches and running a completion callback on whichever worker
//! finishes last. `num_threads == 0` runs `dispatch` inline on the caller.
//!
//! The C original's `{fn, data}` pairs become plain `Send + Sync`
//! closures here — a closure already *is* "function pointer plus opaque
//! captured data", so there is no separate data pointer to plumb through.

pub mod barrier;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use archi_core::status::Status;
use barrier::FlagBarrier;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors raised by this crate's own operations.
#[derive(Debug, Error)]
pub enum ThreadsError {
    /// `std::thread::Builder::spawn` failed while starting the group.
    #[error("failed to spawn worker thread {index}: {source}")]
    SpawnFailed {
        /// Index of the worker that failed to spawn.
        index: usize,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl From<ThreadsError> for Status {
    fn from(_: ThreadsError) -> Status {
        Status::RESOURCE
    }
}

/// One unit of dispatched work: a function of `(index, thread_idx)` and
/// the total number of indices `0..size` to run it over.
#[derive(Clone)]
pub struct WorkSpec {
    work_fn: Arc<dyn Fn(usize, usize) + Send + Sync>,
    size: usize,
}

impl WorkSpec {
    /// Build a work spec calling `work_fn(index, thread_idx)` for every
    /// `index` in `0..size`.
    #[must_use]
    pub fn new<F>(size: usize, work_fn: F) -> WorkSpec
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        WorkSpec {
            work_fn: Arc::new(work_fn),
            size,
        }
    }
}

/// A completion callback, run by the finisher thread once per dispatch.
#[derive(Clone)]
pub struct CallbackSpec {
    callback_fn: Arc<dyn Fn() + Send + Sync>,
}

impl CallbackSpec {
    /// Build a callback spec.
    #[must_use]
    pub fn new<F>(callback_fn: F) -> CallbackSpec
    where
        F: Fn() + Send + Sync + 'static,
    {
        CallbackSpec {
            callback_fn: Arc::new(callback_fn),
        }
    }
}

#[derive(Clone)]
struct Dispatch {
    /// `None` is the stop sentinel (C's `work.fn == null`).
    work: Option<WorkSpec>,
    callback: Option<CallbackSpec>,
    batch_size: usize,
}

struct GroupState {
    num_threads: usize,
    ping: FlagBarrier,
    pong: FlagBarrier,
    dispatch: Mutex<Option<Dispatch>>,
    work_items_done: AtomicUsize,
    threads_done: AtomicUsize,
}

/// A fixed-size worker pool with barrier-synchronised work dispatch.
pub struct ThreadGroup {
    state: Arc<GroupState>,
    threads: Vec<JoinHandle<()>>,
    caller_pong_sense: Mutex<bool>,
}

impl ThreadGroup {
    /// Spawn `num_threads` workers (`0` is legal: `dispatch` then runs
    /// inline on the caller).
    ///
    /// # Errors
    /// Returns [`ThreadsError::SpawnFailed`] if any worker fails to spawn;
    /// already-spawned workers are joined via the stop sentinel before
    /// returning the error.
    pub fn start(num_threads: usize) -> Result<ThreadGroup, ThreadsError> {
        let state = Arc::new(GroupState {
            num_threads,
            ping: FlagBarrier::new(),
            pong: FlagBarrier::new(),
            dispatch: Mutex::new(None),
            work_items_done: AtomicUsize::new(0),
            threads_done: AtomicUsize::new(0),
        });

        let mut threads = Vec::with_capacity(num_threads);
        for thread_idx in 0..num_threads {
            let worker_state = state.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("archi-worker-{thread_idx}"))
                .spawn(move || worker_loop(&worker_state, thread_idx));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(source) => {
                    // Join whatever was spawned so far via the stop
                    // sentinel, then surface the failure.
                    let mut group = ThreadGroup {
                        state,
                        threads,
                        caller_pong_sense: Mutex::new(false),
                    };
                    group.stop();
                    return Err(ThreadsError::SpawnFailed { index: thread_idx, source });
                }
            }
        }

        Ok(ThreadGroup {
            state,
            threads,
            caller_pong_sense: Mutex::new(false),
        })
    }

    /// Number of workers in the group (`0` means inline dispatch).
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.state.num_threads
    }

    /// Dispatch `work` across the group, in batches of `batch_size`
    /// (`0` auto-computes `ceil(work.size / num_threads)`), running
    /// `callback` once on the finishing thread — or, if `callback` is
    /// `None`, blocking the caller until all workers finish.
    ///
    /// With `num_threads == 0`, runs `work` inline for every index with
    /// `thread_idx = 0`, then `callback` (if any), before returning.
    pub fn dispatch(&self, work: WorkSpec, callback: Option<CallbackSpec>, batch_size: usize) {
        if self.state.num_threads == 0 {
            for index in 0..work.size {
                (work.work_fn)(index, 0);
            }
            if let Some(callback) = callback {
                (callback.callback_fn)();
            }
            return;
        }

        let batch_size = if batch_size == 0 {
            div_ceil(work.size, self.state.num_threads).max(1)
        } else {
            batch_size
        };

        trace!(size = work.size, batch_size, "dispatching work to thread group");
        self.state.work_items_done.store(0, Ordering::Relaxed);
        self.state.threads_done.store(0, Ordering::Relaxed);
        *self.state.dispatch.lock().unwrap() = Some(Dispatch {
            work: Some(work),
            callback: callback.clone(),
            batch_size,
        });
        self.state.ping.signal();

        if callback.is_none() {
            let mut local_sense = self.caller_pong_sense.lock().unwrap();
            self.state.pong.wait(&mut local_sense);
        }
    }

    /// Signal the stop sentinel and join every worker. Safe to call more
    /// than once; subsequent calls are no-ops.
    pub fn stop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        *self.state.dispatch.lock().unwrap() = Some(Dispatch {
            work: None,
            callback: None,
            batch_size: 0,
        });
        self.state.ping.signal();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        debug!("thread group stopped");
    }
}

impl Drop for ThreadGroup {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(state: &Arc<GroupState>, thread_idx: usize) {
    let mut local_ping_sense = false;
    loop {
        state.ping.wait(&mut local_ping_sense);
        let dispatch = state.dispatch.lock().unwrap().clone();
        let Some(dispatch) = dispatch else { continue };
        let Some(work) = dispatch.work else {
            // Stop sentinel.
            return;
        };

        loop {
            let start = state.work_items_done.fetch_add(dispatch.batch_size, Ordering::Relaxed);
            if start >= work.size {
                break;
            }
            let end = (start + dispatch.batch_size).min(work.size);
            for index in start..end {
                (work.work_fn)(index, thread_idx);
            }
        }

        let finished = state.threads_done.fetch_add(1, Ordering::AcqRel) + 1;
        if finished == state.num_threads {
            std::sync::atomic::fence(Ordering::Acquire);
            if let Some(callback) = &dispatch.callback {
                (callback.callback_fn)();
            } else {
                state.pong.signal();
            }
        }
    }
}

fn div_ceil(numerator: usize, denominator: usize) -> usize {
    numerator.div_ceil(denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    #[test]
    fn inline_dispatch_runs_on_caller_with_zero_threads() {
        let group = ThreadGroup::start(0).unwrap();
        let sum = Arc::new(AtomicI64::new(0));
        let sum_clone = sum.clone();
        let done = Arc::new(AtomicUsize::new(0));
        let done_clone = done.clone();
        group.dispatch(
            WorkSpec::new(5, move |i, thread_idx| {
                assert_eq!(thread_idx, 0);
                sum_clone.fetch_add(i as i64, Ordering::SeqCst);
            }),
            Some(CallbackSpec::new(move || {
                done_clone.fetch_add(1, Ordering::SeqCst);
            })),
            0,
        );
        assert_eq!(sum.load(Ordering::SeqCst), 0 + 1 + 2 + 3 + 4);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn every_index_runs_exactly_once_with_workers() {
        let mut group = ThreadGroup::start(4).unwrap();
        let seen = Arc::new(Mutex::new(vec![0u8; 10_000]));
        let seen_clone = seen.clone();
        group.dispatch(
            WorkSpec::new(10_000, move |i, _thread_idx| {
                seen_clone.lock().unwrap()[i] += 1;
            }),
            None,
            0,
        );
        assert!(seen.lock().unwrap().iter().all(|&count| count == 1));
        group.stop();
    }

    #[test]
    fn thread_group_sum_doubles_array() {
        let mut group = ThreadGroup::start(4).unwrap();
        let arr: Arc<Vec<AtomicI64>> = Arc::new((0..10_000).map(|_| AtomicI64::new(1)).collect());
        let arr_clone = arr.clone();
        group.dispatch(
            WorkSpec::new(10_000, move |i, _thread_idx| {
                arr_clone[i].fetch_mul_i64(2);
            }),
            None,
            0,
        );
        let sum: i64 = arr.iter().map(|a| a.load(Ordering::SeqCst)).sum();
        assert_eq!(sum, 20_000);
        group.stop();
    }

    #[test]
    fn callback_runs_exactly_once_on_the_finishing_thread() {
        let mut group = ThreadGroup::start(4).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        group.dispatch(
            WorkSpec::new(100, |_i, _thread_idx| {}),
            Some(CallbackSpec::new(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            })),
            0,
        );
        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        group.stop();
    }

    #[test]
    fn zero_size_work_is_a_no_op_success() {
        let mut group = ThreadGroup::start(2).unwrap();
        group.dispatch(WorkSpec::new(0, |_i, _thread_idx| panic!("should never run")), None, 0);
        group.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let mut group = ThreadGroup::start(2).unwrap();
        group.stop();
        group.stop();
    }

    trait AtomicI64Ext {
        fn fetch_mul_i64(&self, factor: i64) -> i64;
    }

    impl AtomicI64Ext for AtomicI64 {
        fn fetch_mul_i64(&self, factor: i64) -> i64 {
            self.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v * factor)).unwrap()
        }
    }
}
