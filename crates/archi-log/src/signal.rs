// SPDX-License-Identifier: GPL-3.0-or-later

//! The POSIX signal facade (component L): a dedicated thread that blocks
//! a fixed set of signals, dispatches them to a swappable handler, and
//! publishes atomic flags the rest of the process can poll without
//! itself touching signal-handling primitives.
//!
//! Per the specification, facade failures are reported but never
//! retried; an absent signal thread (e.g. `start` failing on a platform
//! that can't register the watched set) is an acceptable silent no-op
//! for the core, which never depends on it to make progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use signal_hook::consts::signal::{
    SIGALRM, SIGCHLD, SIGCONT, SIGHUP, SIGINT, SIGPIPE, SIGPOLL, SIGPROF, SIGQUIT, SIGTERM, SIGTSTP, SIGTTIN, SIGTTOU,
    SIGURG, SIGUSR1, SIGUSR2, SIGVTALRM, SIGWINCH, SIGXCPU, SIGXFSZ,
};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors raised while starting the signal facade.
#[derive(Debug, Error)]
pub enum SignalError {
    /// `signal_hook::iterator::Signals::new` failed (usually a signal
    /// already claimed by another handler, or an unsupported platform).
    #[error("failed to register watched signals: {0}")]
    Register(#[source] std::io::Error),
    /// The dedicated signal-watching thread failed to spawn.
    #[error("failed to spawn the signal-watching thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// The eight groups of watched signals enumerated in §4.10, flattened
/// into the list actually handed to `signal_hook`.
#[derive(Debug, Clone, Copy)]
pub struct WatchedSignals;

impl WatchedSignals {
    /// Interruption: the signals a user or supervisor sends to ask the
    /// process to stop.
    pub const INTERRUPTION: [i32; 3] = [SIGINT, SIGQUIT, SIGTERM];
    /// Process lifecycle signals.
    pub const PROCESS: [i32; 3] = [SIGCHLD, SIGCONT, SIGTSTP];
    /// Resource-limit signals.
    pub const LIMIT: [i32; 2] = [SIGXCPU, SIGXFSZ];
    /// I/O-related signals.
    pub const IO: [i32; 3] = [SIGPIPE, SIGPOLL, SIGURG];
    /// Timer signals.
    pub const TIMER: [i32; 3] = [SIGALRM, SIGVTALRM, SIGPROF];
    /// Controlling-terminal signals.
    pub const TERMINAL: [i32; 4] = [SIGHUP, SIGTTIN, SIGTTOU, SIGWINCH];
    /// User-defined signals.
    pub const USER: [i32; 2] = [SIGUSR1, SIGUSR2];

    /// The real-time signal range `SIGRTMIN..=SIGRTMAX`, queried at
    /// runtime since glibc only fixes the bounds at process start (some
    /// are reserved by the pthreads implementation).
    #[must_use]
    pub fn realtime() -> std::ops::RangeInclusive<i32> {
        // SAFETY: both are plain accessor functions with no preconditions.
        let (min, max) = unsafe { (libc::SIGRTMIN(), libc::SIGRTMAX()) };
        min..=max
    }

    /// Every watched signal, all groups flattened into one list, for
    /// handing to `signal_hook::iterator::Signals::new`.
    #[must_use]
    pub fn all() -> Vec<i32> {
        let mut signals = Vec::new();
        signals.extend_from_slice(&Self::INTERRUPTION);
        signals.extend_from_slice(&Self::PROCESS);
        signals.extend_from_slice(&Self::LIMIT);
        signals.extend_from_slice(&Self::IO);
        signals.extend_from_slice(&Self::TIMER);
        signals.extend_from_slice(&Self::TERMINAL);
        signals.extend_from_slice(&Self::USER);
        signals.extend(Self::realtime());
        signals
    }
}

/// Per-signal atomic flags, set by the signal thread and polled by
/// anyone else. Looked up linearly over the (small, fixed) watched-set —
/// there are a few dozen entries at most, well under the cost of a hash.
pub struct SignalFlags {
    flags: Box<[(i32, AtomicBool)]>,
}

impl SignalFlags {
    fn new(signals: &[i32]) -> SignalFlags {
        let flags = signals.iter().map(|&signum| (signum, AtomicBool::new(false))).collect();
        SignalFlags { flags }
    }

    /// Whether `signum` has been observed since the last [`SignalFlags::clear`].
    /// Returns `false` for a signal outside the watched set.
    #[must_use]
    pub fn is_set(&self, signum: i32) -> bool {
        self.flags
            .iter()
            .find(|(s, _)| *s == signum)
            .is_some_and(|(_, flag)| flag.load(Ordering::Acquire))
    }

    /// Clear `signum`'s flag. A no-op for a signal outside the watched set.
    pub fn clear(&self, signum: i32) {
        if let Some((_, flag)) = self.flags.iter().find(|(s, _)| *s == signum) {
            flag.store(false, Ordering::Release);
        }
    }

    fn set(&self, signum: i32) {
        if let Some((_, flag)) = self.flags.iter().find(|(s, _)| *s == signum) {
            flag.store(true, Ordering::Release);
        }
    }
}

type Handler = dyn Fn(i32) -> bool + Send;

/// A dedicated thread blocking the watched signal set (per §4.10), owning
/// no other resources: it is meant to be started before any
/// `archi_threads::ThreadGroup` worker exists, so that every later thread
/// in the process inherits the same signal mask.
pub struct SignalThread {
    handle: Handle,
    join: Option<JoinHandle<()>>,
    flags: Arc<SignalFlags>,
    handler: Arc<Mutex<Option<Box<Handler>>>>,
}

impl SignalThread {
    /// Start the facade: register the watched signal set and spawn the
    /// dedicated watcher thread.
    ///
    /// # Errors
    /// [`SignalError::Register`] if the watched set can't be registered,
    /// [`SignalError::Spawn`] if the watcher thread fails to spawn.
    pub fn start() -> Result<SignalThread, SignalError> {
        let watched = WatchedSignals::all();
        let mut signals = Signals::new(&watched).map_err(SignalError::Register)?;
        let handle = signals.handle();
        let flags = Arc::new(SignalFlags::new(&watched));
        let handler: Arc<Mutex<Option<Box<Handler>>>> = Arc::new(Mutex::new(None));

        let worker_flags = flags.clone();
        let worker_handler = handler.clone();
        let join = std::thread::Builder::new()
            .name("archi-signal".to_string())
            .spawn(move || {
                for signum in &mut signals {
                    debug!(signum, "signal received");
                    let accepted = match worker_handler.lock().unwrap().as_ref() {
                        Some(handler) => handler(signum),
                        None => true,
                    };
                    if accepted {
                        worker_flags.set(signum);
                    } else {
                        warn!(signum, "signal handler suppressed the flag");
                    }
                }
            })
            .map_err(SignalError::Spawn)?;

        Ok(SignalThread { handle, join: Some(join), flags, handler })
    }

    /// The shared flag set this facade publishes into.
    #[must_use]
    pub fn flags(&self) -> Arc<SignalFlags> {
        self.flags.clone()
    }

    /// Swap the handler called before a flag is set. `handler` returning
    /// `false` suppresses the flag for that delivery; `None` restores
    /// "always set the flag".
    pub fn set_handler<F>(&self, handler: Option<F>)
    where
        F: Fn(i32) -> bool + Send + 'static,
    {
        *self.handler.lock().unwrap() = handler.map(|f| Box::new(f) as Box<Handler>);
    }

    /// Unblock the watcher thread's iteration and join it. Safe to call
    /// more than once.
    pub fn stop(&mut self) {
        self.handle.close();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("signal-watching thread panicked");
            }
        }
    }
}

impl Drop for SignalThread {
    fn drop(&mut self) {
        self.stop();
    }
}
