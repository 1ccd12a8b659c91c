// SPDX-License-Identifier: GPL-3.0-or-later

//! The process-global [`LogContext`], per §4.10: a verbosity knob, an
//! elapsed-time clock, and `log_*` entry points that gate on verbosity
//! and delegate to `tracing`.

use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

/// Highest verbosity level accepted by [`LogContext::init`].
pub const MAX_VERBOSITY: u8 = 5;

static CONTEXT: OnceLock<LogContext> = OnceLock::new();

/// A process-global logging configuration: verbosity, colour, and a
/// clock measuring time elapsed since the first [`LogContext::init`]
/// call. Subsequent `init` calls are ignored — the first one wins, per
/// the specification's "set once" invariant.
pub struct LogContext {
    verbosity: u8,
    color: bool,
    start: Instant,
    print_lock: Mutex<()>,
}

impl LogContext {
    /// Install the process-global log context, and initialize a
    /// `tracing_subscriber` formatting layer honoring `RUST_LOG` (or
    /// `verbosity` if `RUST_LOG` is unset). A no-op if a context was
    /// already installed by an earlier call.
    pub fn init(verbosity: u8, color: bool) {
        let verbosity = verbosity.min(MAX_VERBOSITY);

        let installed = CONTEXT
            .set(LogContext { verbosity, color, start: Instant::now(), print_lock: Mutex::new(()) })
            .is_ok();

        if installed {
            let default_filter = match verbosity {
                0 => "off",
                1 => "error",
                2 => "warn",
                3 => "info",
                4 => "debug",
                _ => "trace",
            };
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
            let _ = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(color).with_target(true).try_init();
        }
    }

    /// The installed context, or a lazily-installed default
    /// (`verbosity = 0`, colour disabled) if [`LogContext::init`] was
    /// never called.
    fn get() -> &'static LogContext {
        CONTEXT.get_or_init(|| {
            LogContext { verbosity: 0, color: false, start: Instant::now(), print_lock: Mutex::new(()) }
        })
    }

    /// Current verbosity level, `0..=MAX_VERBOSITY`.
    #[must_use]
    pub fn verbosity() -> u8 {
        LogContext::get().verbosity
    }

    /// Whether colour output is enabled.
    #[must_use]
    pub fn color() -> bool {
        LogContext::get().color
    }

    /// Time elapsed since this context was installed (or, if never
    /// explicitly installed, since the first logging call).
    #[must_use]
    pub fn elapsed() -> std::time::Duration {
        LogContext::get().start.elapsed()
    }

    /// Print a line to stdout, serialised against other threads by an
    /// internal mutex so lines from different threads never interleave.
    pub fn print(line: &str) {
        let context = LogContext::get();
        let _guard = context.print_lock.lock().unwrap();
        println!("[{:>10.3}] {line}", context.start.elapsed().as_secs_f64());
    }
}

/// Log an error-level message if verbosity permits, tagged with `module`.
pub fn log_error(module: &str, message: &str) {
    if LogContext::verbosity() >= 1 {
        error!(module, "{message}");
    }
}

/// Log a warning-level message if verbosity permits, tagged with `module`.
pub fn log_warning(module: &str, message: &str) {
    if LogContext::verbosity() >= 2 {
        warn!(module, "{message}");
    }
}

/// Log a notice (elevated info) message if verbosity permits, tagged
/// with `module`.
pub fn log_notice(module: &str, message: &str) {
    if LogContext::verbosity() >= 3 {
        info!(module, "{message}");
    }
}

/// Log an info-level message if verbosity permits, tagged with `module`.
pub fn log_info(module: &str, message: &str) {
    if LogContext::verbosity() >= 4 {
        debug!(module, "{message}");
    }
}

/// Log a debug-level message if verbosity permits, tagged with `module`.
pub fn log_debug(module: &str, message: &str) {
    if LogContext::verbosity() >= MAX_VERBOSITY {
        trace!(module, "{message}");
    }
}
