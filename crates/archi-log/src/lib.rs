// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-log
//!
//! Logging and signal facade (component L): leaf services consumed by
//! every other crate in the workspace.
//!
//! - [`context::LogContext`]: a process-global, one-shot-initialised
//!   verbosity/colour/elapsed-clock singleton, backed by `tracing`.
//! - [`signal::SignalThread`]: a dedicated thread blocking the watched
//!   POSIX signal set and publishing atomic flags for the rest of the
//!   process to poll.

pub mod context;
pub mod signal;

pub use context::LogContext;
pub use signal::{SignalFlags, SignalThread, WatchedSignals};
