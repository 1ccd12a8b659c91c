// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-hsp
//!
//! Hierarchical State Processor (component J): a stack-of-frames
//! cooperative scheduler, per §4.9.

pub mod hsp;
pub mod state;
pub mod transition;

pub use hsp::Hsp;
pub use state::{Frame, State, StateFunction};
pub use transition::{Attachment, AttachmentsHandler, Transition};
