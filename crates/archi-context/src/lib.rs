// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-context
//!
//! The context interface (component G) and the self-hosted context
//! registry (component H):
//!
//! - [`interface::ContextInterface`]: the capability set every context
//!   implements.
//! - [`context::Context`]: the ref-counted wrapper around an interface
//!   instance plus its `public`/`private` values.
//! - [`registry::Registry`]: the `name -> Context` map, itself a context,
//!   whose `act` implements the registry mutators.
//! - [`builtin`]: the always-present `parameters`, `pointer`, `array`,
//!   `memory` and `memory_mapping` contexts.

pub mod boxed;
pub mod builtin;
pub mod context;
pub mod interface;
pub mod interface_pointer;
pub mod registry;
pub mod scalar;

pub use context::Context;
pub use interface::{ContextInterface, InitResult, Slot};
pub use registry::Registry;
