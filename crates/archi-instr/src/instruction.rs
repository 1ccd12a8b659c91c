// SPDX-License-Identifier: GPL-3.0-or-later

//! Instruction types (component I), per §4.8.
//!
//! Parameter resolution is exactly one of `sparams` (static, embedded in
//! the program) and `dparams_key` (dynamic, fetched from the registry by
//! key); both present is [`archi_core::status::Status::MISUSE`], per the
//! specification's resolved Open Question (see the workspace `DESIGN.md`).

use archi_context::interface::Slot;
use archi_core::params::ParameterList;
use archi_core::Pointer;

/// Exactly one of a static, embedded parameter list and a dynamic one to
/// be fetched from the registry by key — or neither, meaning "empty".
#[derive(Debug, Clone, Default)]
pub struct ParamsRef {
    /// A parameter list embedded directly in the program.
    pub sparams: Option<ParameterList>,
    /// A key naming a `parameters`-context already in the registry.
    pub dparams_key: Option<String>,
}

impl ParamsRef {
    /// No parameters.
    #[must_use]
    pub fn none() -> ParamsRef {
        ParamsRef::default()
    }

    /// A static, embedded parameter list.
    #[must_use]
    pub fn static_list(params: ParameterList) -> ParamsRef {
        ParamsRef { sparams: Some(params), dparams_key: None }
    }

    /// A dynamic parameter list, read from the registry at execution time.
    #[must_use]
    pub fn dynamic(key: impl Into<String>) -> ParamsRef {
        ParamsRef { sparams: None, dparams_key: Some(key.into()) }
    }
}

/// A single instruction in the program executed by [`crate::Interpreter`].
#[derive(Debug, Clone)]
pub enum Instruction {
    /// No operation.
    Noop,
    /// Finalize and remove a context.
    Delete {
        /// Key of the context to remove.
        key: String,
    },
    /// Alias an existing context under a new key.
    Copy {
        /// New key.
        key: String,
        /// Key of the context being aliased.
        original_key: String,
    },
    /// Initialize a new `parameters` context.
    InitParameters {
        /// New key.
        key: String,
        /// Parameters to build the list from.
        params: ParamsRef,
    },
    /// Initialize a new `pointer` context.
    InitPointer {
        /// New key.
        key: String,
        /// The wrapped value.
        value: Pointer,
    },
    /// Initialize a new `array` context.
    InitArray {
        /// New key.
        key: String,
        /// Fixed element count.
        num_elements: usize,
        /// Reserved flags (currently unused by the built-in interface,
        /// carried for forward compatibility with user-defined bits).
        flags: u32,
    },
    /// Initialize a new context reusing an existing context's interface.
    InitFromContext {
        /// New key.
        key: String,
        /// Key of the context whose interface is reused.
        interface_origin_key: String,
        /// Init parameters.
        params: ParamsRef,
    },
    /// Initialize a new context using an interface read from a slot of
    /// an existing context.
    InitFromSlot {
        /// New key.
        key: String,
        /// Key of the context the interface is read from.
        interface_origin_key: String,
        /// Slot on `interface_origin_key` that holds the interface.
        interface_origin_slot: Slot,
        /// Init parameters.
        params: ParamsRef,
    },
    /// Set a context's slot to a literal value.
    SetToValue {
        /// Target context key.
        key: String,
        /// Target slot.
        slot: Slot,
        /// Value to set.
        value: Pointer,
    },
    /// Set a context's slot to another context's public value.
    SetToContextData {
        /// Target context key.
        key: String,
        /// Target slot.
        slot: Slot,
        /// Source context key.
        source_key: String,
    },
    /// Set a context's slot to another context's slot.
    SetToContextSlot {
        /// Target context key.
        key: String,
        /// Target slot.
        slot: Slot,
        /// Source context key.
        source_key: String,
        /// Source slot.
        source_slot: Slot,
    },
    /// Invoke a named action on a context.
    Act {
        /// Target context key.
        key: String,
        /// Action name.
        action: String,
        /// Indices forwarded to the action.
        indices: Vec<usize>,
        /// Action parameters.
        params: ParamsRef,
    },
}

/// A program: a flat, ordered list of [`Instruction`]s — the Rust-native
/// equivalent of the singly linked, lazily parsed list the original
/// walks once (see the workspace `SPEC_FULL.md` §4.8 REDESIGN note).
pub type InstructionList = Vec<Instruction>;
