// SPDX-License-Identifier: GPL-3.0-or-later

//! The textual surface representation of `{params, instructions}` this
//! loader parses, per §4.11's documented Open Question resolution: the
//! original's binary, pointer-patched image is out of scope (§1), so
//! this crate accepts a JSON document with the same shape instead.
//!
//! Every `Pointer` literal in the surface format is one of three JSON
//! shapes: `null` (the null pointer), an unsigned integer (packed via
//! [`archi_core::Pointer::from_usize`], the same convention the rest of
//! the workspace uses for small scalar parameters), or a string (boxed
//! via [`archi_context::scalar::pointer_from_string`]). Anything else is
//! rejected — this loader has no use for richer literal values, since
//! the contexts built from an instruction list construct their own
//! structured state from these scalars.

use serde::Deserialize;
use serde_json::Value as Json;

use archi_context::interface::Slot;
use archi_context::scalar::pointer_from_string;
use archi_core::params::ParameterList;
use archi_core::Pointer;
use archi_instr::instruction::{Instruction, InstructionList, ParamsRef};

use crate::LoaderError;

/// One `(name, value)` entry of a surface parameter list.
#[derive(Debug, Deserialize)]
pub struct ParamEntry {
    /// The entry's name.
    pub name: String,
    /// The entry's value, one of the three literal shapes documented above.
    pub value: Json,
}

/// A surface slot reference: a name plus optional indices.
#[derive(Debug, Deserialize, Default)]
pub struct SlotEntry {
    /// The slot's name.
    pub name: String,
    /// Indices for a multi-valued slot; empty for a single-valued one.
    #[serde(default)]
    pub indices: Vec<usize>,
}

/// A surface `sparams`/`dparams_key` pair, mirroring [`ParamsRef`].
#[derive(Debug, Deserialize, Default)]
pub struct ParamsRefEntry {
    #[serde(default)]
    dparams_key: Option<String>,
    #[serde(default)]
    sparams: Option<Vec<ParamEntry>>,
}

/// The whole surface document.
#[derive(Debug, Deserialize, Default)]
pub struct FileSurface {
    /// Module-level configuration parameters.
    #[serde(default)]
    pub params: Vec<ParamEntry>,
    /// The root program to execute.
    #[serde(default)]
    pub instructions: Vec<InstructionEntry>,
}

/// One instruction, tagged by its opcode name (`snake_case`, matching
/// §4.8's table).
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InstructionEntry {
    /// No operation.
    Noop,
    /// `DELETE key`.
    Delete {
        /// Key to remove.
        key: String,
    },
    /// `COPY key FROM original_key`.
    Copy {
        /// New key.
        key: String,
        /// Key being aliased.
        original_key: String,
    },
    /// `INIT_PARAMETERS key`.
    InitParameters {
        /// New key.
        key: String,
        /// Parameters.
        #[serde(flatten)]
        params: ParamsRefEntry,
    },
    /// `INIT_POINTER key value`.
    InitPointer {
        /// New key.
        key: String,
        /// The wrapped literal value.
        value: Json,
    },
    /// `INIT_ARRAY key num_elements flags`.
    InitArray {
        /// New key.
        key: String,
        /// Fixed element count.
        num_elements: usize,
        /// Reserved flags.
        #[serde(default)]
        flags: u32,
    },
    /// `INIT_FROM_CONTEXT key interface_origin_key`.
    InitFromContext {
        /// New key.
        key: String,
        /// Key of the context whose interface is reused.
        interface_origin_key: String,
        /// Parameters.
        #[serde(flatten)]
        params: ParamsRefEntry,
    },
    /// `INIT_FROM_SLOT key interface_origin_key interface_origin_slot`.
    InitFromSlot {
        /// New key.
        key: String,
        /// Key of the context the interface is read from.
        interface_origin_key: String,
        /// Slot holding the interface.
        interface_origin_slot: SlotEntry,
        /// Parameters.
        #[serde(flatten)]
        params: ParamsRefEntry,
    },
    /// `SET_TO_VALUE key slot value`.
    SetToValue {
        /// Target context key.
        key: String,
        /// Target slot.
        slot: SlotEntry,
        /// Literal value to set.
        value: Json,
    },
    /// `SET_TO_CONTEXT_DATA key slot source_key`.
    SetToContextData {
        /// Target context key.
        key: String,
        /// Target slot.
        slot: SlotEntry,
        /// Source context key.
        source_key: String,
    },
    /// `SET_TO_CONTEXT_SLOT key slot source_key source_slot`.
    SetToContextSlot {
        /// Target context key.
        key: String,
        /// Target slot.
        slot: SlotEntry,
        /// Source context key.
        source_key: String,
        /// Source slot.
        source_slot: SlotEntry,
    },
    /// `ACT key action [indices] [params]`.
    Act {
        /// Target context key.
        key: String,
        /// Action name.
        action: String,
        /// Indices forwarded to the action.
        #[serde(default)]
        indices: Vec<usize>,
        /// Parameters.
        #[serde(flatten)]
        params: ParamsRefEntry,
    },
}

/// Decode a surface JSON literal into a [`Pointer`].
///
/// # Errors
/// [`LoaderError::UnsupportedValue`] for anything other than `null`, an
/// unsigned integer that fits `usize`, or a string.
pub fn value_from_json(value: &Json) -> Result<Pointer, LoaderError> {
    match value {
        Json::Null => Ok(Pointer::null()),
        Json::Number(n) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Pointer::from_usize)
            .ok_or_else(|| LoaderError::UnsupportedValue(value.clone())),
        Json::String(s) => Ok(pointer_from_string(s.clone())),
        _ => Err(LoaderError::UnsupportedValue(value.clone())),
    }
}

/// Build a [`ParameterList`] from an ordered sequence of surface entries.
///
/// # Errors
/// Propagates [`value_from_json`]'s errors.
pub fn params_from_entries(entries: &[ParamEntry]) -> Result<ParameterList, LoaderError> {
    let mut params = ParameterList::new();
    for entry in entries {
        params.push(entry.name.clone(), value_from_json(&entry.value)?);
    }
    Ok(params)
}

fn params_ref_from(entry: ParamsRefEntry) -> Result<ParamsRef, LoaderError> {
    let sparams = entry.sparams.as_deref().map(params_from_entries).transpose()?;
    Ok(ParamsRef { sparams, dparams_key: entry.dparams_key })
}

fn slot_from_entry(entry: SlotEntry) -> Slot {
    Slot::indexed(entry.name, entry.indices)
}

fn instruction_from_entry(entry: InstructionEntry) -> Result<Instruction, LoaderError> {
    Ok(match entry {
        InstructionEntry::Noop => Instruction::Noop,
        InstructionEntry::Delete { key } => Instruction::Delete { key },
        InstructionEntry::Copy { key, original_key } => Instruction::Copy { key, original_key },
        InstructionEntry::InitParameters { key, params } => Instruction::InitParameters {
            key,
            params: params_ref_from(params)?,
        },
        InstructionEntry::InitPointer { key, value } => Instruction::InitPointer {
            key,
            value: value_from_json(&value)?,
        },
        InstructionEntry::InitArray { key, num_elements, flags } => Instruction::InitArray { key, num_elements, flags },
        InstructionEntry::InitFromContext { key, interface_origin_key, params } => Instruction::InitFromContext {
            key,
            interface_origin_key,
            params: params_ref_from(params)?,
        },
        InstructionEntry::InitFromSlot { key, interface_origin_key, interface_origin_slot, params } => {
            Instruction::InitFromSlot {
                key,
                interface_origin_key,
                interface_origin_slot: slot_from_entry(interface_origin_slot),
                params: params_ref_from(params)?,
            }
        }
        InstructionEntry::SetToValue { key, slot, value } => Instruction::SetToValue {
            key,
            slot: slot_from_entry(slot),
            value: value_from_json(&value)?,
        },
        InstructionEntry::SetToContextData { key, slot, source_key } => Instruction::SetToContextData {
            key,
            slot: slot_from_entry(slot),
            source_key,
        },
        InstructionEntry::SetToContextSlot { key, slot, source_key, source_slot } => Instruction::SetToContextSlot {
            key,
            slot: slot_from_entry(slot),
            source_key,
            source_slot: slot_from_entry(source_slot),
        },
        InstructionEntry::Act { key, action, indices, params } => Instruction::Act {
            key,
            action,
            indices,
            params: params_ref_from(params)?,
        },
    })
}

/// Convert every surface instruction into the workspace's native
/// [`InstructionList`], in order.
///
/// # Errors
/// Propagates [`value_from_json`]'s errors for the first offending entry.
pub fn instructions_from_entries(entries: Vec<InstructionEntry>) -> Result<InstructionList, LoaderError> {
    entries.into_iter().map(instruction_from_entry).collect()
}
