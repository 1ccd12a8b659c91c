// SPDX-License-Identifier: GPL-3.0-or-later

//! The instruction interpreter (component I): executes an
//! [`InstructionList`] against a [`Registry`], per §4.8.

use archi_context::boxed::boxed_ref;
use archi_context::Registry;
use archi_core::params::ParameterList;
use archi_core::status::Status;
use tracing::{debug, error, warn};

use crate::instruction::{Instruction, InstructionList, ParamsRef};

/// Resolve a [`ParamsRef`] into a concrete [`ParameterList`].
///
/// # Errors
/// [`Status::MISUSE`] if both `sparams` and `dparams_key` are set — the
/// specification leaves this combination unspecified in the source; this
/// implementation treats it as an error (see the workspace `DESIGN.md`).
/// [`Status::VALUE`] if `dparams_key` doesn't name a `parameters` context.
pub fn resolve_params(registry: &Registry, params_ref: &ParamsRef) -> Result<ParameterList, Status> {
    match (&params_ref.sparams, &params_ref.dparams_key) {
        (Some(_), Some(_)) => Err(Status::MISUSE),
        (Some(list), None) => Ok(list.clone()),
        (None, Some(key)) => {
            let context = registry.get(key)?;
            let data = context.data().ok_or(Status::VALUE)?;
            boxed_ref::<ParameterList>(data).cloned().ok_or(Status::VALUE)
        }
        (None, None) => Ok(ParameterList::new()),
    }
}

/// Executes an [`InstructionList`] against a [`Registry`].
///
/// `strict`: if `true`, any non-zero status (including the `+1`/`+2`
/// key-existence conditions) aborts execution; if `false`, only negative
/// statuses abort, and positive ones are logged and execution continues,
/// per §4.8/§7.
pub struct Interpreter {
    strict: bool,
}

impl Interpreter {
    /// Build an interpreter with the given strictness policy.
    #[must_use]
    pub fn new(strict: bool) -> Interpreter {
        Interpreter { strict }
    }

    /// Run `instructions` against `registry`. On abort, tears the
    /// registry down in reverse insertion order before returning.
    pub fn execute(&self, registry: &Registry, instructions: &InstructionList) -> Status {
        for (index, instruction) in instructions.iter().enumerate() {
            let status = self.execute_one(registry, instruction);

            if status.is_error() {
                error!(index, %status, ?instruction, "instruction failed, aborting");
                registry.teardown_reverse();
                return status;
            }

            if status.is_condition() {
                if self.strict {
                    error!(index, %status, ?instruction, "instruction returned a condition under strict policy, aborting");
                    registry.teardown_reverse();
                    return status;
                }
                warn!(index, %status, ?instruction, "instruction returned a condition, continuing (lenient policy)");
            }
        }
        debug!(count = instructions.len(), "instruction list executed to completion");
        Status::OK
    }

    fn execute_one(&self, registry: &Registry, instruction: &Instruction) -> Status {
        match instruction {
            Instruction::Noop => Status::OK,
            Instruction::Delete { key } => registry.delete(key),
            Instruction::Copy { key, original_key } => registry.copy(key, original_key),
            Instruction::InitParameters { key, params } => match resolve_params(registry, params) {
                Ok(params) => registry.init_parameters(key, &params),
                Err(status) => status,
            },
            Instruction::InitPointer { key, value } => registry.init_pointer(key, value.clone()),
            Instruction::InitArray { key, num_elements, flags } => registry.init_array(key, *num_elements, *flags),
            Instruction::InitFromContext { key, interface_origin_key, params } => match resolve_params(registry, params) {
                Ok(params) => registry.init_from_context(key, interface_origin_key, &params),
                Err(status) => status,
            },
            Instruction::InitFromSlot { key, interface_origin_key, interface_origin_slot, params } => {
                match resolve_params(registry, params) {
                    Ok(params) => registry.init_from_slot(key, interface_origin_key, interface_origin_slot, &params),
                    Err(status) => status,
                }
            }
            Instruction::SetToValue { key, slot, value } => registry.set_to_value(key, slot, value.clone()),
            Instruction::SetToContextData { key, slot, source_key } => registry.set_to_context_data(key, slot, source_key),
            Instruction::SetToContextSlot { key, slot, source_key, source_slot } => {
                registry.set_to_context_slot(key, slot, source_key, source_slot)
            }
            Instruction::Act { key, action, indices, params } => match resolve_params(registry, params) {
                Ok(params) => registry.act(key, action, indices, &params),
                Err(status) => status,
            },
        }
    }
}
