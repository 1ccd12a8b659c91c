// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-instr
//!
//! The instruction list (component I): [`Instruction`] variants mirroring
//! the opcode table in §4.8, and [`Interpreter`], which executes an
//! [`InstructionList`] against an `archi_context::Registry`.

pub mod instruction;
pub mod interpreter;

pub use instruction::{Instruction, InstructionList, ParamsRef};
pub use interpreter::Interpreter;
