// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end scenario 3: building a registry by executing an
//! instruction list.

use archi_context::interface::Slot;
use archi_context::Registry;
use archi_core::pointer::{ElementLayout, PointerFlags};
use archi_core::refcount::RefCount;
use archi_core::status::Status;
use archi_core::Pointer;
use archi_instr::{Instruction, InstructionList, Interpreter, ParamsRef};

#[test]
fn scenario_3_registry_build_from_instructions() {
    let registry = Registry::new();
    let interpreter = Interpreter::new(true);

    let program: InstructionList = vec![
        Instruction::InitPointer {
            key: "x".to_string(),
            value: Pointer::data(
                0xCAFE as *mut u8,
                PointerFlags::empty(),
                ElementLayout { count: 1, size: 8, align: 8 },
                RefCount::null(),
            ),
        },
        Instruction::Copy { key: "y".to_string(), original_key: "x".to_string() },
        Instruction::InitArray { key: "z_array".to_string(), num_elements: 2, flags: 0 },
        Instruction::SetToContextData {
            key: "z_array".to_string(),
            slot: Slot::indexed("items", vec![0]),
            source_key: "x".to_string(),
        },
        Instruction::Delete { key: "y".to_string() },
    ];

    let status = interpreter.execute(&registry, &program);
    assert_eq!(status, Status::OK);

    assert!(registry.contains("x"));
    assert!(registry.contains("z_array"));
    assert!(!registry.contains("y"));

    let z_array = registry.get("z_array").unwrap();
    let stored = z_array.get_slot(&Slot::indexed("items", vec![0])).unwrap();
    assert_eq!(stored.as_data_ptr(), Some(0xCAFE as *mut u8));
}

#[test]
fn deleting_a_missing_key_aborts_under_strict_policy() {
    let registry = Registry::new();
    let interpreter = Interpreter::new(true);

    let program: InstructionList = vec![
        Instruction::InitPointer { key: "a".to_string(), value: Pointer::null() },
        Instruction::Delete { key: "does-not-exist".to_string() },
    ];

    let status = interpreter.execute(&registry, &program);
    assert_eq!(status, Status::KEY_NOT_FOUND);
    // Strict abort tears the registry down, including contexts created
    // earlier in the same program.
    assert!(!registry.contains("a"));
}

#[test]
fn lenient_policy_logs_and_continues_past_a_condition() {
    let registry = Registry::new();
    let interpreter = Interpreter::new(false);

    let program: InstructionList = vec![
        Instruction::Delete { key: "does-not-exist".to_string() },
        Instruction::InitPointer { key: "a".to_string(), value: Pointer::null() },
    ];

    let status = interpreter.execute(&registry, &program);
    assert_eq!(status, Status::OK);
    assert!(registry.contains("a"));
}

#[test]
fn both_sparams_and_dparams_key_is_a_misuse_error() {
    let registry = Registry::new();
    let interpreter = Interpreter::new(true);

    let program: InstructionList = vec![Instruction::InitParameters {
        key: "p".to_string(),
        params: ParamsRef {
            sparams: Some(archi_core::params::ParameterList::new()),
            dparams_key: Some("dynamic".to_string()),
        },
    }];

    let status = interpreter.execute(&registry, &program);
    assert_eq!(status, Status::MISUSE);
}
