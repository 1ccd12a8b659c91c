// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end: a mapped input file's instructions build a registry
//! exactly as scenario 3 (`archi-instr/tests/registry_build.rs`) builds
//! one by hand.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use archi_context::interface::Slot;
use archi_context::Registry;
use archi_core::status::Status;
use archi_instr::Interpreter;
use archi_loader::header;
use archi_loader::InputFile;

struct ScratchFile(std::path::PathBuf);

impl ScratchFile {
    fn write(body: &[u8]) -> ScratchFile {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("archi-loader-itest-{}-{id}.input", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(header::MAGIC).unwrap();
        file.write_all(body).unwrap();
        ScratchFile(path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn loaded_instructions_build_a_registry_end_to_end() {
    let file = ScratchFile::write(
        br#"{
            "params": [{"name": "label", "value": "demo"}],
            "instructions": [
                {"op": "init_pointer", "key": "x", "value": 51966},
                {"op": "copy", "key": "y", "original_key": "x"},
                {"op": "init_array", "key": "z_array", "num_elements": 2, "flags": 0},
                {"op": "set_to_context_data", "key": "z_array", "slot": {"name": "items", "indices": [0]}, "source_key": "x"},
                {"op": "delete", "key": "y"}
            ]
        }"#,
    );

    let input = InputFile::open(&file.0).unwrap();
    assert_eq!(
        archi_context::scalar::pointer_as_str(input.params().get("label").unwrap()),
        Some("demo")
    );

    let registry = Registry::new();
    let interpreter = Interpreter::new(true);
    let status = interpreter.execute(&registry, input.instructions());
    assert_eq!(status, Status::OK);

    assert!(!registry.contains("y"));
    assert!(registry.contains("x"));
    assert!(registry.contains("z_array"));

    let z = registry.get("z_array").unwrap();
    let stored = z.get_slot(&Slot::indexed("items", vec![0])).unwrap();
    assert_eq!(stored.as_usize(), Some(51966));
}

#[test]
fn a_failing_instruction_tears_the_registry_down_and_reports_the_error() {
    let file = ScratchFile::write(
        br#"{
            "params": [],
            "instructions": [
                {"op": "init_pointer", "key": "x", "value": 1},
                {"op": "delete", "key": "does-not-exist"}
            ]
        }"#,
    );

    let input = InputFile::open(&file.0).unwrap();
    let registry = Registry::new();
    let interpreter = Interpreter::new(true);
    let status = interpreter.execute(&registry, input.instructions());

    assert_eq!(status, Status::KEY_NOT_FOUND);
    assert!(!registry.contains("x"));
}
