// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end scenario 6: CLI overrides beat the input file's `params`,
//! and a sibling field entry beats a `"params"`-named struct value.

use archi_context::builtin::ParametersInterface;
use archi_context::interface::Slot;
use archi_context::ContextInterface;
use archi_core::params::ParameterList;
use archi_core::status::Status;
use archi_core::Pointer;

#[test]
fn cli_override_wins_over_file_params() {
    let file_params = ParameterList::from_entries([("n".to_string(), Pointer::from_usize(3))]);
    let cli_overrides = ParameterList::from_entries([("n".to_string(), Pointer::from_usize(7))]);

    let merged = file_params.override_with(&cli_overrides);

    let interface = ParametersInterface;
    let result = interface.init(&merged).unwrap();
    let n = interface
        .get(&result.public, result.private.as_ref(), &Slot::named("n"))
        .unwrap();
    assert_eq!(n.as_usize(), Some(7));
}

#[test]
fn sibling_field_entry_overrides_embedded_params_struct() {
    let embedded_struct = Pointer::from_usize(9);
    let list = ParameterList::from_entries([
        ("params".to_string(), embedded_struct),
        ("n".to_string(), Pointer::from_usize(7)),
    ]);

    let n = list.resolve_field("n", |p| p.as_usize(), || None);
    assert_eq!(n, Some(7));
}

#[test]
fn missing_slot_reports_key_not_value() {
    let interface = ParametersInterface;
    let result = interface.init(&ParameterList::new()).unwrap();
    let err = interface
        .get(&result.public, result.private.as_ref(), &Slot::named("missing"))
        .unwrap_err();
    assert_eq!(err, Status::KEY);
}
