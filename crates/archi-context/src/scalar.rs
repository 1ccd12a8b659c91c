// SPDX-License-Identifier: GPL-3.0-or-later

//! Helpers for carrying owned strings inside a [`Pointer`].
//!
//! The specification's `Pointer` is untyped at rest; a context that wants
//! to hand a string out as a slot value (or read one out of a parameter
//! list entry that is itself a string rather than a nested parameter
//! list) needs a convention for it. This crate's built-in contexts box
//! the string and tie its lifetime to a [`RefCount`] whose destructor
//! reclaims the box, the same pattern every other owned payload in this
//! workspace uses.

use archi_core::pointer::{ElementLayout, Payload, PointerFlags};
use archi_core::refcount::RefCount;
use archi_core::Pointer;

/// Wrap `value` as a `Pointer` whose payload is a boxed string; the
/// returned pointer's `ref_count` reclaims the box when it is dropped to
/// zero.
#[must_use]
pub fn pointer_from_string(value: String) -> Pointer {
    let len = value.len();
    let boxed: Box<str> = value.into_boxed_str();
    let raw = Box::into_raw(boxed);
    let data_ptr = raw.cast::<u8>();
    let ref_count = RefCount::alloc(move || {
        // SAFETY: `raw` was produced by `Box::into_raw` above and is
        // reclaimed exactly once, by this destructor.
        drop(unsafe { Box::from_raw(raw) });
    });
    Pointer::data(
        data_ptr,
        PointerFlags::empty(),
        ElementLayout { count: len, size: 1, align: 1 },
        ref_count,
    )
}

/// Read a `Pointer` produced by [`pointer_from_string`] back as `&str`.
///
/// Returns `None` for a null pointer, a function-payload pointer, or one
/// whose element layout doesn't look like a byte string.
#[must_use]
pub fn pointer_as_str(ptr: &Pointer) -> Option<&str> {
    if ptr.element().size != 1 || ptr.element().align > 1 {
        return None;
    }
    let Payload::Data(data) = ptr.payload() else { return None };
    if data.is_null() {
        return None;
    }
    // SAFETY: by convention, a pointer with this element layout was built
    // by `pointer_from_string` above, whose `ref_count` keeps the
    // underlying allocation alive for at least as long as this `Pointer`
    // value is held.
    let bytes = unsafe { std::slice::from_raw_parts(data, ptr.element().count) };
    std::str::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_pointer() {
        let ptr = pointer_from_string("hello".to_string());
        assert_eq!(pointer_as_str(&ptr), Some("hello"));
    }

    #[test]
    fn null_pointer_is_not_a_string() {
        assert_eq!(pointer_as_str(&Pointer::null()), None);
    }
}
