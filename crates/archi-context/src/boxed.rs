// SPDX-License-Identifier: GPL-3.0-or-later

//! Boxing an arbitrary `T` behind a [`Pointer`], for built-in contexts
//! that need to stash typed state in their `private` value. Generalizes
//! the string-specific trick in [`crate::scalar`] to any sized `T`; each
//! built-in only ever reads back a pointer it built itself, so there is
//! no need for runtime type tagging beyond the `ElementLayout` sanity
//! check every reader here performs.

use archi_core::pointer::{ElementLayout, PointerFlags};
use archi_core::refcount::RefCount;
use archi_core::Pointer;

/// Box `value` and wrap it as a data [`Pointer`] whose `ref_count`
/// reclaims the box when dropped to zero.
#[must_use]
pub fn pointer_from_boxed<T: Send + Sync + 'static>(value: T) -> Pointer {
    let raw = Box::into_raw(Box::new(value));
    let ref_count = RefCount::alloc(move || {
        // SAFETY: `raw` was produced by `Box::into_raw` above and is
        // reclaimed exactly once, by this destructor.
        drop(unsafe { Box::from_raw(raw) });
    });
    Pointer::data(raw.cast::<u8>(), PointerFlags::empty(), ElementLayout::of::<T>(), ref_count)
}

/// Read back a `&T` from a [`Pointer`] built by [`pointer_from_boxed`].
/// Returns `None` if the pointer's element layout doesn't match `T`
/// (including the null pointer, whose layout is always zeroed).
#[must_use]
pub fn boxed_ref<T: 'static>(ptr: &Pointer) -> Option<&T> {
    if ptr.element() != ElementLayout::of::<T>() {
        return None;
    }
    let data = ptr.as_data_ptr()?;
    if data.is_null() {
        return None;
    }
    // SAFETY: by convention, a pointer with this element layout was built
    // by `pointer_from_boxed::<T>` above, whose `ref_count` keeps the
    // allocation alive for at least as long as this `Pointer` is held.
    Some(unsafe { &*data.cast::<T>() })
}
