// SPDX-License-Identifier: GPL-3.0-or-later

//! Carrying a context interface itself inside a [`Pointer`].
//!
//! The original lets any context's public value double as a context
//! *interface*: `archi_context_interface` just reads a context's public
//! `archi_pointer_t`, and `ARCHI_EXE_REGISTRY_INSTR_INIT`'s
//! `interface_key` names whichever context is acting as the vtable for a
//! new one. `ContextInterface` here is a trait object, not a raw
//! function-pointer struct, so reproducing that requires boxing the
//! `Arc<dyn ContextInterface>` (a fat pointer) behind a thin one the
//! [`Pointer`] payload can actually hold.

use std::sync::Arc;

use archi_core::pointer::{ElementLayout, PointerFlags};
use archi_core::refcount::RefCount;
use archi_core::Pointer;

use crate::interface::ContextInterface;

/// Wrap `interface` as a function-payload [`Pointer`]; the returned
/// pointer's `ref_count` reclaims the boxed `Arc` when dropped to zero.
#[must_use]
pub fn pointer_from_interface(interface: Arc<dyn ContextInterface>) -> Pointer {
    let boxed = Box::new(interface);
    let raw = Box::into_raw(boxed);
    let ref_count = RefCount::alloc(move || {
        // SAFETY: `raw` was produced by `Box::into_raw` above and is
        // reclaimed exactly once, by this destructor.
        drop(unsafe { Box::from_raw(raw) });
    });
    Pointer::function(raw.cast_const().cast::<()>(), ElementLayout::default(), ref_count)
}

/// Read back an `Arc<dyn ContextInterface>` from a [`Pointer`] built by
/// [`pointer_from_interface`]. Returns `None` for any pointer that isn't
/// a function payload (e.g. a null or data pointer).
#[must_use]
pub fn pointer_as_interface(ptr: &Pointer) -> Option<Arc<dyn ContextInterface>> {
    if !ptr.flags().contains(PointerFlags::FUNCTION) {
        return None;
    }
    let raw = ptr.as_function_ptr()?.cast::<Arc<dyn ContextInterface>>();
    if raw.is_null() {
        return None;
    }
    // SAFETY: by convention, a function pointer with these flags was
    // built by `pointer_from_interface` above, whose `ref_count` keeps
    // the boxed `Arc` alive for at least as long as this `Pointer` is.
    let interface_ref = unsafe { &*raw };
    Some(interface_ref.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archi_core::params::ParameterList;
    use archi_core::status::Status;
    use crate::interface::InitResult;

    struct Dummy;
    impl ContextInterface for Dummy {
        fn init(&self, _params: &ParameterList) -> Result<InitResult, Status> {
            Ok(InitResult::default())
        }
    }

    #[test]
    fn round_trips_through_pointer() {
        let interface: Arc<dyn ContextInterface> = Arc::new(Dummy);
        let ptr = pointer_from_interface(interface);
        let back = pointer_as_interface(&ptr).expect("interface pointer");
        assert!(back.init(&ParameterList::new()).is_ok());
    }

    #[test]
    fn non_interface_pointer_is_rejected() {
        assert!(pointer_as_interface(&Pointer::null()).is_none());
    }
}
