// SPDX-License-Identifier: GPL-3.0-or-later

//! The [`Context`] wrapper (component G): owns a context's interface, its
//! `public`/`private` values, and the [`RefCount`] whose destructor runs
//! `finalize` followed by releasing the interface reference.

use std::sync::Arc;

use archi_core::params::ParameterList;
use archi_core::refcount::RefCount;
use archi_core::status::Status;
use archi_core::Pointer;

use crate::interface::{ContextInterface, Slot};

/// A running context instance: its interface plus the values `init`
/// produced.
///
/// `Context` is `Clone`: cloning copies the handle (interface `Arc`,
/// `public`/`private` `Pointer`s, and the `RefCount` handle) without
/// touching the logical reference count — exactly as cloning a `Pointer`
/// never does, per the specification. Callers that need to extend a
/// context's lifetime call [`Context::finalize`]'s counterpart,
/// `ref_count().increment()`, explicitly.
#[derive(Clone)]
pub struct Context {
    interface: Arc<dyn ContextInterface>,
    public: Pointer,
    private: Option<Pointer>,
    ref_count: RefCount,
}

impl Context {
    /// Build a context by calling `interface.init(params)`, then wiring
    /// up a `RefCount` whose destructor calls `interface.finalize` and
    /// drops the interface reference.
    ///
    /// # Errors
    /// Propagates whatever negative [`Status`] `init` returned.
    pub fn initialize(interface: Arc<dyn ContextInterface>, params: &ParameterList) -> Result<Context, Status> {
        let result = interface.init(params)?;

        let destructor_interface = interface.clone();
        let destructor_public = result.public.clone();
        let destructor_private = result.private.clone();
        let ref_count = RefCount::alloc(move || {
            destructor_interface.finalize(&destructor_public, destructor_private.as_ref());
        });

        Ok(Context {
            interface,
            public: result.public,
            private: result.private,
            ref_count,
        })
    }

    /// The context's public value, as handed to callers of `get`/`set`/`act`.
    #[must_use]
    pub const fn public(&self) -> &Pointer {
        &self.public
    }

    /// The context's private data, visible only to its own interface.
    #[must_use]
    pub const fn data(&self) -> Option<&Pointer> {
        self.private.as_ref()
    }

    /// The interface this context was built from, so that another context
    /// can be initialized reusing the same interface — the Rust shape of
    /// `INIT_FROM_CONTEXT`'s `interface_origin_key` (§4.8): an existing
    /// context's interface, not its value, becomes the new one's vtable.
    #[must_use]
    pub fn interface(&self) -> Arc<dyn ContextInterface> {
        self.interface.clone()
    }

    /// The reference-count handle guarding this context's lifetime.
    #[must_use]
    pub const fn ref_count(&self) -> &RefCount {
        &self.ref_count
    }

    /// Release this handle to the context, running `finalize` if this was
    /// the last reference.
    pub fn finalize(&self) {
        self.ref_count.decrement();
    }

    /// Read a slot.
    ///
    /// # Errors
    /// [`Status::NOT_IMPLEMENTED`] if the interface has no `get` capability.
    pub fn get_slot(&self, slot: &Slot) -> Result<Pointer, Status> {
        self.interface.get(&self.public, self.private.as_ref(), slot)
    }

    /// Write a slot.
    pub fn set_slot(&self, slot: &Slot, value: Pointer) -> Status {
        self.interface.set(&self.public, self.private.as_ref(), slot, value)
    }

    /// `dst.set_slot(dst_slot, src.get_slot(src_slot))`, per §4.6.
    pub fn copy_slot(dst: &Context, dst_slot: &Slot, src: &Context, src_slot: &Slot) -> Status {
        match src.get_slot(src_slot) {
            Ok(value) => dst.set_slot(dst_slot, value),
            Err(status) => status,
        }
    }

    /// Invoke a named action.
    pub fn act(&self, action: &str, indices: &[usize], params: &ParameterList) -> Status {
        self.interface.act(&self.public, self.private.as_ref(), action, indices, params)
    }
}
