// SPDX-License-Identifier: GPL-3.0-or-later

//! The context interface (component G): a capability set every context
//! implements, modelled as a trait object rather than a v-table of raw
//! function pointers. A capability a context does not support is simply
//! an unoverridden default method returning [`Status::NOT_IMPLEMENTED`] —
//! the "null function pointer means unsupported" rule, reified.

use archi_core::params::ParameterList;
use archi_core::status::Status;
use archi_core::Pointer;

/// A named, optionally multi-indexed accessor on a context.
#[derive(Debug, Clone)]
pub struct Slot {
    /// The slot's name.
    pub name: String,
    /// Indices for a multi-valued slot; empty for a single-valued one.
    pub indices: Vec<usize>,
}

impl Slot {
    /// A single-valued (no-index) slot named `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Slot {
        Slot {
            name: name.into(),
            indices: Vec::new(),
        }
    }

    /// A multi-indexed slot.
    #[must_use]
    pub fn indexed(name: impl Into<String>, indices: Vec<usize>) -> Slot {
        Slot { name: name.into(), indices }
    }
}

/// The `(public, private)` values produced by a successful [`ContextInterface::init`].
#[derive(Debug, Clone, Default)]
pub struct InitResult {
    /// The context's public value, handed to `get`/`set`/`act` callers.
    pub public: Pointer,
    /// The context's private value, visible only to its own interface.
    pub private: Option<Pointer>,
}

/// The capability set a context implements.
///
/// Every method has a default that returns [`Status::NOT_IMPLEMENTED`],
/// except `finalize`, whose default is a no-op — mirroring "each field may
/// be null; a null field makes the corresponding operation fail with
/// `NOT_IMPLEMENTED`" for every capability except teardown, which must
/// always be safe to call.
pub trait ContextInterface: Send + Sync {
    /// Build a context instance from `params`. Any subset of the result's
    /// fields may be left at their defaults.
    ///
    /// # Errors
    /// Returns a negative [`Status`] on failure, per the specification's
    /// status taxonomy.
    fn init(&self, params: &ParameterList) -> Result<InitResult, Status>;

    /// Tear down a context built by [`ContextInterface::init`]. Called
    /// exactly once, iff `init` succeeded.
    fn finalize(&self, public: &Pointer, private: Option<&Pointer>) {
        let _ = (public, private);
    }

    /// Read a slot's value.
    ///
    /// # Errors
    /// [`Status::NOT_IMPLEMENTED`] if this context has no `get` capability.
    fn get(&self, public: &Pointer, private: Option<&Pointer>, slot: &Slot) -> Result<Pointer, Status> {
        let _ = (public, private, slot);
        Err(Status::NOT_IMPLEMENTED)
    }

    /// Write a slot's value. Returns the resulting status (which may be a
    /// positive, context-specific condition rather than a hard error).
    fn set(&self, public: &Pointer, private: Option<&Pointer>, slot: &Slot, value: Pointer) -> Status {
        let _ = (public, private, slot, value);
        Status::NOT_IMPLEMENTED
    }

    /// Invoke a named action with keyword parameters.
    fn act(
        &self,
        public: &Pointer,
        private: Option<&Pointer>,
        action: &str,
        indices: &[usize],
        params: &ParameterList,
    ) -> Status {
        let _ = (public, private, action, indices, params);
        Status::NOT_IMPLEMENTED
    }
}
