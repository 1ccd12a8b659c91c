// SPDX-License-Identifier: GPL-3.0-or-later

//! The context registry (component H): a `name -> Context` map that is
//! itself a context, per §4.7. `init_*` and `copy` fail with
//! [`Status::KEY_EXISTS`] if the key is taken; every other operation
//! referencing a key fails with [`Status::KEY_NOT_FOUND`] if it's absent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use archi_core::params::ParameterList;
use archi_core::status::Status;
use archi_core::Pointer;
use tracing::trace;

use crate::builtin::{MemoryInterfaceContext, MemoryMappingInterfaceContext};
use crate::context::Context;
use crate::interface::{ContextInterface, InitResult, Slot};
use crate::interface_pointer::pointer_as_interface;

struct Entries {
    order: Vec<String>,
    map: HashMap<String, Context>,
}

impl Entries {
    fn insert_new(&mut self, key: &str, context: Context) {
        self.order.push(key.to_string());
        self.map.insert(key.to_string(), context);
    }
}

/// The context registry: always seeded with two singleton built-ins,
/// `memory` and `memory_mapping` (§4.7), on top of whatever `init_*`
/// instructions the interpreter executes.
pub struct Registry {
    entries: Mutex<Entries>,
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl Registry {
    /// A fresh registry, pre-populated with the `memory` and
    /// `memory_mapping` singleton built-ins.
    #[must_use]
    pub fn new() -> Registry {
        let registry = Registry {
            entries: Mutex::new(Entries { order: Vec::new(), map: HashMap::new() }),
        };
        let memory = Context::initialize(Arc::new(MemoryInterfaceContext), &ParameterList::new())
            .expect("the memory built-in's init never fails");
        let memory_mapping = Context::initialize(Arc::new(MemoryMappingInterfaceContext), &ParameterList::new())
            .expect("the memory_mapping built-in's init never fails");
        let mut entries = registry.entries.lock().unwrap();
        entries.insert_new("memory", memory);
        entries.insert_new("memory_mapping", memory_mapping);
        drop(entries);
        registry
    }

    /// Number of entries currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().map.len()
    }

    /// True if the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().map.is_empty()
    }

    /// True if `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().map.contains_key(key)
    }

    /// Keys currently registered, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().order.clone()
    }

    /// Look up a context by key.
    ///
    /// # Errors
    /// [`Status::KEY_NOT_FOUND`] if `key` is not registered.
    pub fn get(&self, key: &str) -> Result<Context, Status> {
        self.entries.lock().unwrap().map.get(key).cloned().ok_or(Status::KEY_NOT_FOUND)
    }

    /// `DELETE key`: finalize and remove the context, per §4.8.
    pub fn delete(&self, key: &str) -> Status {
        let mut entries = self.entries.lock().unwrap();
        match entries.map.remove(key) {
            Some(context) => {
                entries.order.retain(|k| k != key);
                drop(entries);
                context.finalize();
                trace!(key, "deleted context");
                Status::OK
            }
            None => Status::KEY_NOT_FOUND,
        }
    }

    /// `COPY key FROM original_key`: both keys alias the same context
    /// after this, with the ref count incremented to account for it.
    pub fn copy(&self, key: &str, original_key: &str) -> Status {
        let mut entries = self.entries.lock().unwrap();
        if entries.map.contains_key(key) {
            return Status::KEY_EXISTS;
        }
        let Some(context) = entries.map.get(original_key).cloned() else {
            return Status::KEY_NOT_FOUND;
        };
        context.ref_count().increment();
        entries.insert_new(key, context);
        Status::OK
    }

    fn init_with_interface(&self, key: &str, interface: Arc<dyn ContextInterface>, params: &ParameterList) -> Status {
        {
            let entries = self.entries.lock().unwrap();
            if entries.map.contains_key(key) {
                return Status::KEY_EXISTS;
            }
        }
        match Context::initialize(interface, params) {
            Ok(context) => {
                self.entries.lock().unwrap().insert_new(key, context);
                Status::OK
            }
            Err(status) => status,
        }
    }

    /// `INIT_PARAMETERS key [dparams|sparams]`.
    pub fn init_parameters(&self, key: &str, params: &ParameterList) -> Status {
        self.init_with_interface(key, Arc::new(crate::builtin::ParametersInterface), params)
    }

    /// `INIT_POINTER key value`.
    pub fn init_pointer(&self, key: &str, value: Pointer) -> Status {
        let mut params = ParameterList::new();
        params.push("value", value);
        self.init_with_interface(key, Arc::new(crate::builtin::PointerInterface), &params)
    }

    /// `INIT_ARRAY key num_elements flags`.
    pub fn init_array(&self, key: &str, num_elements: usize, flags: u32) -> Status {
        let mut params = ParameterList::new();
        params.push("num_elements", Pointer::from_usize(num_elements));
        params.push("flags", Pointer::from_usize(usize::from(flags)));
        self.init_with_interface(key, Arc::new(crate::builtin::ArrayInterface), &params)
    }

    /// `INIT_FROM_CONTEXT key interface_origin_key [dparams|sparams]`:
    /// reuses `interface_origin_key`'s own interface as the new
    /// context's vtable.
    pub fn init_from_context(&self, key: &str, interface_origin_key: &str, params: &ParameterList) -> Status {
        let interface = match self.get(interface_origin_key) {
            Ok(context) => context.interface(),
            Err(status) => return status,
        };
        self.init_with_interface(key, interface, params)
    }

    /// `INIT_FROM_SLOT key interface_origin_key interface_origin_slot
    /// [dparams|sparams]`: reads the interface to use from a slot of
    /// `interface_origin_key`, rather than from the context itself.
    pub fn init_from_slot(&self, key: &str, interface_origin_key: &str, interface_origin_slot: &Slot, params: &ParameterList) -> Status {
        let origin = match self.get(interface_origin_key) {
            Ok(context) => context,
            Err(status) => return status,
        };
        let slot_value = match origin.get_slot(interface_origin_slot) {
            Ok(value) => value,
            Err(status) => return status,
        };
        let Some(interface) = pointer_as_interface(&slot_value) else {
            return Status::VALUE;
        };
        self.init_with_interface(key, interface, params)
    }

    /// `SET_TO_VALUE key slot value`.
    pub fn set_to_value(&self, key: &str, slot: &Slot, value: Pointer) -> Status {
        match self.get(key) {
            Ok(context) => context.set_slot(slot, value),
            Err(status) => status,
        }
    }

    /// `SET_TO_CONTEXT_DATA key slot source_key`: sets `slot` to
    /// `source_key`'s public value.
    pub fn set_to_context_data(&self, key: &str, slot: &Slot, source_key: &str) -> Status {
        let source = match self.get(source_key) {
            Ok(context) => context,
            Err(status) => return status,
        };
        match self.get(key) {
            Ok(context) => context.set_slot(slot, source.public().clone()),
            Err(status) => status,
        }
    }

    /// `SET_TO_CONTEXT_SLOT key slot source_key source_slot`.
    pub fn set_to_context_slot(&self, key: &str, slot: &Slot, source_key: &str, source_slot: &Slot) -> Status {
        let source = match self.get(source_key) {
            Ok(context) => context,
            Err(status) => return status,
        };
        match self.get(key) {
            Ok(target) => Context::copy_slot(&target, slot, &source, source_slot),
            Err(status) => status,
        }
    }

    /// `ACT key action [dparams|sparams]`.
    pub fn act(&self, key: &str, action: &str, indices: &[usize], params: &ParameterList) -> Status {
        match self.get(key) {
            Ok(context) => context.act(action, indices, params),
            Err(status) => status,
        }
    }

    /// Finalize every remaining context in reverse insertion order, per
    /// the abort/shutdown teardown rule in §4.8.
    pub fn teardown_reverse(&self) {
        let keys: Vec<String> = {
            let entries = self.entries.lock().unwrap();
            entries.order.iter().rev().cloned().collect()
        };
        for key in keys {
            let removed = self.entries.lock().unwrap().map.remove(&key);
            if let Some(context) = removed {
                context.finalize();
            }
        }
        self.entries.lock().unwrap().order.clear();
    }
}

/// The registry as a context itself (self-hosting, per §3/§4.7):
/// `get(name)` exposes a stored context's public value, `set` is always
/// [`Status::NOT_IMPLEMENTED`], and `act` dispatches the mutators above
/// by action name, for callers that only hold the registry generically
/// as a `dyn ContextInterface` (e.g. a nested registry embedded as
/// another registry's context). Index-addressed slots in this generic
/// surface support at most one index, matching every built-in context
/// that currently needs one.
impl ContextInterface for Registry {
    fn init(&self, _params: &ParameterList) -> Result<InitResult, Status> {
        Err(Status::NOT_IMPLEMENTED)
    }

    fn get(&self, _public: &Pointer, _private: Option<&Pointer>, slot: &Slot) -> Result<Pointer, Status> {
        self.get(&slot.name).map(|context| context.public().clone())
    }

    fn act(&self, _public: &Pointer, _private: Option<&Pointer>, action: &str, indices: &[usize], params: &ParameterList) -> Status {
        let key = match params.get("key") {
            Some(pointer) => match crate::scalar::pointer_as_str(pointer) {
                Some(key) => key.to_string(),
                None => return Status::KEY,
            },
            None => return Status::KEY,
        };
        match action {
            "delete" => self.delete(&key),
            "copy" => match params.get("original_key").and_then(crate::scalar::pointer_as_str) {
                Some(original) => self.copy(&key, original),
                None => Status::KEY,
            },
            "init_parameters" => self.init_parameters(&key, params),
            "init_pointer" => self.init_pointer(&key, params.get("value").cloned().unwrap_or_default()),
            "init_array" => {
                let num_elements = params.get("num_elements").and_then(Pointer::as_usize).unwrap_or(0);
                let flags = u32::try_from(params.get("flags").and_then(Pointer::as_usize).unwrap_or(0)).unwrap_or(u32::MAX);
                self.init_array(&key, num_elements, flags)
            }
            "init_from_context" => match params.get("interface_origin_key").and_then(crate::scalar::pointer_as_str) {
                Some(origin) => self.init_from_context(&key, origin, params),
                None => Status::KEY,
            },
            "set_to_value" => self.set_to_value(&key, &Slot::indexed(slot_name(params), indices.to_vec()), params.get("value").cloned().unwrap_or_default()),
            "set_to_context_data" => match params.get("source_key").and_then(crate::scalar::pointer_as_str) {
                Some(source) => self.set_to_context_data(&key, &Slot::indexed(slot_name(params), indices.to_vec()), source),
                None => Status::KEY,
            },
            "set_to_context_slot" => {
                let Some(source_key) = params.get("source_key").and_then(crate::scalar::pointer_as_str) else {
                    return Status::KEY;
                };
                let source_slot_name = params.get("source_slot").and_then(crate::scalar::pointer_as_str).unwrap_or_default();
                self.set_to_context_slot(&key, &Slot::indexed(slot_name(params), indices.to_vec()), source_key, &Slot::named(source_slot_name))
            }
            "act" => {
                let inner_action = params.get("action").and_then(crate::scalar::pointer_as_str).unwrap_or_default();
                self.act(&key, inner_action, indices, params)
            }
            _ => Status::NOT_IMPLEMENTED,
        }
    }
}

fn slot_name(params: &ParameterList) -> String {
    params
        .get("slot")
        .and_then(crate::scalar::pointer_as_str)
        .unwrap_or_default()
        .to_string()
}
