// SPDX-License-Identifier: GPL-3.0-or-later

//! The built-in contexts that are always present in a [`crate::Registry`]:
//! `parameters`, `pointer`, `array`, `memory` and `memory_mapping`, per
//! §4.7 of the specification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use archi_core::params::ParameterList;
use archi_core::pointer::{ElementLayout, PointerFlags};
use archi_core::refcount::RefCount;
use archi_core::status::Status;
use archi_core::Pointer;
use archi_memory::{HeapMemory, MemoryInterface as MemoryBackend, MemoryObject, NullMapMemory};

use crate::boxed::{boxed_ref, pointer_from_boxed};
use crate::interface::{ContextInterface, InitResult, Slot};

/// `parameters`: builds a parameter list from `init` params; its slots
/// are the list's nodes, addressed by name.
#[derive(Debug, Default)]
pub struct ParametersInterface;

impl ContextInterface for ParametersInterface {
    fn init(&self, params: &ParameterList) -> Result<InitResult, Status> {
        Ok(InitResult {
            public: Pointer::null(),
            private: Some(pointer_from_boxed(params.clone())),
        })
    }

    fn get(&self, _public: &Pointer, private: Option<&Pointer>, slot: &Slot) -> Result<Pointer, Status> {
        let list = private
            .and_then(boxed_ref::<ParameterList>)
            .ok_or(Status::MISUSE)?;
        list.get(&slot.name).cloned().ok_or(Status::KEY)
    }
}

/// `pointer`: wraps a single raw [`Pointer`] supplied via the `"value"`
/// init parameter (or the whole structure under `"params"`, per the
/// override convention).
#[derive(Debug, Default)]
pub struct PointerInterface;

impl ContextInterface for PointerInterface {
    fn init(&self, params: &ParameterList) -> Result<InitResult, Status> {
        let value = params.get("value").cloned().unwrap_or_default();
        Ok(InitResult { public: value, private: None })
    }

    fn get(&self, public: &Pointer, _private: Option<&Pointer>, _slot: &Slot) -> Result<Pointer, Status> {
        Ok(public.clone())
    }
}

struct ArrayState {
    elements: Mutex<Vec<Pointer>>,
}

/// `array`: owns a fixed-size array of [`Pointer`]s, initialised to null,
/// addressed by a single index.
#[derive(Debug, Default)]
pub struct ArrayInterface;

impl ContextInterface for ArrayInterface {
    fn init(&self, params: &ParameterList) -> Result<InitResult, Status> {
        let num_elements = params.get("num_elements").and_then(Pointer::as_usize).ok_or(Status::KEY)?;
        let elements = vec![Pointer::null(); num_elements];
        Ok(InitResult {
            public: Pointer::null(),
            private: Some(pointer_from_boxed(ArrayState { elements: Mutex::new(elements) })),
        })
    }

    fn get(&self, _public: &Pointer, private: Option<&Pointer>, slot: &Slot) -> Result<Pointer, Status> {
        let state = private.and_then(boxed_ref::<ArrayState>).ok_or(Status::MISUSE)?;
        let index = *slot.indices.first().ok_or(Status::MISUSE)?;
        state.elements.lock().unwrap().get(index).cloned().ok_or(Status::VALUE)
    }

    fn set(&self, _public: &Pointer, private: Option<&Pointer>, slot: &Slot, value: Pointer) -> Status {
        let Some(state) = private.and_then(boxed_ref::<ArrayState>) else {
            return Status::MISUSE;
        };
        let Some(&index) = slot.indices.first() else {
            return Status::MISUSE;
        };
        let mut elements = state.elements.lock().unwrap();
        match elements.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Status::OK
            }
            None => Status::VALUE,
        }
    }
}

/// Shared bookkeeping between `memory` and `memory_mapping`: a back-end
/// plus the set of objects it has allocated, keyed by the address the
/// back-end itself assigned.
struct AllocatorState {
    backend: Arc<dyn MemoryBackend>,
    objects: Mutex<HashMap<usize, MemoryObject>>,
}

impl AllocatorState {
    fn alloc(&self, params: &ParameterList) -> Status {
        let Some(num_bytes) = params.get("num_bytes").and_then(Pointer::as_usize) else {
            return Status::KEY;
        };
        let align = params.get("align").and_then(Pointer::as_usize).unwrap_or(0);
        match self.backend.alloc(num_bytes, align, &Pointer::null()) {
            Ok(object) => {
                self.objects.lock().unwrap().insert(object.addr(), object);
                Status::OK
            }
            Err(status) => status,
        }
    }

    fn free(&self, params: &ParameterList) -> Status {
        let Some(address) = params.get("address").and_then(Pointer::as_usize) else {
            return Status::KEY;
        };
        match self.objects.lock().unwrap().remove(&address) {
            Some(object) => {
                self.backend.free(&object);
                Status::OK
            }
            None => Status::KEY_NOT_FOUND,
        }
    }

    fn object_descriptor(&self, address: usize) -> Option<Pointer> {
        let objects = self.objects.lock().unwrap();
        let object = objects.get(&address)?;
        Some(Pointer::data(
            address as *mut u8,
            PointerFlags::WRITABLE,
            ElementLayout { count: 1, size: object.num_bytes(), align: object.align() },
            RefCount::null(),
        ))
    }
}

/// `memory`: wraps a [`MemoryBackend`] exposing only `alloc`/`free`
/// (no mapping step), per §4.3's "back-end may have no real mapping
/// step" case.
pub struct MemoryInterfaceContext;

impl ContextInterface for MemoryInterfaceContext {
    fn init(&self, _params: &ParameterList) -> Result<InitResult, Status> {
        let state = AllocatorState {
            backend: Arc::new(HeapMemory),
            objects: Mutex::new(HashMap::new()),
        };
        Ok(InitResult {
            public: Pointer::null(),
            private: Some(pointer_from_boxed(state)),
        })
    }

    fn get(&self, _public: &Pointer, private: Option<&Pointer>, slot: &Slot) -> Result<Pointer, Status> {
        let state = private.and_then(boxed_ref::<AllocatorState>).ok_or(Status::MISUSE)?;
        if slot.name != "object" {
            return Err(Status::KEY);
        }
        let address = *slot.indices.first().ok_or(Status::MISUSE)?;
        state.object_descriptor(address).ok_or(Status::VALUE)
    }

    fn act(&self, _public: &Pointer, private: Option<&Pointer>, action: &str, _indices: &[usize], params: &ParameterList) -> Status {
        let Some(state) = private.and_then(boxed_ref::<AllocatorState>) else {
            return Status::MISUSE;
        };
        match action {
            "alloc" => state.alloc(params),
            "free" => state.free(params),
            _ => Status::NOT_IMPLEMENTED,
        }
    }
}

/// `memory_mapping`: like `memory`, but backed by [`NullMapMemory`] so
/// `map`/`unmap` are also supported (identity mapping, per §4.3).
pub struct MemoryMappingInterfaceContext;

impl ContextInterface for MemoryMappingInterfaceContext {
    fn init(&self, _params: &ParameterList) -> Result<InitResult, Status> {
        let state = AllocatorState {
            backend: Arc::new(NullMapMemory::new(Arc::new(HeapMemory))),
            objects: Mutex::new(HashMap::new()),
        };
        Ok(InitResult {
            public: Pointer::null(),
            private: Some(pointer_from_boxed(state)),
        })
    }

    fn get(&self, _public: &Pointer, private: Option<&Pointer>, slot: &Slot) -> Result<Pointer, Status> {
        let state = private.and_then(boxed_ref::<AllocatorState>).ok_or(Status::MISUSE)?;
        if slot.name != "object" {
            return Err(Status::KEY);
        }
        let address = *slot.indices.first().ok_or(Status::MISUSE)?;
        state.object_descriptor(address).ok_or(Status::VALUE)
    }

    fn act(&self, _public: &Pointer, private: Option<&Pointer>, action: &str, _indices: &[usize], params: &ParameterList) -> Status {
        let Some(state) = private.and_then(boxed_ref::<AllocatorState>) else {
            return Status::MISUSE;
        };
        match action {
            "alloc" => state.alloc(params),
            "free" => state.free(params),
            "map" => do_map(state, params),
            "unmap" => do_unmap(state, params),
            _ => Status::NOT_IMPLEMENTED,
        }
    }
}

fn do_map(state: &AllocatorState, params: &ParameterList) -> Status {
    let (Some(address), Some(offset), Some(num_bytes)) = (
        params.get("address").and_then(Pointer::as_usize),
        params.get("offset").and_then(Pointer::as_usize),
        params.get("num_bytes").and_then(Pointer::as_usize),
    ) else {
        return Status::KEY;
    };
    let writable = params.get("writable").and_then(Pointer::as_usize).unwrap_or(0) != 0;
    let objects = state.objects.lock().unwrap();
    let Some(object) = objects.get(&address) else {
        return Status::KEY_NOT_FOUND;
    };
    match state.backend.map(object, offset, num_bytes, writable, &Pointer::null()) {
        Ok(_host_ptr) => Status::OK,
        Err(status) => status,
    }
}

fn do_unmap(state: &AllocatorState, params: &ParameterList) -> Status {
    let (Some(address), Some(host_addr)) = (
        params.get("address").and_then(Pointer::as_usize),
        params.get("host_address").and_then(Pointer::as_usize),
    ) else {
        return Status::KEY;
    };
    let objects = state.objects.lock().unwrap();
    let Some(object) = objects.get(&address) else {
        return Status::KEY_NOT_FOUND;
    };
    state.backend.unmap(object, host_addr as *mut u8);
    Status::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_context_exposes_slots_by_name() {
        let interface = ParametersInterface;
        let mut params = ParameterList::new();
        params.push("n", Pointer::from_usize(3));
        let result = interface.init(&params).unwrap();
        let value = interface.get(&result.public, result.private.as_ref(), &Slot::named("n")).unwrap();
        assert_eq!(value.as_usize(), Some(3));
    }

    #[test]
    fn pointer_context_wraps_value_parameter() {
        let interface = PointerInterface;
        let mut params = ParameterList::new();
        params.push("value", Pointer::from_usize(7));
        let result = interface.init(&params).unwrap();
        assert_eq!(result.public.as_usize(), Some(7));
    }

    #[test]
    fn array_context_reads_and_writes_indexed_slots() {
        let interface = ArrayInterface;
        let mut params = ParameterList::new();
        params.push("num_elements", Pointer::from_usize(2));
        let result = interface.init(&params).unwrap();

        let initial = interface.get(&result.public, result.private.as_ref(), &Slot::indexed("items", vec![0])).unwrap();
        assert!(initial.is_null());

        let status = interface.set(
            &result.public,
            result.private.as_ref(),
            &Slot::indexed("items", vec![1]),
            Pointer::from_usize(99),
        );
        assert_eq!(status, Status::OK);

        let value = interface.get(&result.public, result.private.as_ref(), &Slot::indexed("items", vec![1])).unwrap();
        assert_eq!(value.as_usize(), Some(99));
    }

    #[test]
    fn array_context_rejects_out_of_bounds_index() {
        let interface = ArrayInterface;
        let mut params = ParameterList::new();
        params.push("num_elements", Pointer::from_usize(1));
        let result = interface.init(&params).unwrap();
        let err = interface
            .get(&result.public, result.private.as_ref(), &Slot::indexed("items", vec![5]))
            .unwrap_err();
        assert_eq!(err, Status::VALUE);
    }

    #[test]
    fn memory_context_allocates_and_frees() {
        let interface = MemoryInterfaceContext;
        let result = interface.init(&ParameterList::new()).unwrap();

        let mut alloc_params = ParameterList::new();
        alloc_params.push("num_bytes", Pointer::from_usize(64));
        alloc_params.push("align", Pointer::from_usize(8));
        let status = interface.act(&result.public, result.private.as_ref(), "alloc", &[], &alloc_params);
        assert_eq!(status, Status::OK);

        let objects = result.private.as_ref().and_then(boxed_ref::<AllocatorState>).unwrap();
        let address = *objects.objects.lock().unwrap().keys().next().unwrap();

        let descriptor = interface
            .get(&result.public, result.private.as_ref(), &Slot::indexed("object", vec![address]))
            .unwrap();
        assert_eq!(descriptor.element().size, 64);

        let mut free_params = ParameterList::new();
        free_params.push("address", Pointer::from_usize(address));
        let status = interface.act(&result.public, result.private.as_ref(), "free", &[], &free_params);
        assert_eq!(status, Status::OK);
    }

    #[test]
    fn memory_mapping_context_maps_as_identity() {
        let interface = MemoryMappingInterfaceContext;
        let result = interface.init(&ParameterList::new()).unwrap();

        let mut alloc_params = ParameterList::new();
        alloc_params.push("num_bytes", Pointer::from_usize(32));
        alloc_params.push("align", Pointer::from_usize(0));
        interface.act(&result.public, result.private.as_ref(), "alloc", &[], &alloc_params);

        let state = result.private.as_ref().and_then(boxed_ref::<AllocatorState>).unwrap();
        let address = *state.objects.lock().unwrap().keys().next().unwrap();

        let mut map_params = ParameterList::new();
        map_params.push("address", Pointer::from_usize(address));
        map_params.push("offset", Pointer::from_usize(0));
        map_params.push("num_bytes", Pointer::from_usize(32));
        let status = interface.act(&result.public, result.private.as_ref(), "map", &[], &map_params);
        assert_eq!(status, Status::OK);
    }
}
