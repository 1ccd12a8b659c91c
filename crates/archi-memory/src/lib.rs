// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-memory
//!
//! The memory-interface abstraction (component D): an allocator exposing
//! `{alloc, free, map?, unmap?}` behind a single [`MemoryInterface`] trait,
//! plus the two back-ends the core itself needs — [`HeapMemory`] (the
//! process heap) and [`NullMapMemory`] (a decorator giving any back-end
//! without a real mapping step the "map is the identity" contract).
//!
//! Concrete back-ends with a real mapping step (OpenCL SVM, `mmap`-backed
//! pools, ...) are external collaborators; this crate only specifies the
//! interface the core imposes on them.

use std::alloc::{self, Layout};
use std::sync::Arc;

use archi_core::status::Status;
use archi_core::Pointer;
use thiserror::Error;

/// Errors specific to this crate's own back-ends; converted to [`Status`]
/// at the trait boundary so callers keep using the flat status taxonomy.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// `num_bytes` was zero.
    #[error("allocation size must be greater than zero")]
    ZeroSize,
    /// `align` was neither zero nor a power of two.
    #[error("alignment {0} is not zero or a power of two")]
    BadAlignment(usize),
    /// The global allocator returned null.
    #[error("allocator exhausted")]
    Exhausted,
}

impl From<MemoryError> for Status {
    fn from(err: MemoryError) -> Status {
        match err {
            MemoryError::ZeroSize | MemoryError::BadAlignment(_) => Status::MISUSE,
            MemoryError::Exhausted => Status::NO_MEMORY,
        }
    }
}

/// The natural alignment used when `align == 0` ("use the natural
/// alignment of the widest scalar").
const NATURAL_ALIGN: usize = std::mem::align_of::<u128>();

/// An opaque handle returned by [`MemoryInterface::alloc`], usable by
/// later `map`/`unmap`/`free` calls of the *same* interface instance.
///
/// The core only ever sees this as opaque plus the layout it was
/// allocated with; back-ends are free to stash their own bookkeeping
/// behind `addr`.
#[derive(Debug, Clone, Copy)]
pub struct MemoryObject {
    addr: usize,
    num_bytes: usize,
    align: usize,
}

impl MemoryObject {
    /// The address this object was allocated at, as seen by its own
    /// back-end (not necessarily a process-visible pointer).
    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    /// The size, in bytes, this object was allocated with.
    #[must_use]
    pub const fn num_bytes(&self) -> usize {
        self.num_bytes
    }

    /// The alignment this object was allocated with (never 0; callers
    /// get [`NATURAL_ALIGN`] substituted already).
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    fn layout(&self) -> Layout {
        Layout::from_size_align(self.num_bytes, self.align).expect("layout validated at alloc")
    }
}

/// An allocator/mapper back-end, per §4.3 of the specification.
///
/// Contract: non-null `info` on success implies `status >= 0` and vice
/// versa; violating this on either side is an interface bug, which is why
/// the trait returns `Result` rather than a nullable pair — the type
/// system enforces the contract instead of documenting it.
pub trait MemoryInterface: Send + Sync {
    /// Allocate `num_bytes` with alignment `align` (0 or a power of two).
    ///
    /// # Errors
    /// Returns [`Status::MISUSE`] for a bad `num_bytes`/`align`, or
    /// [`Status::NO_MEMORY`] if the underlying allocator is exhausted.
    fn alloc(&self, num_bytes: usize, align: usize, alloc_data: &Pointer) -> Result<MemoryObject, Status>;

    /// Release a previously allocated object. A no-op is not expressible
    /// since `info` is never optional at this layer; callers holding a
    /// possibly-absent object model that with `Option<MemoryObject>`.
    fn free(&self, info: &MemoryObject);

    /// Map `num_bytes` of `info` starting at `offset` into host-accessible
    /// memory. Returns [`Status::NOT_IMPLEMENTED`] if this back-end has no
    /// mapping step (see [`NullMapMemory`] for the "map is identity" case).
    ///
    /// # Errors
    /// Returns [`Status::NOT_IMPLEMENTED`] when mapping is unsupported, or
    /// a back-end-specific error status otherwise.
    fn map(
        &self,
        info: &MemoryObject,
        offset: usize,
        num_bytes: usize,
        writable: bool,
        map_data: &Pointer,
    ) -> Result<*mut u8, Status>;

    /// Unmap a pointer previously returned by [`MemoryInterface::map`].
    /// No-op if this back-end has no mapping step.
    fn unmap(&self, info: &MemoryObject, host_ptr: *mut u8);
}

fn validated_layout(num_bytes: usize, align: usize) -> Result<Layout, MemoryError> {
    if num_bytes == 0 {
        return Err(MemoryError::ZeroSize);
    }
    let align = if align == 0 { NATURAL_ALIGN } else { align };
    if !align.is_power_of_two() {
        return Err(MemoryError::BadAlignment(align));
    }
    Layout::from_size_align(num_bytes, align).map_err(|_| MemoryError::BadAlignment(align))
}

/// The process heap, via [`std::alloc`].
///
/// `map`/`unmap` are unimplemented here (`Status::NOT_IMPLEMENTED`) —
/// wrap a `HeapMemory` in [`NullMapMemory`] to get "map is identity"
/// semantics for back-ends that have no real mapping step.
#[derive(Debug, Default)]
pub struct HeapMemory;

impl MemoryInterface for HeapMemory {
    fn alloc(&self, num_bytes: usize, align: usize, _alloc_data: &Pointer) -> Result<MemoryObject, Status> {
        let layout = validated_layout(num_bytes, align)?;
        // SAFETY: layout is non-zero-sized and validated above.
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            return Err(MemoryError::Exhausted.into());
        }
        Ok(MemoryObject {
            addr: ptr as usize,
            num_bytes: layout.size(),
            align: layout.align(),
        })
    }

    fn free(&self, info: &MemoryObject) {
        if info.addr == 0 {
            return;
        }
        // SAFETY: `info` was produced by `alloc` above with this layout.
        unsafe { alloc::dealloc(info.addr as *mut u8, info.layout()) }
    }

    fn map(
        &self,
        _info: &MemoryObject,
        _offset: usize,
        _num_bytes: usize,
        _writable: bool,
        _map_data: &Pointer,
    ) -> Result<*mut u8, Status> {
        Err(Status::NOT_IMPLEMENTED)
    }

    fn unmap(&self, _info: &MemoryObject, _host_ptr: *mut u8) {}
}

/// Decorator giving any `MemoryInterface` without a real mapping step the
/// "map is the identity" contract: `map(info, offset, ...) == info.addr +
/// offset`. `alloc`/`free` delegate to the wrapped back-end unchanged.
pub struct NullMapMemory {
    inner: Arc<dyn MemoryInterface>,
}

impl NullMapMemory {
    /// Wrap `inner`, keeping its `alloc`/`free` behaviour and overriding
    /// `map`/`unmap` with identity semantics.
    #[must_use]
    pub fn new(inner: Arc<dyn MemoryInterface>) -> NullMapMemory {
        NullMapMemory { inner }
    }
}

impl MemoryInterface for NullMapMemory {
    fn alloc(&self, num_bytes: usize, align: usize, alloc_data: &Pointer) -> Result<MemoryObject, Status> {
        self.inner.alloc(num_bytes, align, alloc_data)
    }

    fn free(&self, info: &MemoryObject) {
        self.inner.free(info);
    }

    fn map(
        &self,
        info: &MemoryObject,
        offset: usize,
        num_bytes: usize,
        _writable: bool,
        _map_data: &Pointer,
    ) -> Result<*mut u8, Status> {
        if offset.saturating_add(num_bytes) > info.num_bytes {
            return Err(Status::MISUSE);
        }
        // SAFETY: offset + num_bytes was just checked against the
        // object's own allocated size.
        Ok((info.addr + offset) as *mut u8)
    }

    fn unmap(&self, _info: &MemoryObject, _host_ptr: *mut u8) {}
}
