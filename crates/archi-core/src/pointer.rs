//! The universal typed-value carrier (component B).

use crate::refcount::RefCount;
use bitflags::bitflags;

bitflags! {
    /// Bits describing how a [`Pointer`]'s payload should be interpreted.
    ///
    /// The low byte is reserved for these built-in bits; callers may only
    /// set bits `8..` of their own, mirroring "additional user-defined
    /// bits may be set only within a reserved low range" from the other
    /// direction (we reserve the *low* byte instead of a high range, since
    /// that maps more naturally onto `bitflags!`'s generated constants).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PointerFlags: u32 {
        /// `payload` is a function pointer; the data-pointer view is undefined.
        const FUNCTION = 1 << 0;
        /// The referenced region may be written to (advisory).
        const WRITABLE = 1 << 1;
    }
}

/// First bit available for user-defined flags.
pub const USER_FLAG_SHIFT: u32 = 8;

/// Element layout: how many elements, how large each is, and their
/// alignment (0 meaning "natural alignment of the widest scalar").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementLayout {
    /// Number of elements.
    pub count: usize,
    /// Size of one element, in bytes.
    pub size: usize,
    /// Required alignment in bytes; 0 or a power of two.
    pub align: usize,
}

impl ElementLayout {
    /// A layout describing a single `T`.
    #[must_use]
    pub fn of<T>() -> ElementLayout {
        ElementLayout {
            count: 1,
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        }
    }

    /// True if `align` is 0 or a power of two, per the layout invariant.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.align == 0 || self.align.is_power_of_two()
    }
}

/// The raw payload carried by a [`Pointer`]: either nothing, a data
/// address, or a function address. Kept as raw addresses (rather than a
/// typed `*mut T`/`fn()`) because a `Pointer` is, like the original
/// `void*`-based type, untyped at rest — the [`ElementLayout`] is what
/// gives it meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// No payload; a null pointer.
    Null,
    /// A data address.
    Data(*mut u8),
    /// A function address.
    Function(*const ()),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Null
    }
}

/// The universal typed-value carrier passed between slots.
///
/// A null `Pointer` (`Pointer::default()`) has every field zeroed.
/// Cloning a `Pointer` never touches the reference count — callers that
/// need to extend a payload's lifetime call [`Pointer::ref_count`]'s
/// `increment`/`decrement` explicitly, exactly as the specification
/// requires.
#[derive(Debug, Clone, Default)]
pub struct Pointer {
    payload: Payload,
    flags: PointerFlags,
    element: ElementLayout,
    ref_count: RefCount,
}

// SAFETY: `Pointer` is a data-description value, like a `void*` plus
// metadata, in the original. Contexts that share a `Pointer` across
// threads (e.g. thread-group work data) are responsible for the same
// synchronization discipline the C original expects of its callers; the
// runtime itself never dereferences `payload` without the owning
// context's cooperation.
unsafe impl Send for Pointer {}
unsafe impl Sync for Pointer {}

impl Pointer {
    /// The null pointer: all fields zero/default.
    #[must_use]
    pub fn null() -> Pointer {
        Pointer::default()
    }

    /// True if this is the null pointer (no payload, no ref count).
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Null) && self.ref_count.is_null()
    }

    /// Construct a pointer to a data address.
    #[must_use]
    pub fn data(ptr: *mut u8, flags: PointerFlags, element: ElementLayout, ref_count: RefCount) -> Pointer {
        Pointer {
            payload: Payload::Data(ptr),
            flags: flags - PointerFlags::FUNCTION,
            element,
            ref_count,
        }
    }

    /// Pack a `usize` scalar directly into the payload address, the way
    /// the original passes small-integer parameters (`num_elements`,
    /// `flags`, byte counts) by reinterpreting a `size_t` as a `void*`
    /// rather than boxing it. `element.size` records `size_of::<usize>()`
    /// so a reader can tell a packed scalar apart from a real address by
    /// convention; there is no allocation and no `ref_count` to release.
    #[must_use]
    pub fn from_usize(value: usize) -> Pointer {
        Pointer {
            payload: Payload::Data(value as *mut u8),
            flags: PointerFlags::empty(),
            element: ElementLayout {
                count: 1,
                size: std::mem::size_of::<usize>(),
                align: std::mem::align_of::<usize>(),
            },
            ref_count: RefCount::null(),
        }
    }

    /// Unpack a `usize` scalar previously packed by [`Pointer::from_usize`].
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        if self.flags.contains(PointerFlags::FUNCTION) || self.element.size != std::mem::size_of::<usize>() {
            return None;
        }
        match self.payload {
            Payload::Data(ptr) => Some(ptr as usize),
            _ => None,
        }
    }

    /// Construct a pointer to a function address.
    #[must_use]
    pub fn function(ptr: *const (), element: ElementLayout, ref_count: RefCount) -> Pointer {
        Pointer {
            payload: Payload::Function(ptr),
            flags: flags_with_function(),
            element,
            ref_count,
        }
    }

    /// The raw payload.
    #[must_use]
    pub const fn payload(&self) -> Payload {
        self.payload
    }

    /// Read the payload as a data pointer.
    ///
    /// # Errors
    /// Returns `None` if `flags.function` is set — the data-pointer view
    /// is undefined for a function payload, per the specification.
    #[must_use]
    pub const fn as_data_ptr(&self) -> Option<*mut u8> {
        if self.flags.contains(PointerFlags::FUNCTION) {
            return None;
        }
        match self.payload {
            Payload::Data(ptr) => Some(ptr),
            _ => None,
        }
    }

    /// Read the payload as a function pointer.
    #[must_use]
    pub const fn as_function_ptr(&self) -> Option<*const ()> {
        match self.payload {
            Payload::Function(ptr) if self.flags.contains(PointerFlags::FUNCTION) => Some(ptr),
            _ => None,
        }
    }

    /// The flag bitset.
    #[must_use]
    pub const fn flags(&self) -> PointerFlags {
        self.flags
    }

    /// The element layout.
    #[must_use]
    pub const fn element(&self) -> ElementLayout {
        self.element
    }

    /// The reference-count handle describing ownership of `payload`.
    #[must_use]
    pub const fn ref_count(&self) -> &RefCount {
        &self.ref_count
    }
}

fn flags_with_function() -> PointerFlags {
    PointerFlags::FUNCTION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointer_has_zeroed_fields() {
        let ptr = Pointer::null();
        assert!(ptr.is_null());
        assert_eq!(ptr.flags(), PointerFlags::empty());
        assert_eq!(ptr.element(), ElementLayout::default());
    }

    #[test]
    fn function_payload_hides_data_view() {
        let f = Pointer::function(std::ptr::null(), ElementLayout::default(), RefCount::null());
        assert!(f.as_data_ptr().is_none());
        assert!(f.as_function_ptr().is_some());
    }

    #[test]
    fn cloning_does_not_increment_ref_count() {
        let rc = RefCount::alloc(|| {});
        let ptr = Pointer::data(std::ptr::null_mut(), PointerFlags::empty(), ElementLayout::default(), rc.clone());
        let _clone = ptr.clone();
        assert_eq!(rc.count(), 1);
    }

    #[test]
    fn element_layout_validates_power_of_two_alignment() {
        assert!(ElementLayout { count: 1, size: 8, align: 0 }.is_valid());
        assert!(ElementLayout { count: 1, size: 8, align: 8 }.is_valid());
        assert!(!ElementLayout { count: 1, size: 8, align: 3 }.is_valid());
    }

    #[test]
    fn usize_scalar_round_trips() {
        let ptr = Pointer::from_usize(42);
        assert_eq!(ptr.as_usize(), Some(42));
    }

    #[test]
    fn function_pointer_is_not_a_usize_scalar() {
        let ptr = Pointer::function(std::ptr::null(), ElementLayout::default(), RefCount::null());
        assert_eq!(ptr.as_usize(), None);
    }
}
