//! Status codes shared by every context operation in the runtime.
//!
//! Mirrors the C `archi_status_t` contract: negative codes are errors
//! (module id in the high bits, info in the low [`Status::INFO_BITS`]
//! bits), zero is success, and positive codes are instruction- or
//! context-specific conditions (e.g. "key already exists").

use std::fmt;

/// Number of bits reserved for the information portion of a negative
/// (error) status code.
pub const INFO_BITS: u32 = 16;

/// A signed status code: `< 0` error, `== 0` success, `> 0` specific condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Status(pub i32);

impl Status {
    /// Success.
    pub const OK: Status = Status(0);

    /// Key referenced by an instruction or action does not exist.
    pub const KEY_NOT_FOUND: Status = Status(1);
    /// Key referenced by an instruction or action already exists.
    pub const KEY_EXISTS: Status = Status(2);

    /// Generic failure (a callee returned a positive status that was normalized).
    pub const FAILURE: Status = Status(-1);
    /// Incorrect API usage (invalid argument or input).
    pub const MISUSE: Status = Status(-2);
    /// Required interface function was not implemented (null in the C original).
    pub const INTERFACE: Status = Status(-3);
    /// Invalid parameter name.
    pub const KEY: Status = Status(-4);
    /// Invalid parameter value.
    pub const VALUE: Status = Status(-5);
    /// Memory allocation failure.
    pub const NO_MEMORY: Status = Status(-8);
    /// Operating system resource operation failed.
    pub const RESOURCE: Status = Status(-16);
    /// Feature or function not implemented.
    pub const NOT_IMPLEMENTED: Status = Status(-128);

    /// Compute the negative error base for a given module id.
    ///
    /// `module_id` is a small positive integer identifying the crate or
    /// subsystem that raised the error; it occupies the bits above
    /// [`INFO_BITS`].
    #[must_use]
    pub const fn module_base(module_id: u32) -> Status {
        Status(-((module_id as i32) << INFO_BITS))
    }

    /// Build a module-specific error code: `module_base(module_id) | info`.
    #[must_use]
    pub const fn module_error(module_id: u32, info: u32) -> Status {
        let base = Self::module_base(module_id).0;
        Status(base | (info as i32 & ((1 << INFO_BITS) - 1)))
    }

    /// True if this code is an error (`< 0`).
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 < 0
    }

    /// True if this code is success (`== 0`).
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// True if this code is a positive, context-specific condition.
    #[must_use]
    pub const fn is_condition(self) -> bool {
        self.0 > 0
    }

    /// Extract the module id encoded in a negative status code.
    #[must_use]
    pub const fn module_id(self) -> u32 {
        (-(self.0 >> INFO_BITS)) as u32
    }

    /// Extract the low info bits of a negative status code.
    #[must_use]
    pub const fn info_bits(self) -> u32 {
        (self.0 as u32) & ((1 << INFO_BITS) - 1)
    }

    /// Normalize any status into an error code: non-positive codes pass
    /// through unchanged, positive codes become [`Status::FAILURE`].
    #[must_use]
    pub const fn to_error(self) -> Status {
        if self.0 <= 0 { self } else { Status::FAILURE }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            write!(
                f,
                "error {} (module {}, info 0x{:x})",
                self.0,
                self.module_id(),
                self.info_bits()
            )
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.0
    }
}
