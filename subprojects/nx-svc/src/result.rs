//! Result codes for Horizon OS kernel SVC functions and IPC services.
//!
//! The 32-bit result code is structured as follows:
//!
//! - **Bits 0-8:** Module ID
//! - **Bits 9-21:** Description
//! - **Bits 22-31:** Reserved
//!
//! Zero means success. Any other value is an error that is carried unchanged
//! inside [`Error`].
//!
//! # References
//! - [Switchbrew Wiki: Error Codes](https://switchbrew.org/wiki/Error_codes)

use crate::error::Module;

/// The raw representation of a result code, containing both success and error states.
pub type ResultCode = u32;

/// Mask for the module field (9 bits)
const MODULE_MASK: u32 = 0x1FF;
/// Mask for the description field (13 bits)
const DESCRIPTION_MASK: u32 = 0x1FFF;
/// Shift amount for the description field
const DESCRIPTION_SHIFT: u32 = 9;

/// Builds a raw result code from a module and description.
#[inline]
pub const fn make(module: Module, description: u32) -> ResultCode {
    (module as u32 & MODULE_MASK) | ((description & DESCRIPTION_MASK) << DESCRIPTION_SHIFT)
}

/// A non-zero Horizon OS result code.
///
/// # Formatting
///
/// The error code is formatted as `2XXX-YYYY` where:
///  - `XXX` is `2000` + module number
///  - `YYYY` is the `description`
#[derive(Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct Error(ResultCode);

impl Error {
    /// Returns the module number that produced the error.
    #[inline]
    pub const fn module(&self) -> u32 {
        self.0 & MODULE_MASK
    }

    /// Returns the description value
    #[inline]
    pub const fn description(&self) -> u32 {
        (self.0 >> DESCRIPTION_SHIFT) & DESCRIPTION_MASK
    }

    /// Returns the raw value (`u32`) of this error code
    #[inline]
    pub const fn to_raw(self) -> ResultCode {
        self.0
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:04}", 2000 + self.module(), self.description())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Error")
            .field("code", &format_args!("{}", self))
            .field("module", &self.module())
            .field("description", &self.description())
            .field("raw", &format_args!("{:#x}", self.0))
            .finish()
    }
}

impl core::error::Error for Error {}

/// Maps a raw result code returned by an SVC into a `Result`.
///
/// On success returns `Ok(ok)`. On failure the description is handed to `err`
/// together with the full [`Error`], so wrappers can match well-known kernel
/// descriptions and keep everything else verbatim.
#[inline]
#[cfg_attr(not(target_os = "horizon"), allow(dead_code))]
pub(crate) fn map<T, E>(
    rc: ResultCode,
    ok: T,
    err: impl FnOnce(u32, Error) -> E,
) -> core::result::Result<T, E> {
    if rc == 0 {
        Ok(ok)
    } else {
        let error = Error(rc);
        Err(err(error.description(), error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_module_and_description() {
        let err = Error(make(Module::Kernel, 404));
        assert_eq!(err.module(), 1);
        assert_eq!(err.description(), 404);
        assert_eq!(err.to_string(), "2001-0404");

        let err = Error(make(Module::Libnx, 46));
        assert_eq!(err.to_string(), "2345-0046");
    }

    #[test]
    fn make_masks_fields() {
        assert_eq!(make(Module::Kernel, 0x2000), 1);
        assert_eq!(make(Module::Libnx, 11), 0x1759);
    }

    #[test]
    fn map_keeps_raw_code() {
        let res: Result<(), u32> = map(0xE401, (), |_, e| e.to_raw());
        assert_eq!(res, Err(0xE401));
        let ok: Result<u8, u32> = map(0, 7, |_, e| e.to_raw());
        assert_eq!(ok, Ok(7));
    }
}
