//! Result-code modules and descriptions.
//!
//! Horizon result codes carry the originating module in bits 0-8 and a
//! module-specific description in bits 9-21. This module names the two
//! modules the bindings produce codes for: the kernel (module 1) and the
//! homebrew support library (module 345), which is used for conditions
//! detected on the client side before any IPC is sent.
//!
//! # References
//! - [Switchbrew Wiki: Error codes](https://switchbrew.org/wiki/Error_codes)
//! - libnx `result.h`

use crate::result::{self, ResultCode};

/// Conversion of an error value back into the raw result code it came from.
///
/// Implemented by every error type in the bindings, so callers that need the
/// numeric platform code (for logging, FFI, or comparison against documented
/// values) can always get it unchanged.
pub trait ToRawResultCode {
    /// Returns the raw `u32` result code for this error.
    fn to_rc(self) -> ResultCode;
}

/// Result code module identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Module {
    /// Kernel (SVC) errors.
    Kernel = 1,
    /// Homebrew support library errors.
    Libnx = 345,
}

/// Kernel result descriptions (module 1).
///
/// Only the descriptions that the typed wrappers in this crate distinguish are
/// listed; any other kernel code is carried verbatim in an `Unknown` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum KernelError {
    /// The port or process has reached its session limit.
    OutOfSessions = 7,
    /// The thread is being terminated.
    TerminationRequested = 59,
    /// A size argument is invalid.
    InvalidSize = 101,
    /// An address argument is invalid.
    InvalidAddress = 102,
    /// A kernel object could not be allocated.
    OutOfResource = 103,
    /// The handle table is full.
    OutOfHandles = 105,
    /// The memory region is not valid for the operation.
    InvalidCurrentMemory = 106,
    /// A handle argument is invalid.
    InvalidHandle = 114,
    /// The combination of arguments is invalid.
    InvalidCombination = 116,
    /// The wait timed out.
    TimedOut = 117,
    /// The wait was cancelled.
    Cancelled = 118,
    /// An argument is out of range.
    OutOfRange = 119,
    /// The requested object does not exist.
    NotFound = 121,
    /// The remote end closed the session.
    SessionClosed = 123,
    /// The object is in a state that does not allow the operation.
    InvalidState = 125,
    /// A resource limit was reached.
    LimitReached = 132,
    /// The receive list of the message is broken.
    ReceiveListBroken = 258,
    /// The message does not fit the buffer.
    MessageTooLarge = 260,
}

impl PartialEq<u32> for KernelError {
    fn eq(&self, other: &u32) -> bool {
        *self as u32 == *other
    }
}

impl PartialEq<KernelError> for u32 {
    fn eq(&self, other: &KernelError) -> bool {
        *self == *other as u32
    }
}

impl ToRawResultCode for KernelError {
    fn to_rc(self) -> ResultCode {
        result::make(Module::Kernel, self as u32)
    }
}

/// Client-side result descriptions (module 345).
///
/// These codes are produced locally when a request is rejected before it
/// reaches the service (bad arguments, unsupported system version, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LibnxError {
    /// A fixed-capacity buffer has no room for the value.
    OutOfMemory = 2,
    /// The object is already initialized.
    AlreadyInitialized = 7,
    /// The object is not initialized.
    NotInitialized = 8,
    /// The requested entry was not found.
    NotFound = 9,
    /// An argument is invalid.
    BadInput = 11,
    /// The command is not available on the running system version.
    IncompatSysVer = 37,
    /// A library applet exited without reporting success.
    LibAppletBadExit = 46,
    /// A CMIF reply did not start with the `"SFCO"` magic.
    InvalidCmifOutHeader = 47,
    /// A reply was well-formed but lacked something the command always returns.
    ShouldNotHappen = 48,
}

impl ToRawResultCode for LibnxError {
    fn to_rc(self) -> ResultCode {
        result::make(Module::Libnx, self as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_codes_match_documented_values() {
        assert_eq!(KernelError::InvalidHandle.to_rc(), 0xE401);
        assert_eq!(KernelError::TimedOut.to_rc(), 0xEA01);
        assert_eq!(KernelError::SessionClosed.to_rc(), 0xF601);
    }

    #[test]
    fn libnx_codes_use_module_345() {
        let rc = LibnxError::BadInput.to_rc();
        assert_eq!(rc & 0x1FF, 345);
        assert_eq!(rc >> 9, 11);
    }

    #[test]
    fn libnx_descriptions() {
        let cases = [
            (LibnxError::OutOfMemory, 2),
            (LibnxError::AlreadyInitialized, 7),
            (LibnxError::NotInitialized, 8),
            (LibnxError::NotFound, 9),
            (LibnxError::BadInput, 11),
            (LibnxError::IncompatSysVer, 37),
            (LibnxError::LibAppletBadExit, 46),
            (LibnxError::InvalidCmifOutHeader, 47),
            (LibnxError::ShouldNotHappen, 48),
        ];
        for (err, description) in cases {
            assert_eq!(err.to_rc(), (description << 9) | 345, "{err:?}");
        }
        assert_eq!(LibnxError::IncompatSysVer.to_rc(), 0x4B59);
        assert_eq!(LibnxError::LibAppletBadExit.to_rc(), 0x5D59);
    }
}
