//! `sm:` protocol constants.

use core::ffi::CStr;

/// Named port of the service manager.
pub const SM_PORT_NAME: &CStr = c"sm:";

/// RegisterClient: binds the session to the caller's PID.
pub const REGISTER_CLIENT: u32 = 0;

/// GetServiceHandle: opens a session to a named service.
pub const GET_SERVICE_HANDLE: u32 = 1;
