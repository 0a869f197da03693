//! IPC session management for Horizon OS.
//!
//! A session handle represents the client side of an IPC connection to a
//! service. Sessions are obtained either by connecting to a named port (only
//! `"sm:"` in practice) or from the service manager, and every request is sent
//! with [`send_sync_request`] using the calling thread's TLS IPC buffer.

use core::ffi::CStr;

use crate::{
    error::{KernelError as KError, ToRawResultCode},
    raw,
    result::{self, Error, ResultCode},
};

define_waitable_handle_type! {
    /// A handle to a client session kernel object.
    pub struct Handle
}

/// Connects to a registered named port and returns a session handle.
pub fn connect_to_named_port(name: &CStr) -> Result<Handle, ConnectError> {
    let mut handle = raw::INVALID_HANDLE;
    // SAFETY: `name` is a valid null-terminated C string (guaranteed by CStr),
    // and `handle` is a valid mutable pointer to receive the output handle.
    let rc = unsafe { raw::connect_to_named_port(&mut handle, name.as_ptr()) };

    result::map(rc, Handle(handle), |desc, err| match desc {
        d if KError::NotFound == d => ConnectError::NotFound,
        d if KError::OutOfHandles == d => ConnectError::OutOfHandles,
        d if KError::OutOfSessions == d => ConnectError::OutOfSessions,
        _ => ConnectError::Unknown(err),
    })
}

/// Error returned by [`connect_to_named_port`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// No port registered with the given name.
    #[error("port not found")]
    NotFound,
    /// Process handle table is full.
    #[error("out of handles")]
    OutOfHandles,
    /// Port's maximum session limit reached.
    #[error("out of sessions")]
    OutOfSessions,
    /// Unexpected kernel error.
    #[error("unknown error: {0}")]
    Unknown(Error),
}

impl ToRawResultCode for ConnectError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::NotFound => KError::NotFound.to_rc(),
            Self::OutOfHandles => KError::OutOfHandles.to_rc(),
            Self::OutOfSessions => KError::OutOfSessions.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}

/// Sends the message in the TLS IPC buffer on `handle` and waits for the reply.
pub fn send_sync_request(handle: Handle) -> Result<(), SendSyncError> {
    // SAFETY: The kernel validates the session handle and returns an error if invalid.
    // The IPC message is read from the thread-local storage buffer.
    let rc = unsafe { raw::send_sync_request(handle.to_raw()) };
    result::map(rc, (), |desc, err| match desc {
        d if KError::TerminationRequested == d => SendSyncError::TerminationRequested,
        d if KError::OutOfResource == d => SendSyncError::OutOfResource,
        d if KError::InvalidHandle == d => SendSyncError::InvalidHandle,
        d if KError::SessionClosed == d => SendSyncError::SessionClosed,
        _ => SendSyncError::Unknown(err),
    })
}

/// Error returned by [`send_sync_request`].
#[derive(Debug, thiserror::Error)]
pub enum SendSyncError {
    /// Thread is terminating.
    #[error("termination requested")]
    TerminationRequested,
    /// Failed to allocate session request.
    #[error("out of resource")]
    OutOfResource,
    /// Invalid session handle.
    #[error("invalid handle")]
    InvalidHandle,
    /// Session closed by server.
    #[error("session closed")]
    SessionClosed,
    /// Unexpected kernel error.
    #[error("unknown error: {0}")]
    Unknown(Error),
}

impl ToRawResultCode for SendSyncError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::TerminationRequested => KError::TerminationRequested.to_rc(),
            Self::OutOfResource => KError::OutOfResource.to_rc(),
            Self::InvalidHandle => KError::InvalidHandle.to_rc(),
            Self::SessionClosed => KError::SessionClosed.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}

/// Closes a session handle, decrementing the kernel reference count.
pub fn close_handle(handle: Handle) -> Result<(), CloseHandleError> {
    // SAFETY: The kernel validates the handle and returns an error if invalid.
    let rc = unsafe { raw::close_handle(handle.to_raw()) };
    result::map(rc, (), |desc, err| match desc {
        d if KError::InvalidHandle == d => CloseHandleError::InvalidHandle,
        _ => CloseHandleError::Unknown(err),
    })
}

/// Error returned by [`close_handle`].
#[derive(Debug, thiserror::Error)]
pub enum CloseHandleError {
    /// The supplied handle is not a valid session handle.
    #[error("invalid handle")]
    InvalidHandle,
    /// Unexpected kernel error.
    #[error("unknown error: {0}")]
    Unknown(Error),
}

impl ToRawResultCode for CloseHandleError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidHandle => KError::InvalidHandle.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}
