//! Kernel synchronization primitives: event handles and waiting.
//!
//! Services hand out readable event handles as copy handles. The client side
//! only ever waits on them, clears them, and closes them. [`Event`] bundles a
//! handle with the libnx-style autoclear flag so that waiting on it behaves
//! like a one-shot or a level-triggered signal as the caller asked for.

use crate::{
    error::{KernelError as KError, ToRawResultCode},
    handle::Waitable,
    raw::{self, Handle},
    result::{self, Error, ResultCode},
};

/// Timeout value meaning "wait forever".
pub const WAIT_FOREVER: u64 = u64::MAX;

/// Maximum number of handles accepted by a single wait.
pub const MAX_WAIT_HANDLES: usize = 64;

define_waitable_handle_type! {
    /// A handle to the readable end of a kernel event.
    pub struct EventHandle
}

/// Waits on one or more synchronization objects.
///
/// Returns the index (within `handles`) of the object that was signalled. Only
/// the first [`MAX_WAIT_HANDLES`] entries are forwarded to the kernel.
///
/// # Safety
///
/// Every forwarded handle must be a valid kernel handle owned by the current
/// process and must not be a pseudo-handle.
pub unsafe fn wait_synchronization<H>(
    handles: &[H],
    timeout_ns: u64,
) -> Result<usize, WaitSynchronizationError>
where
    H: Waitable,
{
    let handles_len = handles.len().min(MAX_WAIT_HANDLES);
    let mut raw_handles: [Handle; MAX_WAIT_HANDLES] = [raw::INVALID_HANDLE; MAX_WAIT_HANDLES];
    for (dst, src) in raw_handles[..handles_len].iter_mut().zip(handles) {
        *dst = src.raw_handle();
    }

    let mut idx: i32 = -1;

    // SAFETY: `raw_handles` lives on the stack for the whole call and its first
    // `handles_len` entries are initialised.
    let rc = unsafe {
        raw::wait_synchronization(
            &mut idx,
            raw_handles.as_ptr(),
            handles_len as i32,
            timeout_ns,
        )
    };

    result::map(rc, idx as usize, |desc, err| match desc {
        d if KError::InvalidHandle == d => WaitSynchronizationError::InvalidHandle,
        d if KError::TimedOut == d => WaitSynchronizationError::TimedOut,
        d if KError::Cancelled == d => WaitSynchronizationError::Cancelled,
        d if KError::OutOfRange == d => WaitSynchronizationError::OutOfRange,
        _ => WaitSynchronizationError::Unknown(err),
    })
}

/// Waits on a single synchronization object.
pub fn wait_synchronization_single<H: Waitable>(
    handle: &H,
    timeout_ns: u64,
) -> Result<(), WaitSynchronizationError> {
    // SAFETY: `H: Waitable` is only implemented by handle newtypes whose values
    // come from the kernel; pseudo-handles are never wrapped as waitables.
    unsafe { wait_synchronization(core::slice::from_ref(handle), timeout_ns) }.map(|_| ())
}

/// Error type for [`wait_synchronization`]
#[derive(Debug, thiserror::Error)]
pub enum WaitSynchronizationError {
    /// One (or more) of the supplied handles is invalid.
    #[error("invalid handle")]
    InvalidHandle,
    /// The wait operation timed out.
    #[error("operation timed out")]
    TimedOut,
    /// The wait was cancelled.
    #[error("wait cancelled")]
    Cancelled,
    /// The number of handles supplied is out of range.
    #[error("out of range")]
    OutOfRange,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(Error),
}

impl ToRawResultCode for WaitSynchronizationError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidHandle => KError::InvalidHandle.to_rc(),
            Self::TimedOut => KError::TimedOut.to_rc(),
            Self::Cancelled => KError::Cancelled.to_rc(),
            Self::OutOfRange => KError::OutOfRange.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}

/// Takes an event out of the signalled state.
pub fn clear_event(handle: EventHandle) -> Result<(), SignalError> {
    // SAFETY: The kernel validates the handle and returns an error if invalid.
    let rc = unsafe { raw::clear_event(handle.to_raw()) };
    result::map(rc, (), SignalError::from_desc)
}

/// Resets a readable event, failing with [`SignalError::NotSignalled`] if it was not signalled.
pub fn reset_signal(handle: EventHandle) -> Result<(), SignalError> {
    // SAFETY: The kernel validates the handle and returns an error if invalid.
    let rc = unsafe { raw::reset_signal(handle.to_raw()) };
    result::map(rc, (), SignalError::from_desc)
}

/// Error returned by [`clear_event`] and [`reset_signal`].
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The handle does not refer to an event.
    #[error("invalid handle")]
    InvalidHandle,
    /// The event was not in the signalled state.
    #[error("event not signalled")]
    NotSignalled,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(Error),
}

impl SignalError {
    fn from_desc(desc: u32, err: Error) -> Self {
        match desc {
            d if KError::InvalidHandle == d => Self::InvalidHandle,
            d if KError::InvalidState == d => Self::NotSignalled,
            _ => Self::Unknown(err),
        }
    }
}

impl ToRawResultCode for SignalError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidHandle => KError::InvalidHandle.to_rc(),
            Self::NotSignalled => KError::InvalidState.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}

/// Closes an event handle.
pub fn close_handle(handle: EventHandle) -> Result<(), CloseHandleError> {
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
    /// The supplied handle is not valid.
    #[error("invalid handle")]
    InvalidHandle,
    /// An unknown error occurred.
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

/// A readable kernel event received from a service.
///
/// With `autoclear` set, a successful [`wait`](Self::wait) consumes the
/// signal, so each signal wakes exactly one waiter. Without it the event stays
/// signalled until [`clear`](Self::clear) is called.
#[derive(Debug)]
pub struct Event {
    handle: EventHandle,
    autoclear: bool,
}

impl Event {
    /// Wraps a readable event handle.
    pub const fn new(handle: EventHandle, autoclear: bool) -> Self {
        Self { handle, autoclear }
    }

    /// Returns the underlying handle.
    #[inline]
    pub const fn handle(&self) -> EventHandle {
        self.handle
    }

    /// Returns whether waits consume the signal.
    #[inline]
    pub const fn autoclear(&self) -> bool {
        self.autoclear
    }

    /// Blocks until the event is signalled or `timeout_ns` elapses.
    pub fn wait(&self, timeout_ns: u64) -> Result<(), WaitSynchronizationError> {
        loop {
            wait_synchronization_single(&self.handle, timeout_ns)?;

            if !self.autoclear {
                return Ok(());
            }

            // Another waiter may have consumed the signal first; wait again in that case.
            match reset_signal(self.handle) {
                Ok(()) => return Ok(()),
                Err(SignalError::NotSignalled) => continue,
                Err(SignalError::InvalidHandle) => {
                    return Err(WaitSynchronizationError::InvalidHandle);
                }
                Err(SignalError::Unknown(err)) => return Err(WaitSynchronizationError::Unknown(err)),
            }
        }
    }

    /// Takes the event out of the signalled state.
    pub fn clear(&self) -> Result<(), SignalError> {
        clear_event(self.handle)
    }

    /// Consumes and closes the event handle.
    pub fn close(self) -> Result<(), CloseHandleError> {
        close_handle(self.handle)
    }
}
