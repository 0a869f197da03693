//! Raw _Supervisor Call (SVC)_ API.
//!
//! Only the calls needed by the IPC service bindings are exposed here. Each
//! function is a naked stub that issues the `svc` instruction and returns the
//! kernel result code in `w0`.

use core::ffi::c_char;

use crate::{code::*, result::ResultCode};

/// A raw handle type.
///
/// Alias for `u32`.
pub type Handle = u32;

/// Invalid handle
pub const INVALID_HANDLE: Handle = 0;

/// Pseudo handle for the current thread
pub const CUR_THREAD_HANDLE: Handle = 0xFFFF8000;

/// Pseudo handle for the current process
pub const CUR_PROCESS_HANDLE: Handle = 0xFFFF8001;

/// Sleeps the current thread for the specified amount of time.
///
/// `void svcSleepThread(int64_t nano);`
///
/// Syscall code: [SLEEP_THREAD](crate::code::SLEEP_THREAD) (`0xB`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#SleepThread>
///
/// # Safety
///
/// This function is safe to call from any context. The value passed is used directly
/// by the kernel.
#[unsafe(naked)]
pub unsafe extern "C" fn sleep_thread(nano: i64) {
    core::arch::naked_asm!(
        "svc {code}",
        "ret",
        code = const SLEEP_THREAD,
    );
}

/// Takes the given event out of the signaled state, if it is signaled.
///
/// `Result svcClearEvent(Handle handle);`
///
/// Syscall code: [CLEAR_EVENT](crate::code::CLEAR_EVENT) (`0x12`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#ClearEvent>
///
/// # Safety
///
/// The caller must ensure that `handle` is a valid kernel event handle owned by the current process.
#[unsafe(naked)]
pub unsafe extern "C" fn clear_event(handle: Handle) -> ResultCode {
    core::arch::naked_asm!(
        "svc {code}",
        "ret",
        code = const CLEAR_EVENT,
    );
}

/// Closes a handle, decrementing the reference count of the corresponding kernel object.
///
/// `Result svcCloseHandle(Handle handle);`
///
/// Syscall code: [CLOSE_HANDLE](crate::code::CLOSE_HANDLE) (`0x16`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#CloseHandle>
///
/// # Safety
///
/// The caller must ensure that `handle` is a valid kernel handle owned by the current process.
#[unsafe(naked)]
pub unsafe extern "C" fn close_handle(handle: Handle) -> ResultCode {
    core::arch::naked_asm!(
        "svc {code}",
        "ret",
        code = const CLOSE_HANDLE,
    );
}

/// Resets a signal.
///
/// `Result svcResetSignal(Handle handle);`
///
/// Syscall code: [RESET_SIGNAL](crate::code::RESET_SIGNAL) (`0x17`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#ResetSignal>
///
/// # Safety
///
/// The caller must ensure that `handle` is a valid readable event or process handle.
#[unsafe(naked)]
pub unsafe extern "C" fn reset_signal(handle: Handle) -> ResultCode {
    core::arch::naked_asm!(
        "svc {code}",
        "ret",
        code = const RESET_SIGNAL,
    );
}

/// Waits on one or more synchronization objects, optionally with a timeout.
///
/// `Result svcWaitSynchronization(int32_t* index, const Handle* handles, int32_t handleCount, uint64_t timeout);`
///
/// Syscall code: [WAIT_SYNCHRONIZATION](crate::code::WAIT_SYNCHRONIZATION) (`0x18`).
///
/// | Arg | Name | Description |
/// | --- | --- | --- |
/// | OUT | _index_ | Pointer to store the index of the object that was signaled. |
/// | IN | _handles_ | Pointer to an array of handles to wait on. |
/// | IN | _handle_count_ | Number of handles to wait on (at most 0x40). |
/// | IN | _timeout_ | Timeout in nanoseconds. |
///
/// Ref: <https://switchbrew.org/wiki/SVC#WaitSynchronization>
///
/// # Safety
///
/// The caller must ensure:
/// - `index` is a valid, aligned pointer to writable memory for the result index
/// - `handles` points to a valid array of `handle_count` kernel handles owned by the current process
/// - No handle in the array is a pseudo-handle
#[unsafe(naked)]
pub unsafe extern "C" fn wait_synchronization(
    index: *mut i32,
    handles: *const u32,
    handle_count: i32,
    timeout: u64,
) -> ResultCode {
    core::arch::naked_asm!(
        "str x0, [sp, #-16]!", // Keep the index pointer across the call
        "svc {code}",
        "ldr x2, [sp], #16",
        "str w1, [x2]",        // Store the signalled index
        "ret",
        code = const WAIT_SYNCHRONIZATION,
    );
}

/// Gets the current system tick.
///
/// `u64 svcGetSystemTick();`
///
/// Syscall code: [GET_SYSTEM_TICK](crate::code::GET_SYSTEM_TICK) (`0x1E`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#GetSystemTick>
///
/// # Safety
///
/// This function is safe to call from any context.
#[unsafe(naked)]
pub unsafe extern "C" fn get_system_tick() -> u64 {
    core::arch::naked_asm!(
        "svc {code}",
        "ret",
        code = const GET_SYSTEM_TICK,
    );
}

/// Connects to a registered named port.
///
/// `Result svcConnectToNamedPort(Handle* session, const char* name);`
///
/// Syscall code: [CONNECT_TO_NAMED_PORT](crate::code::CONNECT_TO_NAMED_PORT) (`0x1F`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#ConnectToNamedPort>
///
/// # Safety
///
/// The caller must ensure:
/// - `session` is a valid, aligned pointer to writable memory for the output handle
/// - `name` points to a null-terminated C string that is valid and readable
#[unsafe(naked)]
pub unsafe extern "C" fn connect_to_named_port(
    session: *mut Handle,
    name: *const c_char,
) -> ResultCode {
    core::arch::naked_asm!(
        "str x0, [sp, #-16]!", // Keep the session pointer across the call
        "svc {code}",
        "ldr x2, [sp], #16",
        "str w1, [x2]",        // Store the session handle
        "ret",
        code = const CONNECT_TO_NAMED_PORT,
    );
}

/// Sends an IPC synchronization request to a session.
///
/// The request message is read from (and the reply written to) the calling
/// thread's TLS IPC buffer.
///
/// `Result svcSendSyncRequest(Handle session);`
///
/// Syscall code: [SEND_SYNC_REQUEST](crate::code::SEND_SYNC_REQUEST) (`0x21`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#SendSyncRequest>
///
/// # Safety
///
/// The caller must ensure that `session` is a valid kernel session handle owned by the current process.
#[unsafe(naked)]
pub unsafe extern "C" fn send_sync_request(session: Handle) -> ResultCode {
    core::arch::naked_asm!(
        "svc {code}",
        "ret",
        code = const SEND_SYNC_REQUEST,
    );
}
