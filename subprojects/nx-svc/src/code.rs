//! _Supervisor Call (SVC)_ codes used by the service bindings.
//!
//! References:
//! - <https://switchbrew.org/wiki/SVC#system_calls>

/// Sleeps the current thread for the specified amount of time.
pub const SLEEP_THREAD: u16 = 0xB;

/// Clears an event's signalled status.
pub const CLEAR_EVENT: u16 = 0x12;

/// Closes a handle, decrementing the reference count of the corresponding kernel object.
pub const CLOSE_HANDLE: u16 = 0x16;

/// Resets a signal (event or process) to the non-signalled state.
pub const RESET_SIGNAL: u16 = 0x17;

/// Waits on one or more synchronization objects, optionally with a timeout.
pub const WAIT_SYNCHRONIZATION: u16 = 0x18;

/// Gets the current system tick.
pub const GET_SYSTEM_TICK: u16 = 0x1E;

/// Connects to a registered named port.
pub const CONNECT_TO_NAMED_PORT: u16 = 0x1F;

/// Sends an IPC synchronization request to a session.
pub const SEND_SYNC_REQUEST: u16 = 0x21;
