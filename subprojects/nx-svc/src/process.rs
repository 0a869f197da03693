//! Process handle types.

use crate::raw;

define_handle_type! {
    /// A handle to a process kernel object.
    pub struct Handle
}

impl Handle {
    /// Returns the pseudo-handle for the current process.
    ///
    /// Services that bind a client to its process (`usb:hs` BindClientProcess,
    /// applet proxy creation) receive this as a copy handle.
    pub const fn current_process() -> Self {
        Self(raw::CUR_PROCESS_HANDLE)
    }
}
