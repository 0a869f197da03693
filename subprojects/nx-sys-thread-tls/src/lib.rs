//! # Thread-Local Region access
//!
//! Every Horizon thread owns a 0x200-byte thread-local region (TLR). The first
//! 0x100 bytes are the IPC message buffer: `svcSendSyncRequest` reads the
//! request from it and the kernel writes the reply back into it. All of the
//! service bindings marshal their messages through [`ipc_buffer_ptr`].
//!
//! ```text
//! 0x000  ┌────────────────────────────┐
//!        │ ipc_buffer                 │ 0x100 bytes
//! 0x100  ├────────────────────────────┤
//!        │ kernel / runtime reserved  │ 0x100 bytes
//! 0x200  └────────────────────────────┘
//! ```
//!
//! The message in the buffer is only valid until the next IPC call on the same
//! thread, so responses must be copied out before issuing another request.
//!
//! ## References
//! - [Switchbrew Wiki: Thread Local Region](https://switchbrew.org/wiki/Thread_Local_Region)

#![no_std]

extern crate nx_panic_handler as _; // Provides #[panic_handler]

use core::{mem::offset_of, ptr::NonNull};

use static_assertions::const_assert_eq;

/// Size of the thread-local region.
pub const TLS_REGION_SIZE: usize = 0x200;

/// Size of the IPC message buffer at the start of the region.
pub const IPC_BUFFER_SIZE: usize = 0x100;

/// Thread-local region layout as seen by the IPC layer.
#[derive(Debug)]
#[repr(C)]
pub struct ThreadLocalRegion {
    /// IPC message buffer.
    pub ipc_buffer: [u8; IPC_BUFFER_SIZE],
    /// Kernel and runtime owned area; never touched by the bindings.
    _reserved: [u8; TLS_REGION_SIZE - IPC_BUFFER_SIZE],
}

const_assert_eq!(size_of::<ThreadLocalRegion>(), TLS_REGION_SIZE);
const_assert_eq!(offset_of!(ThreadLocalRegion, ipc_buffer), 0);

/// Returns a pointer to the current thread's thread-local region.
#[inline]
pub fn get_ptr() -> *mut ThreadLocalRegion {
    nx_cpu::tls::get_tls_ptr().cast()
}

/// Returns a pointer to the current thread's IPC message buffer.
#[inline]
pub fn ipc_buffer_ptr() -> NonNull<u8> {
    let tls = get_ptr();
    // SAFETY: tpidrro_el0 always holds the (non-null) TLR address of the
    // running thread, and `ipc_buffer` is the first field of the region.
    unsafe { NonNull::new_unchecked(tls.cast::<u8>()) }
}
