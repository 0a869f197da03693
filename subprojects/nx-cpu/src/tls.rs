//! Thread-Local Storage (TLS)
//!
//! The thread-local region (TLR) is a 0x200-byte area whose base address is
//! held in the read-only thread ID register `tpidrro_el0`.
//!
//! ## References
//! - [Switchbrew Wiki: Thread Local Region](https://switchbrew.org/wiki/Thread_Local_Region)
//! - [ARM TPIDRRO_ELO Register](https://developer.arm.com/documentation/ddi0601/2024-12/AArch64-Registers/TPIDRRO-EL0--EL0-Read-Only-Software-Thread-ID-Register)

use core::{arch::asm, ffi::c_void};

/// Returns the base address of the current thread's thread-local region.
#[inline]
pub fn get_tls_ptr() -> *mut c_void {
    let tls_ptr: *mut c_void;
    // SAFETY: Reading tpidrro_el0 has no side effects.
    unsafe {
        asm!(
            "mrs {:x}, tpidrro_el0",
            out(reg) tls_ptr,
            options(nostack, nomem, preserves_flags),
        );
    }
    tls_ptr
}
