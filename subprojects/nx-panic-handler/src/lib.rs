//! # nx-panic-handler
//!
//! `#[panic_handler]` for Horizon OS homebrew.
//!
//! The panic message is rendered in the standard `panicked at` form into a
//! 512-byte static buffer, which is then handed to `svcBreak` with the
//! `Panic` reason so a debugger (or Atmosphère's crash reporter) can show it.
//! Messages longer than the buffer are truncated.
//!
//! The crate issues `svcBreak` itself instead of depending on `nx-svc`, so
//! every other crate in the workspace can link it without a dependency cycle.

#![no_std]

use core::{fmt::Write as _, panic::PanicInfo};

/// Capacity of the panic message buffer.
const MSG_BUFFER_SIZE: usize = 512;

/// `svcBreak` reason for a program panic.
const BREAK_REASON_PANIC: u32 = 0;

/// SVC number of `svcBreak`.
const SVC_BREAK: u16 = 0x26;

#[panic_handler]
pub fn panic_handler(info: &PanicInfo) -> ! {
    static mut MSG_BUFFER: [u8; MSG_BUFFER_SIZE] = [0; MSG_BUFFER_SIZE];

    // SAFETY: The panic handler is the only user of the buffer, and a second
    // panic while formatting aborts through svcBreak before touching it again.
    let buf = unsafe { &mut *(&raw mut MSG_BUFFER) };

    let mut writer = TruncatingWriter { buf, len: 0 };
    let _ = write!(writer, "{info}");

    // SAFETY: The buffer is static, so the address stays valid while the
    // debugger reads it.
    unsafe { svc_break(BREAK_REASON_PANIC, writer.buf.as_ptr() as usize, writer.len) };

    // svcBreak only returns when no debugger is attached and the process is
    // not being terminated; there is nothing useful left to do.
    loop {
        core::hint::spin_loop();
    }
}

/// A `fmt::Write` sink that silently drops whatever does not fit.
struct TruncatingWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl core::fmt::Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let room = self.buf.len() - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

/// `Result svcBreak(BreakReason reason, uintptr_t address, uintptr_t size);`
///
/// Ref: <https://switchbrew.org/wiki/SVC#Break>
#[unsafe(naked)]
unsafe extern "C" fn svc_break(reason: u32, address: usize, size: usize) -> u32 {
    core::arch::naked_asm!(
        "svc {code}",
        "ret",
        code = const SVC_BREAK,
    );
}
