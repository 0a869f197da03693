//! Data cache maintenance.
//!
//! USB host buffers are accessed by the controller through DMA, so the CPU's
//! view of them has to be written back (and invalidated) around transfers.
//!
//! ## References
//! - libnx `arm/cache.h` (`armDCacheFlush`)
//! - [ARM DC CIVAC](https://developer.arm.com/documentation/ddi0601/2024-12/AArch64-Instructions/DC-CIVAC--Data-or-unified-Cache-line-Clean-and-Invalidate-by-VA-to-PoC)

use core::arch::asm;

/// Returns the smallest data cache line size in bytes, from `CTR_EL0.DminLine`.
#[inline]
pub fn dcache_line_size() -> usize {
    let ctr: u64;
    // SAFETY: CTR_EL0 is readable from EL0 on Horizon and has no side effects.
    unsafe {
        asm!("mrs {:x}, ctr_el0", out(reg) ctr, options(nostack, nomem, preserves_flags));
    }
    4 << ((ctr >> 16) & 0xF)
}

/// Cleans and invalidates the data cache lines covering `[addr, addr + size)`.
///
/// The range is widened to whole cache lines and the function returns after a
/// full-system data synchronization barrier.
pub fn flush_data_cache(addr: *const u8, size: usize) {
    let line = dcache_line_size();
    let end = (addr as usize).saturating_add(size);
    let mut cur = (addr as usize) & !(line - 1);

    while cur < end {
        // SAFETY: DC CIVAC on a mapped user address only affects cache state.
        unsafe { asm!("dc civac, {}", in(reg) cur, options(nostack, preserves_flags)) };
        cur += line;
    }

    // SAFETY: A barrier instruction has no memory-safety implications.
    unsafe { asm!("dsb sy", options(nostack, preserves_flags)) };
}
