//! System tick counter.

use crate::raw;

/// Returns the current system tick (19.2 MHz counter).
///
/// Library applets receive this value in their common arguments as the
/// launch timestamp.
#[inline]
pub fn get_system_tick() -> u64 {
    // SAFETY: The call has no arguments and no side effects.
    unsafe { raw::get_system_tick() }
}
