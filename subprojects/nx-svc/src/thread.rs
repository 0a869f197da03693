//! Thread control.

use crate::raw;

/// Suspends the current thread for at least `nanos` nanoseconds.
///
/// Values above `i64::MAX` are clamped, since the kernel treats 0, -1 and -2
/// as yield requests rather than sleeps.
pub fn sleep(nanos: u64) {
    let nanos = nanos.min(i64::MAX as u64) as i64;
    // SAFETY: The kernel only reads the duration argument.
    unsafe { raw::sleep_thread(nanos) }
}
